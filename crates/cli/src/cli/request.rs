//! `folio request <METHOD> <PATH>`: one raw API call with the stored token.

use folio_api::{Method, RequestOptions};
use folio_domain::config::Config;
use folio_session::SessionManager;
use serde_json::Value;

pub async fn run(
    config: &Config,
    method: Method,
    path: &str,
    body: Option<&str>,
    headers: &[String],
) -> anyhow::Result<()> {
    let options = build_options(method, body, headers)?;
    let manager = SessionManager::from_config(config)?;

    let payload = manager.api().request_value(path, options).await?;
    if !payload.is_null() {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }
    Ok(())
}

fn build_options(
    method: Method,
    body: Option<&str>,
    headers: &[String],
) -> anyhow::Result<RequestOptions> {
    let mut options = RequestOptions::new(method);
    if let Some(raw) = body {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| anyhow::anyhow!("--body is not valid JSON: {e}"))?;
        options = options.body(value);
    }
    for raw in headers {
        let (name, value) = parse_header(raw)?;
        options = options.header(name, value);
    }
    Ok(options)
}

/// Split `Name: value`. Whitespace around both parts is trimmed.
fn parse_header(raw: &str) -> anyhow::Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("header `{raw}` must look like `Name: value`"))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("header `{raw}` has an empty name");
    }
    Ok((name.to_owned(), value.trim().to_owned()))
}
