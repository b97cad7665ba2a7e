pub mod auth;
pub mod config;
pub mod request;

use clap::{Parser, Subcommand};
use folio_api::Method;

/// Environment variable read by `login` and `register` instead of prompting.
pub const PASSWORD_ENV: &str = "FOLIO_PASSWORD";

/// folio: command-line client for the folio portfolio API.
#[derive(Debug, Parser)]
#[command(name = "folio", version, about)]
pub struct Cli {
    /// Path to the config file.
    #[arg(long, global = true, env = "FOLIO_CONFIG", default_value = "folio.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and store the session credentials.
    Login {
        #[arg(long)]
        email: String,
    },
    /// Create an account and sign in.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Sign out and forget the stored credentials.
    Logout,
    /// Restore the stored session and print who is signed in.
    Whoami {
        /// Print the session state as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Send one API call with the stored credentials and print the payload.
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE).
        method: Method,
        /// Endpoint path relative to `api.base_url`, e.g. `/api/portfolios`.
        path: String,
        /// JSON body using camelCase keys.
        #[arg(long)]
        body: Option<String>,
        /// Extra header as `Name: value`. Repeatable.
        #[arg(long = "header", short = 'H')]
        headers: Vec<String>,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration at `config_path`, falling back to defaults when
/// the file does not exist. Returns the parsed config and the path used.
pub fn load_config(config_path: &str) -> anyhow::Result<(folio_domain::config::Config, String)> {
    let config = folio_domain::config::Config::load(config_path)
        .map_err(|e| anyhow::anyhow!("loading {config_path}: {e}"))?;
    Ok((config, config_path.to_owned()))
}

/// Password from `FOLIO_PASSWORD`, else an interactive prompt on stderr.
pub fn read_password(prompt: &str) -> anyhow::Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        if !password.is_empty() {
            return Ok(password);
        }
    }
    let password = rpassword::prompt_password_stderr(prompt)
        .map_err(|e| anyhow::anyhow!("reading password: {e}"))?;
    if password.is_empty() {
        anyhow::bail!("password must not be empty");
    }
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_request_command() {
        let cli = Cli::try_parse_from([
            "folio",
            "request",
            "post",
            "/api/portfolios",
            "--body",
            r#"{"baseCurrency":"EUR"}"#,
            "-H",
            "X-Trace: 1",
        ])
        .unwrap();

        match cli.command {
            Command::Request {
                method,
                path,
                body,
                headers,
            } => {
                assert_eq!(method, Method::Post);
                assert_eq!(path, "/api/portfolios");
                assert_eq!(body.as_deref(), Some(r#"{"baseCurrency":"EUR"}"#));
                assert_eq!(headers, vec!["X-Trace: 1".to_owned()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_method() {
        assert!(Cli::try_parse_from(["folio", "request", "TRACE", "/api"]).is_err());
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["folio", "logout", "--config", "alt.toml"]).unwrap();
        assert_eq!(cli.config, "alt.toml");
        assert!(matches!(cli.command, Command::Logout));
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("absent.toml");
        let (config, used) = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(used, path.to_str().unwrap());
        assert_eq!(config.observability.log_filter, "warn");
    }
}
