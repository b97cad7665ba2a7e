use clap::Parser;
use tracing_subscriber::EnvFilter;

use folio_cli::cli::{self, Cli, Command, ConfigCommand};
use folio_domain::config::ObservabilityConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let (config, config_path) = cli::load_config(&args.config)?;
    init_tracing(&config.observability);

    match args.command {
        Command::Login { email } => cli::auth::login(&config, &email).await,
        Command::Register {
            email,
            display_name,
        } => cli::auth::register(&config, &email, display_name.as_deref()).await,
        Command::Logout => cli::auth::logout(&config).await,
        Command::Whoami { json } => cli::auth::whoami(&config, json).await,
        Command::Request {
            method,
            path,
            body,
            headers,
        } => cli::request::run(&config, method, &path, body.as_deref(), &headers).await,
        Command::Config(ConfigCommand::Validate) => {
            if !cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => cli::config::show(&config),
    }
}

/// Initialize stderr tracing so diagnostic output does not pollute stdout.
///
/// `RUST_LOG` wins over `observability.log_filter`.
fn init_tracing(obs: &ObservabilityConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&obs.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    if obs.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
