//! Binary entry point for the kiln snapshot builder.

use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use kiln::{BuildFailure, Builder, BuilderConfig, CommandHook, Ssh2Communicator, VultrClient};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("build failed: {0}")]
    Build(#[from] BuildFailure),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let exit_code = match run().await {
        Ok(summary) => {
            writeln!(io::stdout(), "{summary}").ok();
            0
        }
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run() -> Result<String, CliError> {
    let raw =
        BuilderConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    let config = raw
        .prepare()
        .map_err(|err| CliError::Config(err.to_string()))?;

    let client = Arc::new(VultrClient::new(config.api_key.as_str()));
    let builder = Builder::new(
        config,
        client,
        Arc::new(Ssh2Communicator::new()),
        Arc::new(CommandHook),
    );

    let cancel = builder.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling build");
            cancel.cancel();
        }
    });

    let artifact = builder.run().await?;
    Ok(artifact.to_string())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
