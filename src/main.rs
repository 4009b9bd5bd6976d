use clap::Parser;

use techread::app::App;
use techread::cli::{self, Cli};
use techread::config::Config;
use techread::error::{AppError, Result};

#[tokio::main]
async fn main() {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        match e {
            AppError::LlmUnavailable(detail) => {
                eprintln!("Summarization failed. Is the local model service running? ({detail})");
            }
            other => eprintln!("Error: {other}"),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Configuration mistakes surface here, before any pipeline work.
    let config = Config::load()?;
    let app = App::new(config).await?;
    cli::run(&app, cli).await
}
