use clap::Parser;
use procurement_deployer::cli::{self, Args};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env before the subscriber reads RUST_LOG / LOG_FORMAT
    dotenvy::dotenv().ok();

    // Initialize logging (JSON format if LOG_FORMAT=json). stdout is reserved
    // for the deployment report.
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "procurement_deployer=info".into()),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "procurement_deployer=info".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let args = Args::parse();

    match cli::run(&args).await {
        Ok(deployment) => {
            println!("{}", cli::report(&deployment));
        }
        Err(e) => {
            error!("❌ Deployment failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
