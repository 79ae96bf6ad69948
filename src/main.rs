use clap::Parser;
use planwell::cli::commands::Cli;
use planwell::cli::handlers;
use tracing_subscriber::EnvFilter;

fn setup_logging(level: &str) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match handlers::load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };
    setup_logging(&config.log.level);

    if let Err(e) = handlers::dispatch(cli, config).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
