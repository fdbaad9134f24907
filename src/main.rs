use anyhow::Context;
use clap::Parser;
use patent_scurve::utils::{logger, validation::Validate};
use patent_scurve::{app, server, CliConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = CliConfig::parse();
    let config = cli.load().context("failed to load configuration")?;

    // 初始化日誌
    logger::init_logger(config.log_format(), cli.verbose);

    tracing::info!("Starting patent-scurve service");
    if cli.verbose {
        tracing::debug!(
            "Elasticsearch {} index {}, cache backend {:?}, embedding endpoint {}",
            config.elasticsearch.url,
            config.elasticsearch.index,
            config.cache.backend,
            config.embedding.endpoint
        );
    }

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    let router = app::build_app(&config)
        .await
        .context("failed to initialise backend clients")?;

    server::serve(router, &config.server.bind).await?;

    tracing::info!("Service stopped");
    Ok(())
}
