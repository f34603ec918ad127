use pos_server::{Config, Server, init_logger, init_logger_with_file};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_logger();
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    init_logger_with_file(Some(&config.log_level), config.log_json, config.log_dir.as_deref());
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        port = config.http_port,
        "POS server starting"
    );

    if let Err(e) = Server::new(config).run().await {
        tracing::error!(error = %e, "Server error");
        return Err(e.into());
    }

    Ok(())
}
