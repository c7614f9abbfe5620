use pmoconfig::get_config;
use pmoserver::{LoggingOptions, ServerBuilder};
use pmostream::StreamServiceExt;
use pmoytdlp::{YtDlpFetcher, YtDlpResolver};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ========== PHASE 1 : Infrastructure ==========
    let config = get_config();

    let mut server = ServerBuilder::new_configured().build();
    server.init_logging(LoggingOptions::from_config()).await;

    info!(config_dir = %config.directory(), "Configuration loaded");

    server
        .add_route("/info", || async {
            serde_json::json!({
                "name": "PMOStream",
                "version": env!("CARGO_PKG_VERSION"),
            })
        })
        .await;

    // ========== PHASE 2 : Service de streaming ==========
    let binary = config.get_ytdlp_binary()?;
    info!(binary = %binary, "Initializing stream service");

    let service = server
        .init_stream_service_configured(
            Arc::new(YtDlpFetcher::new(binary.clone())),
            Arc::new(YtDlpResolver::new(binary)),
        )
        .await?;

    // Le registre n'est pas persistant : les fichiers restants sont orphelins
    match service.reset_store().await {
        Ok(0) => {}
        Ok(removed) => info!(removed, "Removed orphan stream files"),
        Err(e) => warn!("Cannot clean stream directory: {}", e),
    }

    let janitor = service.spawn_janitor();

    // ========== PHASE 3 : Démarrage du serveur ==========
    info!("Starting HTTP server...");
    let addr = server.start().await?;

    info!(%addr, "PMOStream is ready");
    info!("Press Ctrl+C to stop...");
    server.wait().await;

    service.shutdown();
    janitor.shutdown().await;
    info!("PMOStream stopped");

    Ok(())
}
