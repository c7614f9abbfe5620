//! # pmoserver - Serveur web haut niveau basé sur Axum
//!
//! Cette crate fournit une abstraction simple pour créer des serveurs HTTP
//! avec Axum : les crates de service y montent leurs routes et leur
//! documentation OpenAPI sans manipuler directement le router.
//!
//! ## Fonctionnalités
//!
//! - **API de haut niveau** : routes JSON, handlers avec état, sous-routers
//! - **Logs en mémoire** : buffer circulaire consultable via `/log-dump`
//! - **Niveau de log dynamique** : `/api/logs/log_setup`
//! - **Documentation OpenAPI** : Swagger UI par API montée
//! - **Arrêt gracieux** : gestion propre de Ctrl+C
//!
//! ## Exemple d'utilisation
//!
//! ```rust,no_run
//! use pmoserver::{LoggingOptions, ServerBuilder};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let mut server = ServerBuilder::new("MyServer", "", 8080).build();
//!     server.init_logging(LoggingOptions::default()).await;
//!
//!     server.add_route("/api/status", || async {
//!         serde_json::json!({"status": "ok"})
//!     }).await;
//!
//!     server.start().await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

pub mod logs;
pub mod server;

pub use logs::{BufferLayer, LogState, LoggingOptions, init_logging, log_dump};
pub use server::{Server, ServerBuilder, ServerInfo};
