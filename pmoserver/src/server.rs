//! # Module Server - API de haut niveau pour Axum
//!
//! Ce module fournit une abstraction simple pour créer des serveurs HTTP
//! avec Axum, en cachant la configuration et le routage.
//!
//! ## Fonctionnalités
//!
//! - **Routes JSON simples** : endpoints API avec `add_route()`
//! - **Handlers avec état** : `add_handler_with_state()`
//! - **Sous-routers** : montage de routers complets avec `add_router()`
//! - **Documentation API** : OpenAPI/Swagger avec `add_openapi()`
//! - **Logs** : buffer circulaire et niveau réglable à chaud
//! - **Arrêt gracieux** : arrêt propre sur Ctrl+C ou sur demande

use crate::logs::{LogState, LoggingOptions, LogsApiDoc, create_logs_router, init_logging, log_dump};
use axum::handler::Handler;
use axum::routing::get;
use axum::{Json, Router};
use pmoconfig::get_config;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Info serveur sérialisable
#[derive(Clone, Debug, Serialize, utoipa::ToSchema)]
pub struct ServerInfo {
    pub name: String,
    /// URL publique ; vide si elle doit être déduite des requêtes
    pub base_url: String,
    pub http_port: u16,
}

/// Serveur principal
pub struct Server {
    name: String,
    base_url: String,
    http_port: u16,
    router: Arc<RwLock<Router>>,
    join_handle: Option<JoinHandle<()>>,
    stop: Arc<Notify>,
    log_state: Option<LogState>,
}

impl Server {
    /// Crée une nouvelle instance de serveur
    ///
    /// # Arguments
    ///
    /// * `name` - Nom du serveur (pour les logs)
    /// * `base_url` - URL publique (ex: "http://stream.local:1470"), vide si inconnue
    /// * `http_port` - Port HTTP à écouter
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
            router: Arc::new(RwLock::new(Router::new())),
            join_handle: None,
            stop: Arc::new(Notify::new()),
            log_state: None,
        }
    }

    pub fn new_configured() -> Self {
        ServerBuilder::new_configured().build()
    }

    /// Ajoute une route JSON dynamique
    ///
    /// La closure fournie est appelée à chaque requête GET sur le chemin.
    ///
    /// ```rust,no_run
    /// # use pmoserver::Server;
    /// # #[tokio::main]
    /// # async fn main() {
    /// # let mut server = Server::new("Test", "", 3000);
    /// server.add_route("/info", || async {
    ///     serde_json::json!({"version": "0.1.0"})
    /// }).await;
    /// # }
    /// ```
    pub async fn add_route<F, Fut, T>(&mut self, path: &str, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let f = Arc::new(f);
        let handler = move || {
            let f = f.clone();
            async move { Json(f().await) }
        };

        self.mount(path, Router::new().route("/", get(handler))).await;
    }

    /// Ajoute un handler GET avec état
    pub async fn add_handler_with_state<H, T, S>(&mut self, path: &str, handler: H, state: S)
    where
        H: Handler<T, S> + Clone + 'static,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        let route = Router::new().route("/", get(handler)).with_state(state);
        self.mount(path, route).await;
    }

    async fn mount(&mut self, path: &str, route: Router) {
        let mut r = self.router.write().await;
        *r = if path == "/" {
            std::mem::take(&mut *r).merge(route)
        } else {
            std::mem::take(&mut *r).nest(path, route)
        };
    }

    /// Ajoute une API documentée avec OpenAPI et Swagger UI
    ///
    /// Le router est monté sous `/api/{name}`, la documentation sous
    /// `/swagger-ui/{name}` et la spécification sous `/api-docs/{name}.json`.
    pub async fn add_openapi(
        &mut self,
        api_router: Router,
        openapi: utoipa::openapi::OpenApi,
        name: &str,
    ) {
        let swagger_path: &'static str = Box::leak(format!("/swagger-ui/{}", name).into_boxed_str());
        let openapi_json_path: &'static str =
            Box::leak(format!("/api-docs/{}.json", name).into_boxed_str());

        let swagger = SwaggerUi::new(swagger_path).url(openapi_json_path, openapi);
        let nested_router = Router::new().nest(&format!("/api/{}", name), api_router);

        let mut r = self.router.write().await;
        *r = std::mem::take(&mut *r).merge(nested_router).merge(swagger);
    }

    /// Ajoute un sous-router au serveur
    ///
    /// - Si `path` est "/", merge directement au router principal
    /// - Sinon, nest le router sous le chemin donné
    pub async fn add_router(&mut self, path: &str, sub_router: Router) {
        let normalized = if path == "/" {
            "/".to_string()
        } else {
            format!("/{}", path.trim_start_matches('/'))
        };
        self.mount(&normalized, sub_router).await;
    }

    /// Retourne une copie du router courant (tests, intégration)
    pub async fn router(&self) -> Router {
        self.router.read().await.clone()
    }

    /// Démarre le serveur HTTP
    ///
    /// Le port est réservé avant le retour : une erreur de bind est remontée
    /// à l'appelant. Le serveur s'arrête proprement sur Ctrl+C ou sur
    /// [`Server::stop`], après avoir terminé les requêtes en cours.
    pub async fn start(&mut self) -> std::io::Result<SocketAddr> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.http_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(name = %self.name, addr = %local_addr, base_url = %self.base_url, "Server starting");

        let router = self.router.read().await.clone();
        let stop = self.stop.clone();
        self.join_handle = Some(tokio::spawn(async move {
            let shutdown = async move {
                tokio::select! {
                    result = signal::ctrl_c() => match result {
                        Ok(()) => info!("Ctrl+C received, shutting down"),
                        Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
                    },
                    _ = stop.notified() => info!("Server stop requested"),
                }
            };

            if let Err(e) = axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("HTTP server error: {}", e);
            }
        }));

        Ok(local_addr)
    }

    /// Demande l'arrêt du serveur démarré par [`Server::start`]
    pub fn stop(&self) {
        self.stop.notify_one();
    }

    /// Attend la fin du serveur
    pub async fn wait(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            if let Err(e) = handle.await {
                error!("Server task ended abnormally: {}", e);
            }
        }
    }

    /// Récupère les infos du serveur
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            name: self.name.clone(),
            base_url: self.base_url.clone(),
            http_port: self.http_port,
        }
    }

    /// État des logs si `init_logging` a été appelé
    pub fn log_state(&self) -> Option<&LogState> {
        self.log_state.as_ref()
    }

    /// Initialise le système de logging et enregistre les routes de logs
    ///
    /// Routes enregistrées :
    /// - `GET /log-dump` - contenu du buffer circulaire
    /// - `GET|POST /api/logs/log_setup` - niveau de log courant
    pub async fn init_logging(&mut self, options: LoggingOptions) {
        let log_state = init_logging(options);

        self.add_handler_with_state("/log-dump", log_dump, log_state.clone())
            .await;
        self.add_openapi(
            create_logs_router(log_state.clone()),
            LogsApiDoc::openapi(),
            "logs",
        )
        .await;

        self.log_state = Some(log_state);
    }
}

/// Builder pattern
pub struct ServerBuilder {
    name: String,
    base_url: String,
    http_port: u16,
}

impl ServerBuilder {
    /// Crée un nouveau builder
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
        }
    }

    /// Builder initialisé depuis `host.base_url` et `host.http_port`
    pub fn new_configured() -> Self {
        let config = get_config();
        Self {
            name: "PMOStream".to_string(),
            base_url: config.get_base_url(),
            http_port: config.get_http_port(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Construit le serveur
    pub fn build(self) -> Server {
        Server::new(self.name, self.base_url, self.http_port)
    }
}
