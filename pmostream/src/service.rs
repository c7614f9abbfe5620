//! Façade du service de streaming
//!
//! `StreamService` assemble le registre, le coordinateur, le serveur de
//! lecture et le janitor autour d'un [`FileStore`]. C'est la surface
//! indépendante du transport utilisée par la couche HTTP et par les tests.

use crate::clock::{Clock, SystemClock};
use crate::coordinator::{CoordinatorOptions, FetchCoordinator, DEFAULT_MAX_CONCURRENT_FETCHES};
use crate::error::{Result, StreamError};
use crate::fetcher::{Fetcher, IdentityResolver, SourceResolver};
use crate::filestore::FileStore;
use crate::janitor::{Janitor, JanitorHandle, JanitorOptions, SweepReport};
use crate::job::{Job, JobHandle, MediaKind};
use crate::registry::JobRegistry;
use crate::stream::{JobStatus, MediaStream, StreamServer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Réglages du service
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Répertoire de travail des fichiers
    pub directory: PathBuf,
    /// Inactivité maximale avant éviction
    pub ttl: Duration,
    /// Période du janitor
    pub sweep_interval: Duration,
    /// Nombre maximal de jobs conservés (0 = illimité)
    pub max_jobs: usize,
    pub reuse_ready: bool,
    pub max_concurrent_fetches: usize,
    pub fetch_timeout: Option<Duration>,
}

impl StreamSettings {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(3600),
            max_jobs: 0,
            reuse_ready: false,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            fetch_timeout: None,
        }
    }

    fn coordinator_options(&self) -> CoordinatorOptions {
        CoordinatorOptions {
            reuse_ready: self.reuse_ready,
            max_concurrent_fetches: self.max_concurrent_fetches,
            fetch_timeout: self.fetch_timeout,
        }
    }

    fn janitor_options(&self) -> JanitorOptions {
        JanitorOptions {
            ttl: chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX),
            interval: self.sweep_interval,
            max_jobs: self.max_jobs,
        }
    }
}

/// Service de streaming complet
pub struct StreamService {
    settings: StreamSettings,
    registry: Arc<JobRegistry>,
    coordinator: FetchCoordinator,
    server: StreamServer,
    resolver: Arc<dyn SourceResolver>,
}

impl StreamService {
    /// Crée un service avec l'horloge système et le résolveur identité
    pub fn new(settings: StreamSettings, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        Self::with_parts(
            settings,
            fetcher,
            Arc::new(IdentityResolver),
            Arc::new(SystemClock),
        )
    }

    /// Crée un service à partir de collaborateurs explicites
    pub fn with_parts(
        settings: StreamSettings,
        fetcher: Arc<dyn Fetcher>,
        resolver: Arc<dyn SourceResolver>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let store = Arc::new(FileStore::new(&settings.directory)?);
        let registry = Arc::new(JobRegistry::new(store, clock));
        let coordinator =
            FetchCoordinator::new(registry.clone(), fetcher, settings.coordinator_options());
        let server = StreamServer::new(registry.clone());

        info!(
            directory = %settings.directory.display(),
            ttl_secs = settings.ttl.as_secs(),
            reuse_ready = settings.reuse_ready,
            "Stream service initialized"
        );

        Ok(Self {
            settings,
            registry,
            coordinator,
            server,
            resolver,
        })
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<FileStore> {
        self.registry.store()
    }

    /// Résout une requête utilisateur (URL, identifiant ou recherche) en clé source
    pub async fn resolve(&self, query: &str) -> Result<String> {
        self.resolver
            .resolve(query)
            .await
            .map_err(|e| StreamError::Resolve(format!("{:#}", e)))
    }

    /// Demande le fetch d'une clé source déjà résolue
    pub async fn submit_fetch(&self, source_key: &str, kind: MediaKind) -> Result<JobHandle> {
        self.coordinator.request_fetch(source_key, kind).await
    }

    /// Résout puis soumet une requête utilisateur
    pub async fn submit_query(&self, query: &str, kind: MediaKind) -> Result<JobHandle> {
        let source_key = self.resolve(query).await?;
        self.submit_fetch(&source_key, kind).await
    }

    pub async fn query_status(&self, handle: &JobHandle) -> JobStatus {
        self.server.status(handle).await
    }

    pub async fn read_stream(&self, handle: &JobHandle) -> Result<MediaStream> {
        self.server.open(handle).await
    }

    /// Instantané d'un job sans rafraîchir son accès
    pub async fn job(&self, handle: &JobHandle) -> Option<Job> {
        self.registry.get(handle).await
    }

    pub async fn list(&self) -> Vec<Job> {
        self.registry.list().await
    }

    /// Retire un job et supprime son fichier
    ///
    /// Un fetch encore en cours pour ce job se terminera sans effet.
    pub async fn evict(&self, handle: &JobHandle) -> Result<Job> {
        let job = self
            .registry
            .remove(handle)
            .await
            .ok_or_else(|| StreamError::NotFound(handle.to_string()))?;

        self.store()
            .release_job(handle, job.file_path.as_deref())
            .await;
        info!(handle = %handle, "Stream job evicted on request");
        Ok(job)
    }

    /// Supprime les fichiers orphelins d'une exécution précédente
    pub async fn reset_store(&self) -> Result<usize> {
        Ok(self.store().reset().await?)
    }

    pub fn janitor(&self) -> Janitor {
        Janitor::new(self.registry.clone(), self.settings.janitor_options())
    }

    /// Effectue immédiatement un passage du janitor
    pub async fn sweep(&self) -> SweepReport {
        self.janitor().sweep().await
    }

    /// Lance le janitor périodique
    pub fn spawn_janitor(&self) -> JanitorHandle {
        self.janitor().spawn()
    }

    /// Ferme la file des fetchs en attente
    pub fn shutdown(&self) {
        self.coordinator.shutdown();
    }
}
