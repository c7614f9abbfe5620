//! Coordination des téléchargements
//!
//! Le coordinateur déduplique les requêtes identiques et lance le fetcher en
//! tâche de fond. L'appelant reçoit un handle immédiatement et suit la
//! progression en interrogeant le statut du job.
//!
//! ## Cycle d'une tâche de fetch
//!
//! ```text
//! Pending ──(permit obtenu)──► InProgress ──► Ready
//!    │                             │
//!    └──────────► Failed ◄─────────┘
//! ```
//!
//! Les erreurs du fetcher (réseau, source indisponible, timeout, panic) sont
//! enregistrées dans le job et ne remontent jamais vers l'appelant.

use crate::error::Result;
use crate::fetcher::{FetchedMedia, Fetcher};
use crate::job::{JobHandle, JobState, MediaKind};
use crate::registry::{JobRegistry, Transition};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Nombre de téléchargements simultanés par défaut
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 4;

/// Paramètres du coordinateur
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Réutiliser un job `Ready` pour une requête identique (cache de contenu)
    pub reuse_ready: bool,
    /// Nombre maximal de fetchs en parallèle ; les autres restent `Pending`
    pub max_concurrent_fetches: usize,
    /// Durée maximale d'un fetch
    pub fetch_timeout: Option<Duration>,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            reuse_ready: false,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            fetch_timeout: None,
        }
    }
}

/// Point d'entrée des demandes de fetch
pub struct FetchCoordinator {
    registry: Arc<JobRegistry>,
    fetcher: Arc<dyn Fetcher>,
    permits: Arc<Semaphore>,
    options: CoordinatorOptions,
}

impl FetchCoordinator {
    pub fn new(registry: Arc<JobRegistry>, fetcher: Arc<dyn Fetcher>, options: CoordinatorOptions) -> Self {
        let permits = Arc::new(Semaphore::new(options.max_concurrent_fetches.max(1)));
        Self {
            registry,
            fetcher,
            permits,
            options,
        }
    }

    pub fn options(&self) -> &CoordinatorOptions {
        &self.options
    }

    /// Demande le fetch de `source_key` au format `kind`
    ///
    /// Retourne le handle d'un job actif existant pour la même source, ou
    /// crée un job et lance le fetch en arrière-plan. Ne bloque jamais sur
    /// le fetcher.
    pub async fn request_fetch(&self, source_key: &str, kind: MediaKind) -> Result<JobHandle> {
        let mut claim = self
            .registry
            .claim(source_key, kind, self.options.reuse_ready)
            .await?;

        // Un job `Ready` réutilisé doit encore posséder son fichier
        if !claim.created && claim.state == JobState::Ready && !self.has_file(&claim.handle).await {
            warn!(handle = %claim.handle, source_key, %kind, "Ready stream lost its file, fetching again");
            if let Some(job) = self.registry.remove(&claim.handle).await {
                self.registry
                    .store()
                    .release_job(&job.handle, job.file_path.as_deref())
                    .await;
            }
            claim = self
                .registry
                .claim(source_key, kind, self.options.reuse_ready)
                .await?;
        }

        if !claim.created {
            debug!(
                handle = %claim.handle,
                source_key,
                %kind,
                state = %claim.state,
                "Reusing existing stream job"
            );
            return Ok(claim.handle);
        }

        info!(handle = %claim.handle, source_key, %kind, "Scheduling fetch");

        let task = FetchTask {
            registry: self.registry.clone(),
            fetcher: self.fetcher.clone(),
            permits: self.permits.clone(),
            timeout: self.options.fetch_timeout,
            handle: claim.handle.clone(),
            source_key: source_key.to_string(),
            kind,
        };
        tokio::spawn(task.run());

        Ok(claim.handle)
    }

    async fn has_file(&self, handle: &JobHandle) -> bool {
        let Some(path) = self.registry.get(handle).await.and_then(|job| job.file_path) else {
            return false;
        };
        tokio::fs::metadata(&path)
            .await
            .is_ok_and(|meta| meta.is_file())
    }

    /// Ferme la file d'attente : les jobs encore `Pending` passent en `Failed`
    pub fn shutdown(&self) {
        self.permits.close();
    }
}

struct FetchTask {
    registry: Arc<JobRegistry>,
    fetcher: Arc<dyn Fetcher>,
    permits: Arc<Semaphore>,
    timeout: Option<Duration>,
    handle: JobHandle,
    source_key: String,
    kind: MediaKind,
}

impl FetchTask {
    async fn run(self) {
        let _permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.record_failure("fetch queue closed".to_string(), None)
                    .await;
                return;
            }
        };

        let committed = match self.registry.transition(&self.handle, Transition::Start).await {
            Ok(committed) => committed,
            Err(e) => {
                debug!(handle = %self.handle, error = %e, "Job left the registry before fetch start");
                return;
            }
        };

        let Some(destination) = committed.job.file_path else {
            self.record_failure("no file path allocated".to_string(), None)
                .await;
            return;
        };

        debug!(handle = %self.handle, path = %destination.display(), "Fetch started");

        match self.invoke(&destination).await {
            Ok(media) => self.record_success(media).await,
            Err(error) => self.record_failure(error, Some(&destination)).await,
        }
    }

    /// Appelle le fetcher dans une tâche isolée (panics et timeout compris)
    async fn invoke(&self, destination: &Path) -> std::result::Result<FetchedMedia, String> {
        let fetcher = self.fetcher.clone();
        let source_key = self.source_key.clone();
        let kind = self.kind;
        let dest = destination.to_path_buf();

        let job = tokio::spawn(async move { fetcher.fetch(&source_key, kind, &dest).await });
        let abort = job.abort_handle();

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, job).await {
                Ok(joined) => joined,
                Err(_) => {
                    abort.abort();
                    return Err(format!("fetch timed out after {}s", limit.as_secs()));
                }
            },
            None => job.await,
        };

        let media = match joined {
            Ok(Ok(media)) => media,
            Ok(Err(e)) => return Err(format!("{:#}", e)),
            Err(e) if e.is_panic() => return Err("fetcher panicked".to_string()),
            Err(_) => return Err("fetch cancelled".to_string()),
        };

        match tokio::fs::metadata(&media.path).await {
            Ok(meta) if meta.is_file() => Ok(media),
            _ => Err(format!(
                "fetcher reported success but produced no file at {}",
                media.path.display()
            )),
        }
    }

    async fn record_success(&self, media: FetchedMedia) {
        let produced = media.path.clone();
        let title = media.metadata.title.clone();
        let transition = Transition::Complete {
            path: media.path,
            metadata: media.metadata,
        };

        match self.registry.transition(&self.handle, transition).await {
            Ok(committed) => {
                info!(handle = %self.handle, source_key = %self.source_key, title = %title, "Stream ready");
                if let Some(old) = committed.detached {
                    self.registry.store().release(&old).await;
                }
            }
            Err(e) => {
                // Job évincé pendant le fetch : personne ne possède plus ses fichiers
                warn!(handle = %self.handle, error = %e, "Fetch completed for a discarded job, removing files");
                self.registry
                    .store()
                    .release_job(&self.handle, Some(&produced))
                    .await;
            }
        }
    }

    async fn record_failure(&self, error: String, destination: Option<&Path>) {
        warn!(handle = %self.handle, source_key = %self.source_key, error = %error, "Fetch failed");

        let leftover = match self
            .registry
            .transition(&self.handle, Transition::Fail { error })
            .await
        {
            Ok(committed) => committed.detached,
            Err(e) => {
                debug!(handle = %self.handle, error = %e, "Cannot record failure");
                destination.map(Path::to_path_buf)
            }
        };

        // Fichier partiel et intermédiaires du fetcher
        self.registry
            .store()
            .release_job(&self.handle, leftover.as_deref())
            .await;
    }
}
