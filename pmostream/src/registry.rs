//! Registre des jobs
//!
//! Le registre est l'unique source de vérité sur l'état des jobs. Toutes les
//! opérations sont atomiques les unes par rapport aux autres : l'état est
//! protégé par un seul `RwLock`, tenu uniquement le temps de la mise à jour
//! en mémoire. Aucune I/O n'est faite sous le verrou ; les chemins qu'un job
//! cesse de posséder sont rendus à l'appelant qui les libère ensuite.

use crate::clock::Clock;
use crate::error::{Result, StreamError};
use crate::filestore::FileStore;
use crate::job::{Job, JobHandle, JobState, MediaKind, MediaMetadata};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Nombre de tirages de handle avant d'abandonner
const MAX_HANDLE_ATTEMPTS: usize = 16;

type SourceSlot = (String, MediaKind);

/// Transitions autorisées par le registre
#[derive(Debug, Clone)]
pub enum Transition {
    /// `Pending → InProgress`, alloue le chemin du fichier
    Start,
    /// `InProgress → Ready`
    Complete {
        path: PathBuf,
        metadata: MediaMetadata,
    },
    /// `Pending | InProgress → Failed`
    Fail { error: String },
}

impl Transition {
    pub fn target(&self) -> JobState {
        match self {
            Transition::Start => JobState::InProgress,
            Transition::Complete { .. } => JobState::Ready,
            Transition::Fail { .. } => JobState::Failed,
        }
    }
}

/// Résultat d'une transition validée
#[derive(Debug, Clone)]
pub struct Committed {
    /// Instantané du job après la transition
    pub job: Job,
    /// Chemin que le job ne possède plus et que l'appelant doit libérer
    pub detached: Option<PathBuf>,
}

/// Résultat de [`JobRegistry::claim`]
#[derive(Debug, Clone)]
pub struct Claim {
    pub handle: JobHandle,
    /// `true` si un nouveau job a été créé et doit être lancé
    pub created: bool,
    pub state: JobState,
}

#[derive(Debug, Default)]
struct RegistryState {
    jobs: HashMap<JobHandle, Job>,
    /// Jobs `Pending` ou `InProgress` par source
    active: HashMap<SourceSlot, JobHandle>,
    /// Dernier job `Ready` par source
    ready: HashMap<SourceSlot, JobHandle>,
}

impl RegistryState {
    fn insert_new(&mut self, source_key: &str, kind: MediaKind, now: DateTime<Utc>) -> Result<JobHandle> {
        for _ in 0..MAX_HANDLE_ATTEMPTS {
            let handle = JobHandle::generate();
            if self.jobs.contains_key(&handle) {
                continue;
            }

            let job = Job::new(handle.clone(), source_key.to_string(), kind, now);
            self.jobs.insert(handle.clone(), job);
            self.active
                .insert((source_key.to_string(), kind), handle.clone());
            return Ok(handle);
        }

        Err(StreamError::HandleSpaceExhausted(MAX_HANDLE_ATTEMPTS))
    }

    fn find_active(&self, source_key: &str, kind: MediaKind) -> Option<&JobHandle> {
        self.active.get(&(source_key.to_string(), kind))
    }

    fn take(&mut self, handle: &JobHandle) -> Option<Job> {
        let job = self.jobs.remove(handle)?;
        let slot = (job.source_key.clone(), job.kind);
        for index in [&mut self.active, &mut self.ready] {
            if index.get(&slot) == Some(handle) {
                index.remove(&slot);
            }
        }
        Some(job)
    }
}

/// Map concurrente handle → job
pub struct JobRegistry {
    state: RwLock<RegistryState>,
    store: Arc<FileStore>,
    clock: Arc<dyn Clock>,
}

impl JobRegistry {
    pub fn new(store: Arc<FileStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            store,
            clock,
        }
    }

    /// Retourne le store utilisé pour l'allocation des chemins
    pub fn store(&self) -> &Arc<FileStore> {
        &self.store
    }

    /// Heure courante selon l'horloge du registre
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Cherche un job `Pending` ou `InProgress` pour cette source
    pub async fn find_active(&self, source_key: &str, kind: MediaKind) -> Option<JobHandle> {
        let state = self.state.read().await;
        state.find_active(source_key, kind).cloned()
    }

    /// Crée un job `Pending` et retourne son handle
    pub async fn create(&self, source_key: &str, kind: MediaKind) -> Result<JobHandle> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state.insert_new(source_key, kind, now)
    }

    /// Recherche-ou-création atomique utilisée par le coordinateur
    ///
    /// Un job actif pour la même source est toujours réutilisé. Avec
    /// `reuse_ready`, un job `Ready` l'est aussi (et son accès est rafraîchi).
    /// Sinon un nouveau job `Pending` est créé.
    pub async fn claim(&self, source_key: &str, kind: MediaKind, reuse_ready: bool) -> Result<Claim> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        if let Some(handle) = state.find_active(source_key, kind).cloned() {
            let job_state = state
                .jobs
                .get(&handle)
                .map(|job| job.state)
                .unwrap_or(JobState::Pending);
            return Ok(Claim {
                handle,
                created: false,
                state: job_state,
            });
        }

        if reuse_ready {
            let slot = (source_key.to_string(), kind);
            if let Some(handle) = state.ready.get(&slot).cloned() {
                if let Some(job) = state.jobs.get_mut(&handle) {
                    job.last_accessed_at = now;
                    return Ok(Claim {
                        handle,
                        created: false,
                        state: job.state,
                    });
                }
            }
        }

        let handle = state.insert_new(source_key, kind, now)?;
        Ok(Claim {
            handle,
            created: true,
            state: JobState::Pending,
        })
    }

    /// Fait avancer l'état d'un job
    ///
    /// Seules `Pending → InProgress`, `InProgress → Ready`,
    /// `InProgress → Failed` et `Pending → Failed` sont acceptées ; tout le
    /// reste est refusé sans modifier le job.
    pub async fn transition(&self, handle: &JobHandle, transition: Transition) -> Result<Committed> {
        let mut guard = self.state.write().await;
        let RegistryState { jobs, active, ready } = &mut *guard;

        let job = jobs
            .get_mut(handle)
            .ok_or_else(|| StreamError::NotFound(handle.to_string()))?;

        let target = transition.target();
        let allowed = matches!(
            (job.state, target),
            (JobState::Pending, JobState::InProgress)
                | (JobState::InProgress, JobState::Ready)
                | (JobState::InProgress, JobState::Failed)
                | (JobState::Pending, JobState::Failed)
        );
        if !allowed {
            return Err(StreamError::InvalidTransition {
                handle: handle.to_string(),
                from: job.state,
                to: target,
            });
        }

        let slot = (job.source_key.clone(), job.kind);
        let mut detached = None;
        match transition {
            Transition::Start => {
                job.file_path = Some(self.store.allocate(handle, job.kind));
            }
            Transition::Complete { path, metadata } => {
                if job.file_path.as_ref() != Some(&path) {
                    detached = job.file_path.replace(path);
                }
                job.metadata = Some(metadata);
                ready.insert(slot.clone(), handle.clone());
            }
            Transition::Fail { error } => {
                detached = job.file_path.take();
                job.error = Some(error);
            }
        }
        job.state = target;

        if target.is_terminal() && active.get(&slot) == Some(handle) {
            active.remove(&slot);
        }

        Ok(Committed {
            job: job.clone(),
            detached,
        })
    }

    /// Rafraîchit la date de dernier accès ; sans effet si le handle est inconnu
    pub async fn touch(&self, handle: &JobHandle) {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        if let Some(job) = state.jobs.get_mut(handle) {
            job.last_accessed_at = now;
        }
    }

    /// Lecture d'un instantané du job
    pub async fn get(&self, handle: &JobHandle) -> Option<Job> {
        let state = self.state.read().await;
        state.jobs.get(handle).cloned()
    }

    /// `touch` puis `get` en une seule section critique
    pub async fn touch_and_get(&self, handle: &JobHandle) -> Option<Job> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let job = state.jobs.get_mut(handle)?;
        job.last_accessed_at = now;
        Some(job.clone())
    }

    /// Retire un job du registre et le retourne
    pub async fn remove(&self, handle: &JobHandle) -> Option<Job> {
        let mut state = self.state.write().await;
        state.take(handle)
    }

    /// Retire un job seulement s'il n'a pas été accédé depuis `cutoff`
    ///
    /// Évite d'évincer un job rafraîchi entre l'instantané du janitor et
    /// la suppression.
    pub async fn remove_idle(&self, handle: &JobHandle, cutoff: DateTime<Utc>) -> Option<Job> {
        let mut state = self.state.write().await;
        let idle = state
            .jobs
            .get(handle)
            .is_some_and(|job| job.last_accessed_at < cutoff);
        if idle {
            state.take(handle)
        } else {
            None
        }
    }

    /// Handles des jobs dont le dernier accès est antérieur à `cutoff`
    pub async fn idle_since(&self, cutoff: DateTime<Utc>) -> Vec<JobHandle> {
        let state = self.state.read().await;
        state
            .jobs
            .values()
            .filter(|job| job.last_accessed_at < cutoff)
            .map(|job| job.handle.clone())
            .collect()
    }

    /// Les `count` jobs terminés les moins récemment utilisés
    pub async fn least_recently_used(&self, count: usize) -> Vec<JobHandle> {
        let state = self.state.read().await;
        let mut terminal: Vec<&Job> = state
            .jobs
            .values()
            .filter(|job| job.state.is_terminal())
            .collect();
        terminal.sort_by_key(|job| job.last_accessed_at);
        terminal
            .into_iter()
            .take(count)
            .map(|job| job.handle.clone())
            .collect()
    }

    /// Tous les jobs, du plus ancien au plus récent
    pub async fn list(&self) -> Vec<Job> {
        let state = self.state.read().await;
        let mut jobs: Vec<Job> = state.jobs.values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.jobs.is_empty()
    }
}
