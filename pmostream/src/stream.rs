//! Lecture des statuts et des fichiers prêts

use crate::error::{Result, StreamError};
use crate::job::{JobHandle, JobState, MediaMetadata};
use crate::registry::JobRegistry;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Statut d'un job tel que vu par un client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    NotFound,
    Pending,
    InProgress,
    Ready,
    Failed(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::NotFound => "not_found",
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Ready => "ready",
            JobStatus::Failed(_) => "failed",
        }
    }
}

/// Fichier prêt à être servi
#[derive(Debug)]
pub struct MediaStream {
    pub handle: JobHandle,
    pub file: tokio::fs::File,
    /// Taille en octets
    pub len: u64,
    pub content_type: &'static str,
    pub path: PathBuf,
    pub metadata: Option<MediaMetadata>,
}

/// Accès en lecture aux jobs
#[derive(Clone)]
pub struct StreamServer {
    registry: Arc<JobRegistry>,
}

impl StreamServer {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self { registry }
    }

    /// Statut courant d'un handle ; rafraîchit son dernier accès
    pub async fn status(&self, handle: &JobHandle) -> JobStatus {
        let Some(job) = self.registry.touch_and_get(handle).await else {
            return JobStatus::NotFound;
        };

        match job.state {
            JobState::Pending => JobStatus::Pending,
            JobState::InProgress => JobStatus::InProgress,
            JobState::Ready => JobStatus::Ready,
            JobState::Failed => JobStatus::Failed(
                job.error
                    .unwrap_or_else(|| "unknown error".to_string()),
            ),
        }
    }

    /// Ouvre le fichier d'un job `Ready`
    ///
    /// - `Pending`/`InProgress` → [`StreamError::NotReady`]
    /// - `Failed`, inconnu, ou fichier absent du disque → [`StreamError::NotFound`]
    pub async fn open(&self, handle: &JobHandle) -> Result<MediaStream> {
        let job = self
            .registry
            .touch_and_get(handle)
            .await
            .ok_or_else(|| StreamError::NotFound(handle.to_string()))?;

        match job.state {
            JobState::Ready => {}
            JobState::Pending | JobState::InProgress => {
                return Err(StreamError::NotReady(handle.to_string()));
            }
            JobState::Failed => return Err(StreamError::NotFound(handle.to_string())),
        }

        let Some(path) = job.file_path else {
            warn!(handle = %handle, "Ready job without file path");
            return Err(StreamError::NotFound(handle.to_string()));
        };

        let (file, len) = match self.registry.store().open(&path).await {
            Ok(opened) => opened,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(handle = %handle, path = %path.display(), "Stream file vanished");
                return Err(StreamError::NotFound(handle.to_string()));
            }
            Err(e) => return Err(StreamError::Store(e)),
        };

        Ok(MediaStream {
            handle: job.handle,
            file,
            len,
            content_type: job.kind.content_type_for(&path),
            path,
            metadata: job.metadata,
        })
    }
}
