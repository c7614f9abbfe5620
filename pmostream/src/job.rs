//! Modèle de données d'un job de streaming
//!
//! Un job est à la fois l'unité de travail (un téléchargement) et l'entrée
//! de cache correspondante. Il n'est référencé de l'extérieur que par son
//! [`JobHandle`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Identifiant opaque d'un job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct JobHandle(String);

impl JobHandle {
    /// Génère un nouveau handle aléatoire (UUID v4)
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobHandle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Classe de format demandée
///
/// Le type détermine l'extension du fichier, le type MIME servi
/// et la sélection de format côté fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Construit le type depuis le drapeau `video=true|false` des requêtes
    pub fn from_video_flag(video: bool) -> Self {
        if video {
            MediaKind::Video
        } else {
            MediaKind::Audio
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            MediaKind::Audio => "mp3",
            MediaKind::Video => "mp4",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio/mpeg",
            MediaKind::Video => "video/mp4",
        }
    }

    /// Type MIME du fichier réellement produit
    ///
    /// Le fetcher peut livrer un autre conteneur que celui demandé (repli
    /// `webm`, `m4a`...). L'extension du fichier prime ; à défaut, le type
    /// du job est utilisé.
    pub fn content_type_for(&self, path: &Path) -> &'static str {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match (extension.as_deref(), self) {
            (Some("mp3"), _) => "audio/mpeg",
            (Some("m4a"), _) => "audio/mp4",
            (Some("opus" | "ogg" | "oga"), _) => "audio/ogg",
            (Some("flac"), _) => "audio/flac",
            (Some("wav"), _) => "audio/wav",
            (Some("aac"), _) => "audio/aac",
            (Some("mp4" | "m4v"), _) => "video/mp4",
            (Some("mkv"), _) => "video/x-matroska",
            (Some("webm"), MediaKind::Audio) => "audio/webm",
            (Some("webm"), MediaKind::Video) => "video/webm",
            _ => self.content_type(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "audio" => Ok(MediaKind::Audio),
            "video" => Ok(MediaKind::Video),
            other => Err(format!("unknown media kind '{}'", other)),
        }
    }
}

/// État d'un job
///
/// La progression est monotone : `Pending → InProgress → {Ready | Failed}`,
/// avec le raccourci `Pending → Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum JobState {
    Pending,
    InProgress,
    Ready,
    Failed,
}

impl JobState {
    /// Un job actif peut encore absorber des requêtes dupliquées
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Pending | JobState::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Ready | JobState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::InProgress => "in_progress",
            JobState::Ready => "ready",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Métadonnées descriptives retournées par le fetcher
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct MediaMetadata {
    /// Titre affichable
    #[cfg_attr(feature = "openapi", schema(example = "Never Gonna Give You Up"))]
    pub title: String,
    /// Durée en secondes
    pub duration: u64,
    /// URL de la miniature
    pub thumbnail: Option<String>,
    /// Lien permanent vers la source
    pub permalink: Option<String>,
    /// Chaîne ou auteur
    pub channel: Option<String>,
    /// Nombre de vues
    pub view_count: Option<u64>,
}

/// Un job de téléchargement et son entrée de cache
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Job {
    pub handle: JobHandle,
    /// Clé canonique de la source (ex: identifiant YouTube)
    pub source_key: String,
    pub kind: MediaKind,
    pub state: JobState,
    /// Chemin du fichier, renseigné dès l'entrée en `InProgress`
    #[serde(skip)]
    pub file_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub metadata: Option<MediaMetadata>,
    /// Cause de l'échec, uniquement en état `Failed`
    pub error: Option<String>,
}

impl Job {
    pub(crate) fn new(
        handle: JobHandle,
        source_key: String,
        kind: MediaKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            handle,
            source_key,
            kind,
            state: JobState::Pending,
            file_path: None,
            created_at: now,
            last_accessed_at: now,
            metadata: None,
            error: None,
        }
    }

    /// Durée écoulée depuis le dernier accès
    pub fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_accessed_at
    }
}
