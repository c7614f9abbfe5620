//! Gestion des erreurs du service de streaming

use crate::job::JobState;
use thiserror::Error;

/// Type Result personnalisé pour pmostream
pub type Result<T> = std::result::Result<T, StreamError>;

/// Erreurs possibles lors de la gestion des jobs de streaming
#[derive(Error, Debug)]
pub enum StreamError {
    /// Handle inconnu ou déjà évincé
    #[error("Stream not found: {0}")]
    NotFound(String),

    /// Handle valide mais le téléchargement n'est pas terminé
    #[error("Stream not ready: {0}")]
    NotReady(String),

    /// Le fetcher a échoué pour cette source
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// Erreur du système de fichiers (allocation, lecture, suppression)
    #[error("Store error: {0}")]
    Store(#[from] std::io::Error),

    /// Transition d'état refusée par le registre
    #[error("Invalid transition for {handle}: {from} -> {to}")]
    InvalidTransition {
        handle: String,
        from: JobState,
        to: JobState,
    },

    /// Impossible de générer un handle unique
    #[error("Handle space exhausted after {0} attempts")]
    HandleSpaceExhausted(usize),

    /// La requête n'a pas pu être résolue en clé source
    #[error("Cannot resolve source: {0}")]
    Resolve(String),
}

impl StreamError {
    /// Indique si l'erreur correspond à un handle inconnu ou évincé
    pub fn is_not_found(&self) -> bool {
        matches!(self, StreamError::NotFound(_))
    }

    /// Indique si l'appelant doit simplement réessayer plus tard
    pub fn is_not_ready(&self) -> bool {
        matches!(self, StreamError::NotReady(_))
    }
}
