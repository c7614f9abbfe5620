//! Gestion des erreurs pour l'intégration yt-dlp

use std::path::PathBuf;
use thiserror::Error;

/// Type Result personnalisé pour pmoytdlp
pub type Result<T> = std::result::Result<T, YtDlpError>;

/// Erreurs possibles lors de l'appel à yt-dlp
#[derive(Error, Debug)]
pub enum YtDlpError {
    /// Le binaire n'a pas pu être lancé (absent, non exécutable)
    #[error("Cannot run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// yt-dlp s'est terminé en erreur
    #[error("yt-dlp exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    /// La recherche n'a retourné aucune vidéo
    #[error("No results found for '{0}'")]
    NoResult(String),

    /// Sortie JSON illisible
    #[error("Invalid yt-dlp output: {0}")]
    InvalidOutput(String),

    /// Le téléchargement n'a produit aucun fichier
    #[error("No output file for {0}")]
    MissingFile(PathBuf),
}
