//! Collaborateurs externes : récupération et résolution des médias
//!
//! Le service ne sait pas comment un média est obtenu. Il délègue à un
//! [`Fetcher`] (téléchargement/transcodage vers un chemin donné) et à un
//! [`SourceResolver`] (URL ou recherche libre → clé source canonique).

use crate::job::{MediaKind, MediaMetadata};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Média récupéré par un fetcher
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    /// Chemin effectif du fichier produit
    ///
    /// En général le chemin de destination demandé ; un fetcher peut en
    /// produire un autre dans le même répertoire.
    pub path: PathBuf,
    pub metadata: MediaMetadata,
}

/// Capacité de récupération d'un média
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Récupère `source_key` au format `kind` et l'écrit à `destination`
    async fn fetch(
        &self,
        source_key: &str,
        kind: MediaKind,
        destination: &Path,
    ) -> anyhow::Result<FetchedMedia>;
}

/// Résolution d'une requête utilisateur en clé source
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> anyhow::Result<String>;
}

/// Résolveur trivial : la requête est déjà la clé source
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityResolver;

#[async_trait]
impl SourceResolver for IdentityResolver {
    async fn resolve(&self, query: &str) -> anyhow::Result<String> {
        let key = query.trim();
        if key.is_empty() {
            anyhow::bail!("empty query");
        }
        Ok(key.to_string())
    }
}
