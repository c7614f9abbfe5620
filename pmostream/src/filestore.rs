//! Stockage des fichiers téléchargés
//!
//! Le `FileStore` possède un répertoire de travail dédié. Chaque job y reçoit
//! un chemin unique `{handle}.{extension}` qu'il possède seul jusqu'à son
//! éviction.

use crate::job::{JobHandle, MediaKind};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Répertoire de travail des fichiers de stream
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Crée le store et son répertoire s'il n'existe pas
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Retourne le répertoire racine
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Construit le chemin réservé à un job
    ///
    /// Format: `{root}/{handle}.{extension}`. Aucune I/O n'est effectuée.
    pub fn allocate(&self, handle: &JobHandle, kind: MediaKind) -> PathBuf {
        self.root
            .join(format!("{}.{}", handle.as_str(), kind.file_extension()))
    }

    /// Supprime un fichier du store
    ///
    /// Un fichier déjà absent est un succès. Les autres erreurs sont
    /// journalisées et signalées par `false`, jamais propagées.
    pub async fn release(&self, path: &Path) -> bool {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Released stream file");
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot delete stream file");
                false
            }
        }
    }

    /// Supprime tous les fichiers d'un job
    ///
    /// Le fetcher peut laisser des intermédiaires à côté du fichier final
    /// (`{handle}.webm.part`, `{handle}.f137.mp4`...) : tout fichier du
    /// répertoire préfixé par `{handle}.` est supprimé, ainsi que `path` s'il
    /// est situé ailleurs. Retourne `false` si une suppression a échoué.
    pub async fn release_job(&self, handle: &JobHandle, path: Option<&Path>) -> bool {
        let mut released = match path {
            Some(path) => self.release(path).await,
            None => true,
        };

        let prefix = format!("{}.", handle.as_str());
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "Cannot scan stream directory");
                return false;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let owned = entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| name.starts_with(&prefix));
                    if owned && !self.release(&entry.path()).await {
                        released = false;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(root = %self.root.display(), error = %e, "Cannot scan stream directory");
                    released = false;
                    break;
                }
            }
        }

        released
    }

    /// Ouvre un fichier en lecture et retourne sa taille
    pub async fn open(&self, path: &Path) -> io::Result<(tokio::fs::File, u64)> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    /// Supprime tous les fichiers présents dans le répertoire
    ///
    /// Le registre n'étant pas persistant, tout fichier trouvé au démarrage
    /// est orphelin. Retourne le nombre de fichiers supprimés.
    pub async fn reset(&self) -> io::Result<usize> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() && self.release(&path).await {
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed, root = %self.root.display(), "Removed orphan stream files");
        }
        Ok(removed)
    }
}
