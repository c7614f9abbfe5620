//! Téléchargement via yt-dlp

use crate::command;
use crate::error::YtDlpError;
use crate::info::VideoInfo;
use crate::resolver::extract_video_id;
use async_trait::async_trait;
use pmostream::{FetchedMedia, Fetcher, MediaKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const AUDIO_FORMAT: &str = "bestaudio/best";
const VIDEO_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

/// Fetcher qui délègue le téléchargement et la conversion à yt-dlp
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    binary: String,
}

impl YtDlpFetcher {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

/// URL passée à yt-dlp pour une clé source
///
/// Un identifiant YouTube est converti en URL `watch`, toute autre clé
/// (URL d'un autre site) est transmise telle quelle.
pub fn source_url(source_key: &str) -> String {
    match extract_video_id(source_key) {
        Some(id) if id == source_key.trim() => format!("https://www.youtube.com/watch?v={}", id),
        _ => source_key.trim().to_string(),
    }
}

/// Arguments de la ligne de commande pour un téléchargement
pub fn download_args(source_key: &str, kind: MediaKind, destination: &Path) -> Vec<String> {
    let template = destination.with_extension("%(ext)s");

    let mut args: Vec<String> = [
        "--no-playlist",
        "--retries",
        "3",
        "--continue",
        "--no-warnings",
        "--print-json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    match kind {
        MediaKind::Audio => args.extend(
            ["-f", AUDIO_FORMAT, "-x", "--audio-format", "mp3"]
                .iter()
                .map(|s| s.to_string()),
        ),
        MediaKind::Video => args.extend(
            ["-f", VIDEO_FORMAT, "--merge-output-format", "mp4"]
                .iter()
                .map(|s| s.to_string()),
        ),
    }

    args.push("-o".to_string());
    args.push(template.to_string_lossy().into_owned());
    args.push("--".to_string());
    args.push(source_url(source_key));
    args
}

/// Retrouve le fichier produit
///
/// En principe `destination` ; sinon le premier fichier `{stem}.*` du même
/// répertoire (format de repli non converti).
async fn locate_output(destination: &Path) -> Option<PathBuf> {
    if tokio::fs::metadata(destination).await.is_ok_and(|m| m.is_file()) {
        return Some(destination.to_path_buf());
    }

    let stem = destination.file_stem()?.to_string_lossy().into_owned();
    let prefix = format!("{}.", stem);
    let mut entries = tokio::fs::read_dir(destination.parent()?).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) && !name.ends_with(".part") && !name.ends_with(".ytdl") {
            return Some(entry.path());
        }
    }
    None
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    async fn fetch(
        &self,
        source_key: &str,
        kind: MediaKind,
        destination: &Path,
    ) -> anyhow::Result<FetchedMedia> {
        let args = download_args(source_key, kind, destination);
        info!(source_key, %kind, destination = %destination.display(), "Starting yt-dlp download");

        let stdout = command::run(&self.binary, &args).await?;
        let info = VideoInfo::from_stdout(&stdout)?;

        let path = locate_output(destination)
            .await
            .ok_or_else(|| YtDlpError::MissingFile(destination.to_path_buf()))?;
        debug!(source_key, path = %path.display(), "yt-dlp download finished");

        Ok(FetchedMedia {
            path,
            metadata: info.into_metadata(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_url() {
        assert_eq!(
            source_url("dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            source_url("https://soundcloud.com/artist/track"),
            "https://soundcloud.com/artist/track"
        );
    }

    #[test]
    fn test_audio_args() {
        let args = download_args("dQw4w9WgXcQ", MediaKind::Audio, Path::new("/tmp/s/abc.mp3"));

        assert!(args.windows(2).any(|w| w == ["-f", "bestaudio/best"]));
        assert!(args.windows(2).any(|w| w == ["--audio-format", "mp3"]));
        assert!(args.contains(&"-x".to_string()));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(args.windows(2).any(|w| w == ["-o", "/tmp/s/abc.%(ext)s"]));
        assert_eq!(
            args.last().map(String::as_str),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
    }

    #[test]
    fn test_video_args() {
        let args = download_args("-abc_123XYZ", MediaKind::Video, Path::new("/tmp/s/abc.mp4"));

        assert!(args.windows(2).any(|w| w == ["-f", VIDEO_FORMAT]));
        assert!(args.windows(2).any(|w| w == ["--merge-output-format", "mp4"]));
        assert!(!args.contains(&"-x".to_string()));
        // L'identifiant commençant par '-' suit le séparateur
        let sep = args.iter().position(|a| a == "--").unwrap();
        assert_eq!(sep, args.len() - 2);
    }
}
