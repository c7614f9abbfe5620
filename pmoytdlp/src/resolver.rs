//! Résolution d'une requête utilisateur en identifiant YouTube
//!
//! Trois formes sont acceptées :
//! - une URL (`watch?v=`, `youtu.be/`, `embed/`, `shorts/`) dont on extrait l'identifiant
//! - un identifiant nu de 11 caractères
//! - une recherche libre, confiée à `yt-dlp ytsearch1:`

use crate::command;
use crate::error::YtDlpError;
use async_trait::async_trait;
use lazy_static::lazy_static;
use pmostream::SourceResolver;
use regex::Regex;
use tracing::debug;

lazy_static! {
    static ref URL_ID: Regex =
        Regex::new(r"(?:[?&]v=|youtu\.be/|/embed/|/shorts/|/live/)([A-Za-z0-9_-]{11})")
            .expect("valid video id regex");
    static ref BARE_ID: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid bare id regex");
}

/// Extrait l'identifiant d'une URL YouTube ou d'un identifiant nu
///
/// Un mot de 11 lettres minuscules est traité comme une recherche : un
/// identifiant contient presque toujours un chiffre, une majuscule, `-` ou `_`.
pub fn extract_video_id(query: &str) -> Option<String> {
    let query = query.trim();

    if let Some(captures) = URL_ID.captures(query) {
        return captures.get(1).map(|m| m.as_str().to_string());
    }

    if BARE_ID.is_match(query) && !query.chars().all(|c| c.is_ascii_lowercase()) {
        return Some(query.to_string());
    }

    None
}

/// Résolveur s'appuyant sur yt-dlp pour les recherches
#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    binary: String,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Premier résultat de recherche
    async fn search(&self, query: &str) -> crate::Result<String> {
        let args = vec![
            "--get-id".to_string(),
            "--flat-playlist".to_string(),
            "--no-warnings".to_string(),
            "--".to_string(),
            format!("ytsearch1:{}", query),
        ];
        let stdout = command::run(&self.binary, &args).await?;

        stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| YtDlpError::NoResult(query.to_string()))
    }
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl SourceResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> anyhow::Result<String> {
        let query = query.trim();
        if query.is_empty() {
            anyhow::bail!("empty query");
        }

        if let Some(id) = extract_video_id(query) {
            return Ok(id);
        }

        let id = self.search(query).await?;
        debug!(query, id = %id, "Search resolved");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_urls() {
        let cases = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s",
            "https://www.youtube.com/watch?list=PL123&v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://youtube.com/shorts/dQw4w9WgXcQ",
            "https://music.youtube.com/watch?v=dQw4w9WgXcQ",
        ];
        for url in cases {
            assert_eq!(extract_video_id(url).as_deref(), Some("dQw4w9WgXcQ"), "{}", url);
        }
    }

    #[test]
    fn test_bare_ids() {
        assert_eq!(extract_video_id(" dQw4w9WgXcQ ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(extract_video_id("-abc_123XYZ").as_deref(), Some("-abc_123XYZ"));
        // Mot de 11 lettres : recherche
        assert_eq!(extract_video_id("rickastleys"), None);
        assert_eq!(extract_video_id("never gonna give you up"), None);
        assert_eq!(extract_video_id("dQw4w9WgXcQx"), None);
    }
}
