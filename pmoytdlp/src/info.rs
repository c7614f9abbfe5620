//! Lecture du JSON produit par `yt-dlp --print-json`

use crate::error::{Result, YtDlpError};
use pmostream::MediaMetadata;
use serde::Deserialize;

/// Sous-ensemble des champs d'info yt-dlp utilisés
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Secondes, parfois fractionnaires
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub view_count: Option<u64>,
}

impl VideoInfo {
    /// Analyse la sortie standard ; la dernière ligne JSON fait foi
    pub fn from_stdout(stdout: &str) -> Result<Self> {
        let line = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| line.starts_with('{'))
            .ok_or_else(|| YtDlpError::InvalidOutput("no JSON document".to_string()))?;

        serde_json::from_str(line).map_err(|e| YtDlpError::InvalidOutput(e.to_string()))
    }

    pub fn into_metadata(self) -> MediaMetadata {
        MediaMetadata {
            title: self
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| self.id.clone()),
            duration: self
                .duration
                .filter(|d| d.is_finite() && *d > 0.0)
                .map(|d| d.round() as u64)
                .unwrap_or(0),
            thumbnail: self.thumbnail,
            permalink: self
                .webpage_url
                .or_else(|| Some(format!("https://www.youtube.com/watch?v={}", self.id))),
            channel: self.uploader.or(self.channel),
            view_count: self.view_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_info() {
        let stdout = r#"[download] Destination: x.webm
{"id":"dQw4w9WgXcQ","title":"Never Gonna Give You Up","duration":212.4,"thumbnail":"https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg","webpage_url":"https://www.youtube.com/watch?v=dQw4w9WgXcQ","uploader":"Rick Astley","channel":"Rick Astley Official","view_count":1500000000,"formats":[]}
"#;
        let metadata = VideoInfo::from_stdout(stdout).unwrap().into_metadata();

        assert_eq!(metadata.title, "Never Gonna Give You Up");
        assert_eq!(metadata.duration, 212);
        assert_eq!(metadata.channel.as_deref(), Some("Rick Astley"));
        assert_eq!(metadata.view_count, Some(1_500_000_000));
        assert_eq!(
            metadata.permalink.as_deref(),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
    }

    #[test]
    fn test_parse_minimal_info() {
        let metadata = VideoInfo::from_stdout(r#"{"id":"abc123defgh","channel":"Someone"}"#)
            .unwrap()
            .into_metadata();

        assert_eq!(metadata.title, "abc123defgh");
        assert_eq!(metadata.duration, 0);
        assert_eq!(metadata.channel.as_deref(), Some("Someone"));
        assert!(metadata.thumbnail.is_none());
        assert_eq!(
            metadata.permalink.as_deref(),
            Some("https://www.youtube.com/watch?v=abc123defgh")
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            VideoInfo::from_stdout("ERROR: nothing here"),
            Err(YtDlpError::InvalidOutput(_))
        ));
        assert!(matches!(
            VideoInfo::from_stdout("{not json"),
            Err(YtDlpError::InvalidOutput(_))
        ));
    }
}
