//! Exécution du binaire yt-dlp

use crate::error::{Result, YtDlpError};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Longueur maximale du stderr conservé dans les erreurs
const MAX_STDERR: usize = 2000;

/// Lance yt-dlp et retourne sa sortie standard
///
/// Le processus est tué si le future est abandonné (timeout du fetch).
pub(crate) async fn run(binary: &str, args: &[String]) -> Result<String> {
    debug!(binary, ?args, "Running yt-dlp");

    let output = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| YtDlpError::Spawn {
            binary: binary.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(YtDlpError::Failed {
            status: output.status.to_string(),
            stderr: tail(&String::from_utf8_lossy(&output.stderr)),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Garde la fin du message, là où yt-dlp écrit la cause
fn tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= MAX_STDERR {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - MAX_STDERR;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}
