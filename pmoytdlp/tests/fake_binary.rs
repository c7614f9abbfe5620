//! Tests avec un faux binaire yt-dlp (script shell)
#![cfg(unix)]

use pmostream::{Fetcher, MediaKind, SourceResolver};
use pmoytdlp::{YtDlpFetcher, YtDlpResolver};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Écrit un script exécutable jouant le rôle de yt-dlp
fn fake_ytdlp(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("yt-dlp");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Script qui écrit un fichier selon le gabarit `-o` et imprime le JSON
const DOWNLOADER: &str = r#"
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
ext="${FAKE_EXT:-mp3}"
file=$(echo "$out" | sed "s/%(ext)s/$ext/")
printf 'fake media' > "$file"
echo '{"id":"dQw4w9WgXcQ","title":"Never Gonna Give You Up","duration":212,"uploader":"Rick Astley"}'
"#;

fn bin(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[tokio::test]
async fn test_fetch_writes_destination_and_reads_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let binary = fake_ytdlp(&dir, DOWNLOADER);
    let destination = dir.path().join("job.mp3");

    let fetched = YtDlpFetcher::new(bin(&binary))
        .fetch("dQw4w9WgXcQ", MediaKind::Audio, &destination)
        .await
        .unwrap();

    assert_eq!(fetched.path, destination);
    assert_eq!(std::fs::read(&destination).unwrap(), b"fake media");
    assert_eq!(fetched.metadata.title, "Never Gonna Give You Up");
    assert_eq!(fetched.metadata.duration, 212);
    assert_eq!(fetched.metadata.channel.as_deref(), Some("Rick Astley"));
}

#[tokio::test]
async fn test_fetch_reports_failure_with_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let binary = fake_ytdlp(&dir, "echo 'ERROR: Video unavailable' >&2\nexit 1");

    let err = YtDlpFetcher::new(bin(&binary))
        .fetch("dQw4w9WgXcQ", MediaKind::Video, &dir.path().join("job.mp4"))
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("Video unavailable"));
}

#[tokio::test]
async fn test_fetch_without_output_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let binary = fake_ytdlp(&dir, r#"echo '{"id":"dQw4w9WgXcQ"}'"#);

    let err = YtDlpFetcher::new(bin(&binary))
        .fetch("dQw4w9WgXcQ", MediaKind::Audio, &dir.path().join("job.mp3"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("No output file"));
}

#[tokio::test]
async fn test_missing_binary() {
    let dir = tempfile::tempdir().unwrap();
    let err = YtDlpFetcher::new(bin(&dir.path().join("nope")))
        .fetch("dQw4w9WgXcQ", MediaKind::Audio, &dir.path().join("job.mp3"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Cannot run"));
}

#[tokio::test]
async fn test_resolver_search_and_direct_ids() {
    let dir = tempfile::tempdir().unwrap();
    let binary = fake_ytdlp(&dir, "echo ''\necho 'yPYZpwSpKmA'");
    let resolver = YtDlpResolver::new(bin(&binary));

    assert_eq!(resolver.resolve("together forever").await.unwrap(), "yPYZpwSpKmA");
    assert_eq!(
        resolver
            .resolve("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap(),
        "dQw4w9WgXcQ"
    );
    assert!(resolver.resolve("  ").await.is_err());
}

#[tokio::test]
async fn test_resolver_no_results() {
    let dir = tempfile::tempdir().unwrap();
    let binary = fake_ytdlp(&dir, "exit 0");

    let err = YtDlpResolver::new(bin(&binary))
        .resolve("zzzz nothing")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("No results found"));
}
