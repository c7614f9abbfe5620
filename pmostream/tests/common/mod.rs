//! Outils partagés par les tests d'intégration
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use pmostream::{
    Clock, FetchedMedia, Fetcher, IdentityResolver, JobHandle, JobStatus, ManualClock, MediaKind,
    MediaMetadata, StreamService, StreamSettings,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;

pub const PAYLOAD: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Fetcher factice qui écrit `PAYLOAD` à la destination demandée
///
/// Avec `gated()`, chaque fetch attend qu'un permis soit ajouté via
/// `release()` avant d'écrire son fichier.
pub struct MockFetcher {
    pub calls: AtomicUsize,
    pub completed: AtomicUsize,
    gate: Option<Semaphore>,
    fail_with: Option<String>,
    hang: bool,
    partial: bool,
    extension: Option<&'static str>,
}

impl MockFetcher {
    pub fn instant() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            gate: None,
            fail_with: None,
            hang: false,
            partial: false,
            extension: None,
        }
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::instant()
        }
    }

    pub fn failing(error: &str) -> Self {
        Self {
            fail_with: Some(error.to_string()),
            ..Self::instant()
        }
    }

    /// Ne termine jamais
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::instant()
        }
    }

    /// Laisse un fichier intermédiaire `{handle}.webm.part` avant de travailler
    pub fn with_partial(mut self) -> Self {
        self.partial = true;
        self
    }

    /// Produit `{handle}.{extension}` au lieu de la destination demandée
    pub fn producing(mut self, extension: &'static str) -> Self {
        self.extension = Some(extension);
        self
    }

    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(
        &self,
        source_key: &str,
        kind: MediaKind,
        destination: &Path,
    ) -> anyhow::Result<FetchedMedia> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.partial {
            tokio::fs::write(destination.with_extension("webm.part"), &PAYLOAD[..4]).await?;
        }

        if self.hang {
            std::future::pending::<()>().await;
        }

        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }

        if let Some(error) = &self.fail_with {
            anyhow::bail!("{}", error);
        }

        let path = match self.extension {
            Some(extension) => destination.with_extension(extension),
            None => destination.to_path_buf(),
        };
        tokio::fs::write(&path, PAYLOAD).await?;
        self.completed.fetch_add(1, Ordering::SeqCst);

        Ok(FetchedMedia {
            path,
            metadata: MediaMetadata {
                title: format!("Title of {}", source_key),
                duration: 212,
                channel: Some(format!("{} channel", kind)),
                ..Default::default()
            },
        })
    }
}

/// Service de test avec horloge manuelle
pub struct TestService {
    pub dir: TempDir,
    pub clock: Arc<ManualClock>,
    pub fetcher: Arc<MockFetcher>,
    pub service: Arc<StreamService>,
}

pub fn settings(dir: &TempDir) -> StreamSettings {
    let mut settings = StreamSettings::new(dir.path().join("streams"));
    settings.ttl = Duration::from_secs(3600);
    settings
}

pub fn build_service(fetcher: MockFetcher) -> TestService {
    build_service_with(fetcher, |_| {})
}

pub fn build_service_with(
    fetcher: MockFetcher,
    configure: impl FnOnce(&mut StreamSettings),
) -> TestService {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings(&dir);
    configure(&mut settings);

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let fetcher = Arc::new(fetcher);
    let service = StreamService::with_parts(
        settings,
        fetcher.clone(),
        Arc::new(IdentityResolver),
        clock.clone() as Arc<dyn Clock>,
    )
    .unwrap();

    TestService {
        dir,
        clock,
        fetcher,
        service: Arc::new(service),
    }
}

/// Noms des fichiers présents dans le répertoire des streams
pub fn stream_files(t: &TestService) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(t.service.store().root())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Interroge le statut jusqu'à ce que `done` soit vrai (5 s max)
pub async fn wait_for_status(
    service: &StreamService,
    handle: &JobHandle,
    done: impl Fn(&JobStatus) -> bool,
) -> JobStatus {
    for _ in 0..500 {
        let status = service.query_status(handle).await;
        if done(&status) {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", handle);
}

pub async fn wait_until_ready(service: &StreamService, handle: &JobHandle) {
    let status = wait_for_status(service, handle, |s| {
        matches!(s, JobStatus::Ready | JobStatus::Failed(_))
    })
    .await;
    assert_eq!(status, JobStatus::Ready);
}

/// Attend une condition quelconque (5 s max)
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
