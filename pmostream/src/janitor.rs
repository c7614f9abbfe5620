//! Éviction périodique des jobs inactifs
//!
//! Le janitor est la seule opération planifiée du service. À chaque passage
//! il retire du registre les jobs dont le dernier accès dépasse le TTL, puis
//! supprime leurs fichiers. Le retrait précède toujours la suppression : un
//! `open` concurrent voit soit le job (et le fichier est encore là), soit
//! "introuvable".

use crate::job::Job;
use crate::registry::JobRegistry;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Paramètres du janitor
#[derive(Debug, Clone)]
pub struct JanitorOptions {
    /// Durée d'inactivité maximale d'un job
    pub ttl: chrono::Duration,
    /// Intervalle entre deux passages
    pub interval: Duration,
    /// Nombre maximal de jobs conservés (0 = illimité)
    pub max_jobs: usize,
}

impl Default for JanitorOptions {
    fn default() -> Self {
        Self {
            ttl: chrono::Duration::seconds(3600),
            interval: Duration::from_secs(3600),
            max_jobs: 0,
        }
    }
}

/// Bilan d'un passage
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Jobs retirés pour inactivité
    pub expired: usize,
    /// Jobs retirés pour respecter `max_jobs`
    pub over_limit: usize,
    /// Fichiers dont la suppression a échoué
    pub release_failures: usize,
}

impl SweepReport {
    pub fn evicted(&self) -> usize {
        self.expired + self.over_limit
    }
}

/// Tâche d'éviction
pub struct Janitor {
    registry: Arc<JobRegistry>,
    options: JanitorOptions,
}

impl Janitor {
    pub fn new(registry: Arc<JobRegistry>, options: JanitorOptions) -> Self {
        Self { registry, options }
    }

    /// Effectue un passage complet
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let cutoff = self.registry.now() - self.options.ttl;

        for handle in self.registry.idle_since(cutoff).await {
            // Le job a pu être rafraîchi depuis l'instantané
            if let Some(job) = self.registry.remove_idle(&handle, cutoff).await {
                report.expired += 1;
                self.release(&job, &mut report).await;
            }
        }

        if self.options.max_jobs > 0 {
            let count = self.registry.len().await;
            if count > self.options.max_jobs {
                let excess = count - self.options.max_jobs;
                for handle in self.registry.least_recently_used(excess).await {
                    if let Some(job) = self.registry.remove(&handle).await {
                        report.over_limit += 1;
                        self.release(&job, &mut report).await;
                    }
                }
            }
        }

        if report.evicted() > 0 {
            let remaining = self.registry.len().await;
            info!(
                expired = report.expired,
                over_limit = report.over_limit,
                release_failures = report.release_failures,
                remaining,
                "Janitor sweep evicted stream jobs"
            );
        } else {
            debug!("Janitor sweep: nothing to evict");
        }

        report
    }

    async fn release(&self, job: &Job, report: &mut SweepReport) {
        debug!(handle = %job.handle, state = %job.state, "Evicting stream job");
        let store = self.registry.store();
        if !store.release_job(&job.handle, job.file_path.as_deref()).await {
            report.release_failures += 1;
        }
    }

    /// Lance la boucle périodique
    ///
    /// Le premier passage a lieu après un intervalle complet.
    pub fn spawn(self) -> JanitorHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let period = self.options.interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                ttl_secs = self.options.ttl.num_seconds(),
                interval_secs = period.as_secs(),
                "Janitor started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Janitor stopped");
        });

        JanitorHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Contrôle de la boucle du janitor
pub struct JanitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl JanitorHandle {
    /// Arrête la boucle et attend sa fin
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Janitor task ended abnormally: {}", e);
        }
    }
}
