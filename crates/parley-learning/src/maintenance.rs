//! Periodic dictionary cleanup.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::learning_loop::LearningLoop;

/// Background task that runs [`LearningLoop::cleanup_unused`] on a fixed
/// interval until shut down.
pub struct MaintenanceScheduler {
    learning: LearningLoop,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl MaintenanceScheduler {
    /// Schedule cleanups at the loop's configured interval.
    pub fn new(learning: LearningLoop) -> Self {
        let interval = learning.config().cleanup_interval();
        Self::with_interval(learning, interval)
    }

    pub fn with_interval(learning: LearningLoop, interval: Duration) -> Self {
        Self {
            learning,
            interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Run until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) {
        if self.interval.is_zero() {
            tracing::info!("Dictionary maintenance disabled");
            self.shutdown.notified().await;
            return;
        }
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    let removed = self.learning.cleanup_unused();
                    tracing::info!(removed, "Scheduled dictionary cleanup");
                }
                _ = self.shutdown.notified() => {
                    tracing::debug!("Maintenance scheduler stopped");
                    return;
                }
            }
        }
    }

    /// Signal the scheduler to stop.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::NoopEffects;
    use parley_core::config::{DictionaryConfig, LearningConfig};
    use parley_core::types::{CommandSource, Timestamp};
    use parley_dictionary::store::write_document;
    use parley_dictionary::{CommandDictionary, CommandEntry, DictionaryDocument};
    use std::collections::BTreeSet;

    fn learning(dir: &tempfile::TempDir) -> LearningLoop {
        let dictionary = Arc::new(CommandDictionary::new(
            dir.path().join("commands.json"),
            DictionaryConfig::default(),
        ));
        LearningLoop::new(dictionary, Arc::new(NoopEffects), LearningConfig::default())
    }

    #[tokio::test]
    async fn test_scheduler_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = MaintenanceScheduler::new(learning(&dir));

        scheduler.shutdown();

        tokio::time::timeout(Duration::from_secs(2), scheduler.run())
            .await
            .expect("Scheduler should shut down within timeout");
    }

    #[tokio::test]
    async fn test_zero_interval_waits_for_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = MaintenanceScheduler::with_interval(learning(&dir), Duration::ZERO);
        scheduler.shutdown();
        tokio::time::timeout(Duration::from_secs(2), scheduler.run())
            .await
            .expect("Disabled scheduler should still shut down");
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_runs_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.json");

        let mut stale = CommandEntry::new(
            BTreeSet::from(["zap it".to_string()]),
            "DELETE_LINE".to_string(),
            None,
            0.32,
            CommandSource::Learned,
        );
        stale.created_at = Timestamp(Timestamp::now().0 - 60 * 86_400);
        let document = DictionaryDocument {
            entries: vec![stale],
            ..DictionaryDocument::default()
        };
        write_document(&path, &document).unwrap();

        let dictionary = Arc::new(CommandDictionary::open(&path, DictionaryConfig::default(), &[]));
        assert!(dictionary.entry_for("zap it").is_some());
        let learning = LearningLoop::new(
            dictionary.clone(),
            Arc::new(NoopEffects),
            LearningConfig::default(),
        );

        let scheduler = Arc::new(MaintenanceScheduler::with_interval(
            learning,
            Duration::from_secs(60),
        ));
        let runner = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run().await })
        };

        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;
        scheduler.shutdown();
        runner.await.unwrap();

        assert!(dictionary.entry_for("zap it").is_none());
    }
}
