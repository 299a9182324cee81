//! The periodic collection loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::AlreadyRunning;
use crate::exporter::Exporter;

impl Exporter {
    /// Start running cycles in the background.
    ///
    /// The first cycle runs immediately; after each cycle the loop waits for
    /// the configured interval, re-read every time, or for a stop request.
    ///
    /// Only one loop runs per exporter. Starting again is refused until the
    /// running loop has exited.
    pub fn start(self: &Arc<Self>) -> Result<ScheduleHandle, AlreadyRunning> {
        if self.scheduled.swap(true, Ordering::AcqRel) {
            return Err(AlreadyRunning);
        }
        Ok(spawn(self.clone()))
    }
}

/// Handle for controlling the collection loop.
///
/// Drop this handle to stop the loop, or call [`stop`](Self::stop) or
/// [`shutdown`](Self::shutdown) explicitly.
#[derive(Debug)]
pub struct ScheduleHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ScheduleHandle {
    /// Ask the loop to stop. A cycle in progress is allowed to finish.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Whether the loop is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(self) {
        self.stop();
        let _ = self.task.await;
    }
}

/// Clears the scheduled flag when the loop exits, however it exits.
struct Scheduled<'a>(&'a AtomicBool);

impl Drop for Scheduled<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn spawn(exporter: Arc<Exporter>) -> ScheduleHandle {
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let _scheduled = Scheduled(&exporter.scheduled);
        info!("Starting collection loop");

        loop {
            if *stop_rx.borrow() {
                break;
            }

            exporter.run_cycle().await;

            let interval = exporter.interval();
            debug!(seconds = interval.as_secs(), "Waiting for next cycle");
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Stopped collection loop");
    });

    ScheduleHandle { stop_tx, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::destination::DestinationOverride;
    use crate::dispatch::tests::MockFactory;
    use crate::exporter::tests::exporter_with;
    use std::time::Duration;

    fn exporter(mock: &Arc<MockFactory>) -> Arc<Exporter> {
        Arc::new(exporter_with(
            mock,
            Settings {
                destinations: vec![DestinationOverride::new("influx-a")],
                ..Default::default()
            },
        ))
    }

    fn cycles(mock: &MockFactory) -> usize {
        // Three points per cycle.
        mock.points_written_to("influx-a") / 3
    }

    #[tokio::test(start_paused = true)]
    async fn runs_immediately_then_every_interval() {
        let mock = Arc::new(MockFactory::default());
        let handle = exporter(&mock).start().unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(cycles(&mock), 3);
        assert!(handle.is_running());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_refused_while_running() {
        let mock = Arc::new(MockFactory::default());
        let exporter = exporter(&mock);
        let handle = exporter.start().unwrap();

        assert_eq!(exporter.start().unwrap_err(), AlreadyRunning);
        assert!(exporter.is_scheduled());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(cycles(&mock), 3);

        handle.shutdown().await;
        assert!(!exporter.is_scheduled());

        let restarted = exporter.start().unwrap();
        restarted.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_handle_allows_a_new_start() {
        let mock = Arc::new(MockFactory::default());
        let exporter = exporter(&mock);
        drop(exporter.start().unwrap());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!exporter.is_scheduled());
        exporter.start().unwrap().shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_the_loop_at_the_wait() {
        let mock = Arc::new(MockFactory::default());
        let handle = exporter(&mock).start().unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.shutdown().await;
        assert_eq!(cycles(&mock), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(cycles(&mock), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_change_applies_to_next_wait() {
        let mock = Arc::new(MockFactory::default());
        let exporter = exporter(&mock);
        let handle = exporter.start().unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        exporter.set_config("interval", "5").unwrap();

        // The wait already in progress keeps the old 30s interval.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(cycles(&mock), 2);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(cycles(&mock), 4);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_loop() {
        let mock = Arc::new(MockFactory::default());
        let handle = exporter(&mock).start().unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(handle);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(cycles(&mock), 1);
    }
}
