//! Fan-out of one snapshot to every destination.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cephflux_types::{Family, Snapshot};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::client::ClientFactory;
use crate::config::{DEFAULT_THREADS, DEFAULT_TIMEOUT};
use crate::destination::Destination;
use crate::error::WriteError;

/// What happened when delivering a snapshot to one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Every family was written.
    Delivered { points: usize },
    /// The host was unreachable or did not answer in time.
    ConnectionFailed { message: String },
    /// The database did not exist. `created` tells whether creating it
    /// succeeded; the snapshot is not re-sent this cycle either way.
    DatabaseMissing { created: bool, message: String },
    /// The destination refused the data.
    WriteRejected { message: String },
    /// Anything else.
    UnexpectedFailure { message: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Delivered { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Delivered { points } => write!(f, "delivered {points} points"),
            Outcome::ConnectionFailed { message } => write!(f, "failed to connect: {message}"),
            Outcome::DatabaseMissing {
                created: true,
                message,
            } => write!(f, "{message}, created it"),
            Outcome::DatabaseMissing {
                created: false,
                message,
            } => write!(f, "{message}, failed to create it"),
            Outcome::WriteRejected { message } => write!(f, "write rejected: {message}"),
            Outcome::UnexpectedFailure { message } => write!(f, "unexpected failure: {message}"),
        }
    }
}

impl From<WriteError> for Outcome {
    fn from(error: WriteError) -> Self {
        let message = error.to_string();
        match error {
            WriteError::Connection(_) | WriteError::Timeout(_) => Outcome::ConnectionFailed { message },
            WriteError::DatabaseNotFound(_) => Outcome::DatabaseMissing {
                created: false,
                message,
            },
            WriteError::Rejected { .. } => Outcome::WriteRejected { message },
            WriteError::Other(_) => Outcome::UnexpectedFailure { message },
        }
    }
}

/// The outcome for one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    pub destination: Destination,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl DeliveryResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Delivers snapshots to destinations concurrently.
///
/// Each destination gets its own task, bounded by a per-destination timeout.
/// A failure only stops delivery to the destination it happened on.
#[derive(Clone)]
pub struct Dispatcher {
    factory: Arc<dyn ClientFactory>,
    concurrency: usize,
    timeout: Duration,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("concurrency", &self.concurrency)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher with the default pool size and timeout.
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            concurrency: DEFAULT_THREADS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT),
        }
    }

    /// Maximum number of destinations delivered to at once.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Time allowed for delivering the whole snapshot to one destination.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Deliver `snapshot` to every destination.
    ///
    /// Results are returned in destination order once every delivery has
    /// finished.
    pub async fn dispatch(
        &self,
        snapshot: &Snapshot,
        destinations: &[Destination],
    ) -> Vec<DeliveryResult> {
        let families: Arc<[Family]> = snapshot.families().into();

        let deliveries = destinations.iter().cloned().map(|destination| {
            let factory = self.factory.clone();
            let families = families.clone();
            let timeout = self.timeout;

            async move {
                let task = tokio::spawn({
                    let destination = destination.clone();
                    async move {
                        match tokio::time::timeout(
                            timeout,
                            deliver(factory.as_ref(), &destination, &families, timeout),
                        )
                        .await
                        {
                            Ok(outcome) => outcome,
                            Err(_) => Outcome::ConnectionFailed {
                                message: format!("timed out after {}s", timeout.as_secs()),
                            },
                        }
                    }
                });

                let outcome = match task.await {
                    Ok(outcome) => outcome,
                    Err(e) => Outcome::UnexpectedFailure {
                        message: format!("delivery task failed: {e}"),
                    },
                };
                log_outcome(&destination, &outcome);

                DeliveryResult {
                    destination,
                    outcome,
                }
            }
        });

        stream::iter(deliveries)
            .buffered(self.concurrency)
            .collect()
            .await
    }
}

async fn deliver(
    factory: &dyn ClientFactory,
    destination: &Destination,
    families: &[Family],
    timeout: Duration,
) -> Outcome {
    let client = match factory.client(destination, timeout) {
        Ok(client) => client,
        Err(e) => return e.into(),
    };

    let mut delivered = 0;
    for family in families {
        match client
            .write(&destination.database, &family.points, destination.precision)
            .await
        {
            Ok(()) => delivered += family.points.len(),
            Err(WriteError::DatabaseNotFound(database)) => {
                let created = match client.create_database(&database).await {
                    Ok(()) => {
                        info!(destination = %destination, "Created missing database");
                        true
                    }
                    Err(e) => {
                        warn!(destination = %destination, error = %e, "Failed to create database");
                        false
                    }
                };
                return Outcome::DatabaseMissing {
                    created,
                    message: format!("Database {database} not found"),
                };
            }
            Err(e) => return e.into(),
        }
    }

    Outcome::Delivered { points: delivered }
}

fn log_outcome(destination: &Destination, outcome: &Outcome) {
    match outcome {
        Outcome::Delivered { points } => {
            debug!(destination = %destination, points, "Delivered snapshot")
        }
        Outcome::UnexpectedFailure { .. } => {
            error!(destination = %destination, %outcome, "Failed to deliver snapshot")
        }
        _ => warn!(destination = %destination, %outcome, "Failed to deliver snapshot"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::client::TimeSeriesClient;
    use crate::destination::{resolve_effective, DestinationDefaults, DestinationOverride};
    use async_trait::async_trait;
    use cephflux_types::{tag, Measurement, Point, Precision, Timestamp};
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    /// How a mock host behaves.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Behavior {
        Accept,
        Unreachable,
        MissingDatabase,
        Reject,
        Hang,
        Panic,
    }

    /// Records every call per hostname.
    #[derive(Debug, Default)]
    pub(crate) struct MockFactory {
        behaviors: Mutex<BTreeMap<String, Behavior>>,
        pub(crate) writes: Mutex<Vec<(String, Measurement, usize)>>,
        pub(crate) creates: Mutex<Vec<String>>,
    }

    impl MockFactory {
        pub(crate) fn set(&self, host: &str, behavior: Behavior) {
            self.behaviors.lock().insert(host.to_string(), behavior);
        }

        pub(crate) fn points_written_to(&self, host: &str) -> usize {
            self.writes
                .lock()
                .iter()
                .filter(|(h, _, _)| h == host)
                .map(|(_, _, n)| n)
                .sum()
        }

        pub(crate) fn creates_for(&self, host: &str) -> usize {
            self.creates.lock().iter().filter(|h| *h == host).count()
        }
    }

    struct MockClient {
        host: String,
        behavior: Behavior,
        factory: Arc<MockFactory>,
    }

    #[async_trait]
    impl TimeSeriesClient for MockClient {
        async fn write(
            &self,
            _database: &str,
            points: &[Point],
            _precision: Precision,
        ) -> Result<(), WriteError> {
            match self.behavior {
                Behavior::Accept => {
                    let measurement = points[0].measurement();
                    self.factory
                        .writes
                        .lock()
                        .push((self.host.clone(), measurement, points.len()));
                    Ok(())
                }
                Behavior::Unreachable => Err(WriteError::Connection("connection refused".into())),
                Behavior::MissingDatabase => Err(WriteError::DatabaseNotFound("ceph".into())),
                Behavior::Reject => Err(WriteError::Rejected {
                    status: 401,
                    message: "authorization failed".into(),
                }),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
                Behavior::Panic => panic!("client bug"),
            }
        }

        async fn create_database(&self, _database: &str) -> Result<(), WriteError> {
            self.factory.creates.lock().push(self.host.clone());
            Ok(())
        }
    }

    /// Wraps the shared mock state so it can be handed out as a factory.
    #[derive(Clone)]
    pub(crate) struct SharedMock(pub(crate) Arc<MockFactory>);

    impl ClientFactory for SharedMock {
        fn client(
            &self,
            destination: &Destination,
            _timeout: Duration,
        ) -> Result<Arc<dyn TimeSeriesClient>, WriteError> {
            let behavior = self
                .0
                .behaviors
                .lock()
                .get(&destination.hostname)
                .copied()
                .unwrap_or(Behavior::Accept);
            Ok(Arc::new(MockClient {
                host: destination.hostname.clone(),
                behavior,
                factory: self.0.clone(),
            }))
        }
    }

    pub(crate) fn destination(host: &str) -> Destination {
        resolve_effective(&DestinationOverride::new(host), &DestinationDefaults::default()).unwrap()
    }

    pub(crate) fn snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new();
        for (osd, count) in [(0, 64.0), (1, 0.0)] {
            snapshot.push(
                Point::builder(Measurement::PgSummaryOsd)
                    .tag(tag::CEPH_DAEMON, format!("osd.{osd}"))
                    .tag(tag::TYPE_INSTANCE, "active+clean")
                    .tag(tag::HOST, "node-a")
                    .timestamp(Timestamp::from_millis(1))
                    .value(count)
                    .build()
                    .unwrap(),
            );
        }
        snapshot.push(
            Point::builder(Measurement::PoolStats)
                .tag(tag::POOL_NAME, "rbd")
                .tag(tag::POOL_ID, 1)
                .tag(tag::TYPE_INSTANCE, "objects")
                .tag(tag::FSID, "c0ffee")
                .timestamp(Timestamp::from_millis(1))
                .value(12.0)
                .build()
                .unwrap(),
        );
        snapshot
    }

    fn dispatcher(mock: &Arc<MockFactory>) -> Dispatcher {
        Dispatcher::new(Arc::new(SharedMock(mock.clone())))
    }

    #[tokio::test]
    async fn delivers_every_family_to_every_destination() {
        let mock = Arc::new(MockFactory::default());
        let destinations = vec![destination("influx-a"), destination("influx-b")];

        let results = dispatcher(&mock).dispatch(&snapshot(), &destinations).await;

        assert_eq!(results.len(), 2);
        for result in &results {
            assert_eq!(result.outcome, Outcome::Delivered { points: 3 });
        }
        // Families are written in catalogue order.
        let writes = mock.writes.lock().clone();
        let for_a: Vec<_> = writes
            .iter()
            .filter(|(h, _, _)| h == "influx-a")
            .map(|(_, m, _)| *m)
            .collect();
        assert_eq!(for_a, vec![Measurement::PoolStats, Measurement::PgSummaryOsd]);
    }

    #[tokio::test]
    async fn one_unreachable_destination_does_not_affect_the_others() {
        let mock = Arc::new(MockFactory::default());
        mock.set("influx-b", Behavior::Unreachable);
        let destinations = vec![
            destination("influx-a"),
            destination("influx-b"),
            destination("influx-c"),
        ];

        let results = dispatcher(&mock).dispatch(&snapshot(), &destinations).await;

        let hosts: Vec<_> = results.iter().map(|r| r.destination.hostname.as_str()).collect();
        assert_eq!(hosts, vec!["influx-a", "influx-b", "influx-c"]);
        assert!(results[0].is_success());
        assert!(matches!(results[1].outcome, Outcome::ConnectionFailed { .. }));
        assert!(results[2].is_success());
        assert_eq!(mock.points_written_to("influx-a"), 3);
        assert_eq!(mock.points_written_to("influx-c"), 3);
    }

    #[tokio::test]
    async fn missing_database_is_created_once_without_retry() {
        let mock = Arc::new(MockFactory::default());
        mock.set("influx-a", Behavior::MissingDatabase);

        let results = dispatcher(&mock)
            .dispatch(&snapshot(), &[destination("influx-a")])
            .await;

        assert!(matches!(
            results[0].outcome,
            Outcome::DatabaseMissing { created: true, .. }
        ));
        assert_eq!(mock.creates_for("influx-a"), 1);
        assert_eq!(mock.points_written_to("influx-a"), 0);
    }

    #[tokio::test]
    async fn rejection_is_reported() {
        let mock = Arc::new(MockFactory::default());
        mock.set("influx-a", Behavior::Reject);

        let results = dispatcher(&mock)
            .dispatch(&snapshot(), &[destination("influx-a")])
            .await;

        match &results[0].outcome {
            Outcome::WriteRejected { message } => assert!(message.contains("authorization failed")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_destination_times_out() {
        let mock = Arc::new(MockFactory::default());
        mock.set("influx-a", Behavior::Hang);

        let results = dispatcher(&mock)
            .timeout(Duration::from_secs(2))
            .dispatch(&snapshot(), &[destination("influx-a"), destination("influx-b")])
            .await;

        assert!(matches!(results[0].outcome, Outcome::ConnectionFailed { .. }));
        assert!(results[1].is_success());
    }

    #[tokio::test]
    async fn panicking_delivery_is_an_unexpected_failure() {
        let mock = Arc::new(MockFactory::default());
        mock.set("influx-a", Behavior::Panic);

        let results = dispatcher(&mock)
            .dispatch(&snapshot(), &[destination("influx-a"), destination("influx-b")])
            .await;

        assert!(matches!(results[0].outcome, Outcome::UnexpectedFailure { .. }));
        assert!(results[1].is_success());
    }

    #[tokio::test]
    async fn empty_snapshot_delivers_zero_points() {
        let mock = Arc::new(MockFactory::default());
        let results = dispatcher(&mock)
            .dispatch(&Snapshot::new(), &[destination("influx-a")])
            .await;

        assert_eq!(results[0].outcome, Outcome::Delivered { points: 0 });
        assert!(mock.writes.lock().is_empty());
    }

    #[test]
    fn write_errors_map_to_outcomes() {
        assert!(matches!(
            Outcome::from(WriteError::Timeout("slow".into())),
            Outcome::ConnectionFailed { .. }
        ));
        assert!(matches!(
            Outcome::from(WriteError::Other("?".into())),
            Outcome::UnexpectedFailure { .. }
        ));
    }
}
