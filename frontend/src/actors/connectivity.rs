//! Connectivity domain: network status as a reactive value.
//!
//! A [`ConnectivityObserver`] turns some status source into a stream of
//! [`ConnectivityStatus`] changes. [`ConnectivityDomain`] subscribes to it
//! once and keeps the latest status for renderers. Statuses seen before a
//! renderer subscribes are not replayed; it only gets the current one.

use crate::dataflow::{Actor, Emission, Flow, Scope, StateFlow};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use shared::{ConnectivitySection, ConnectivityStatus};
use std::time::Duration;
use tokio::net::TcpStream;

/// Source of connectivity status changes.
pub trait ConnectivityObserver: Send + Sync {
    /// A fresh stream of status changes.
    fn observe(&self) -> BoxStream<'static, ConnectivityStatus>;
}

/// Latest known connectivity, `Unavailable` until the observer says otherwise.
#[derive(Clone, Debug)]
pub struct ConnectivityDomain {
    status: Actor<ConnectivityStatus>,
}

impl ConnectivityDomain {
    pub fn new(scope: &Scope, observer: &dyn ConnectivityObserver) -> Self {
        let mut changes = observer.observe();

        let status = Actor::new(scope, ConnectivityStatus::Unavailable, async move |state| {
            while let Some(next) = changes.next().await {
                let previous = state.get();
                if state.set_neq(next) {
                    log::info!("connectivity {previous} -> {next}");
                }
            }
            log::debug!("connectivity observer finished");
        });

        Self { status }
    }

    pub fn status(&self) -> StateFlow<ConnectivityStatus> {
        self.status.signal()
    }
}

/// Replays a fixed schedule of statuses.
#[derive(Clone, Debug)]
pub struct ScriptedConnectivity {
    schedule: Flow<ConnectivityStatus>,
}

impl ScriptedConnectivity {
    pub fn new(schedule: impl IntoIterator<Item = Emission<ConnectivityStatus>>) -> Self {
        Self {
            schedule: Flow::from_schedule(schedule),
        }
    }

    /// Comes online, degrades, drops out, then recovers.
    pub fn flaky_network() -> Self {
        use shared::ConnectivityStatus::*;
        Self::new([
            Emission::new(Duration::from_millis(500), Available),
            Emission::new(Duration::from_millis(1_500), Losing),
            Emission::new(Duration::from_millis(1_000), Lost),
            Emission::new(Duration::from_millis(2_000), Available),
        ])
    }
}

impl ConnectivityObserver for ScriptedConnectivity {
    fn observe(&self) -> BoxStream<'static, ConnectivityStatus> {
        self.schedule.stream()
    }
}

/// Folds probe outcomes into status changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTracker {
    status: ConnectivityStatus,
    failures: u32,
    lost_after: u32,
}

impl ProbeTracker {
    pub fn new(lost_after: u32) -> Self {
        Self {
            status: ConnectivityStatus::Unavailable,
            failures: 0,
            lost_after: lost_after.max(1),
        }
    }

    pub fn status(&self) -> ConnectivityStatus {
        self.status
    }

    /// Record one probe; returns the new status if it changed.
    pub fn record(&mut self, reachable: bool) -> Option<ConnectivityStatus> {
        let next = if reachable {
            self.failures = 0;
            ConnectivityStatus::Available
        } else {
            self.failures = self.failures.saturating_add(1);
            match self.status {
                ConnectivityStatus::Unavailable => ConnectivityStatus::Unavailable,
                _ if self.failures >= self.lost_after => ConnectivityStatus::Lost,
                _ => ConnectivityStatus::Losing,
            }
        };

        if next == self.status {
            return None;
        }
        self.status = next;
        Some(next)
    }
}

/// Probes a TCP endpoint periodically.
#[derive(Clone, Debug)]
pub struct TcpProbeConnectivity {
    addr: String,
    interval: Duration,
    connect_timeout: Duration,
    lost_after: u32,
}

impl TcpProbeConnectivity {
    pub fn new(addr: impl Into<String>, config: &ConnectivitySection) -> Self {
        Self {
            addr: addr.into(),
            interval: Duration::from_millis(config.interval_ms),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            lost_after: config.lost_after_failures,
        }
    }

    async fn probe(addr: &str, connect_timeout: Duration) -> bool {
        match tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(error)) => {
                log::debug!("probe {addr} failed: {error}");
                false
            }
            Err(_) => {
                log::debug!("probe {addr} timed out after {connect_timeout:?}");
                false
            }
        }
    }
}

impl ConnectivityObserver for TcpProbeConnectivity {
    fn observe(&self) -> BoxStream<'static, ConnectivityStatus> {
        let probe = self.clone();
        let tracker = ProbeTracker::new(self.lost_after);

        stream::unfold((tracker, true), move |(mut tracker, first)| {
            let probe = probe.clone();
            async move {
                if !first {
                    tokio::time::sleep(probe.interval).await;
                }
                loop {
                    let reachable = Self::probe(&probe.addr, probe.connect_timeout).await;
                    if let Some(change) = tracker.record(reachable) {
                        return Some((change, (tracker, false)));
                    }
                    tokio::time::sleep(probe.interval).await;
                }
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ConnectivityStatus::*;
    use tokio::net::TcpListener;
    use tokio::time::sleep;

    #[test]
    fn tracker_stays_unavailable_until_first_success() {
        let mut tracker = ProbeTracker::new(3);
        assert_eq!(tracker.record(false), None);
        assert_eq!(tracker.record(false), None);
        assert_eq!(tracker.status(), Unavailable);
        assert_eq!(tracker.record(true), Some(Available));
        assert_eq!(tracker.record(true), None);
    }

    #[test]
    fn tracker_degrades_then_recovers() {
        let mut tracker = ProbeTracker::new(3);
        tracker.record(true);

        assert_eq!(tracker.record(false), Some(Losing));
        assert_eq!(tracker.record(false), None);
        assert_eq!(tracker.record(false), Some(Lost));
        assert_eq!(tracker.record(false), None);
        assert_eq!(tracker.record(true), Some(Available));

        // Recovery resets the failure count.
        assert_eq!(tracker.record(false), Some(Losing));
    }

    #[test]
    fn single_failure_threshold_skips_losing() {
        let mut tracker = ProbeTracker::new(0);
        tracker.record(true);
        assert_eq!(tracker.record(false), Some(Lost));
    }

    #[tokio::test(start_paused = true)]
    async fn domain_follows_the_observer() {
        let scope = Scope::new("connectivity");
        let domain = ConnectivityDomain::new(&scope, &ScriptedConnectivity::flaky_network());
        assert_eq!(domain.status().get(), Unavailable);

        sleep(Duration::from_millis(600)).await;
        assert_eq!(domain.status().get(), Available);

        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(domain.status().get(), Losing);

        sleep(Duration::from_millis(1_000)).await;
        assert_eq!(domain.status().get(), Lost);

        sleep(Duration::from_millis(2_000)).await;
        assert_eq!(domain.status().get(), Available);
    }

    #[tokio::test(start_paused = true)]
    async fn late_renderer_only_sees_the_current_status() {
        let scope = Scope::new("connectivity");
        let domain = ConnectivityDomain::new(&scope, &ScriptedConnectivity::flaky_network());

        sleep(Duration::from_millis(3_100)).await;
        let mut rendered = domain.status().subscribe();
        assert_eq!(rendered.next().await, Some(Lost));
    }

    fn fast_probe() -> ConnectivitySection {
        ConnectivitySection {
            probe_addr: None,
            interval_ms: 20,
            connect_timeout_ms: 500,
            lost_after_failures: 2,
        }
    }

    #[tokio::test]
    async fn tcp_probe_reports_a_listener_going_away() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let observer = TcpProbeConnectivity::new(addr, &fast_probe());
        let mut changes = observer.observe();

        assert_eq!(changes.next().await, Some(Available));

        drop(listener);
        assert_eq!(changes.next().await, Some(Losing));
        assert_eq!(changes.next().await, Some(Lost));
    }

    #[tokio::test]
    async fn tcp_probe_is_silent_while_never_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let observer = TcpProbeConnectivity::new(addr, &fast_probe());
        let mut changes = observer.observe();
        let first = tokio::time::timeout(Duration::from_millis(200), changes.next()).await;
        assert!(first.is_err());
    }
}
