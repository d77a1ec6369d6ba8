//! Interactive single link analysis.
//!
//! Endpoints move faster than terrain can be fetched. A
//! [`LinkSession`] hands each placement a [`RequestToken`] and
//! coalesces pending placements down to the newest one; its
//! [`LinkWorker`] keeps at most one fetch in flight and drops any
//! result overtaken by a newer placement.

use crate::link::{LinkConfig, LinkReport};
use geo::geometry::Coord;
use log::debug;
use std::fmt;
use terrain::{TerrainError, TerrainSource};
use tokio::sync::{mpsc, watch};

/// Default elevation samples for an interactive link; finer than a
/// batch matrix.
pub const INTERACTIVE_SAMPLES: usize = 100;

/// Identifies one placement of a link's endpoints.
///
/// Tokens increase monotonically within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(u64);

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Placement {
    token: RequestToken,
    start: Coord<f64>,
    end: Coord<f64>,
}

/// Outcome of one placement.
#[derive(Debug)]
pub enum SessionUpdate {
    Analyzed {
        token: RequestToken,
        report: Box<LinkReport>,
    },

    /// Terrain could not be fetched. This is not a verdict on the
    /// path.
    Failed {
        token: RequestToken,
        error: TerrainError,
    },
}

impl SessionUpdate {
    pub fn token(&self) -> RequestToken {
        match self {
            SessionUpdate::Analyzed { token, .. } | SessionUpdate::Failed { token, .. } => *token,
        }
    }
}

/// The caller's side of an interactive link.
#[derive(Debug)]
pub struct LinkSession {
    tx: watch::Sender<Option<Placement>>,
    next: u64,
}

impl LinkSession {
    /// Returns a session and the worker that serves it.
    ///
    /// Run [`LinkWorker::run`] on a task; results arrive on the
    /// returned receiver.
    pub fn new<S: TerrainSource>(
        source: S,
        cfg: LinkConfig,
        samples: usize,
    ) -> (Self, LinkWorker<S>, mpsc::Receiver<SessionUpdate>) {
        let (tx, rx) = watch::channel(None);
        let (updates_tx, updates_rx) = mpsc::channel(16);
        let session = Self { tx, next: 0 };
        let worker = LinkWorker {
            rx,
            updates: updates_tx,
            source,
            cfg,
            samples,
        };
        (session, worker, updates_rx)
    }

    /// Places (or moves) the link endpoints, superseding any
    /// placement not yet analyzed.
    pub fn place(&mut self, start: Coord<f64>, end: Coord<f64>) -> RequestToken {
        self.next += 1;
        let token = RequestToken(self.next);
        self.tx.send_replace(Some(Placement { token, start, end }));
        token
    }

    /// Whether `token` is the newest placement.
    pub fn is_current(&self, token: RequestToken) -> bool {
        self.tx.borrow().is_some_and(|p| p.token == token)
    }
}

/// Fetches terrain and evaluates placements for a [`LinkSession`].
pub struct LinkWorker<S> {
    rx: watch::Receiver<Option<Placement>>,
    updates: mpsc::Sender<SessionUpdate>,
    source: S,
    cfg: LinkConfig,
    samples: usize,
}

impl<S: TerrainSource> LinkWorker<S> {
    /// Serves placements until the session or the update receiver is
    /// dropped.
    pub async fn run(mut self) {
        while self.rx.changed().await.is_ok() {
            let Some(placement) = *self.rx.borrow_and_update() else {
                continue;
            };
            let fetched = self
                .source
                .profile(placement.start, placement.end, self.samples)
                .await;

            if matches!(self.rx.has_changed(), Ok(true)) {
                debug!("session; dropping stale result for {}", placement.token);
                continue;
            }

            let update = match fetched {
                Ok(samples) => SessionUpdate::Analyzed {
                    token: placement.token,
                    report: Box::new(self.cfg.evaluate(&samples)),
                },
                Err(error) => SessionUpdate::Failed {
                    token: placement.token,
                    error,
                },
            };
            if self.updates.send(update).await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LinkSession, SessionUpdate, INTERACTIVE_SAMPLES};
    use crate::link::{LinkConfig, LinkStatus};
    use geo::Coord;
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };
    use terrain::{math::linspace, ElevationSample, TerrainError};

    fn coord(x: f64) -> Coord<f64> {
        Coord { x, y: 0.0 }
    }

    fn flat(n: usize) -> Vec<ElevationSample> {
        linspace(0.0, 5.0, n)
            .map(|distance_km| ElevationSample {
                distance_km,
                elevation_m: 50.0,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_placements_coalesce() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = {
            let calls = calls.clone();
            move |_start: Coord<f64>, end: Coord<f64>, n: usize| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    assert_eq!(end.x, 0.3);
                    Ok::<_, TerrainError>(flat(n))
                }
            }
        };
        let (mut session, worker, mut updates) =
            LinkSession::new(source, LinkConfig::default(), INTERACTIVE_SAMPLES);

        session.place(coord(0.0), coord(0.1));
        session.place(coord(0.0), coord(0.2));
        let latest = session.place(coord(0.0), coord(0.3));
        tokio::spawn(worker.run());

        let update = updates.recv().await.unwrap();
        assert_eq!(update.token(), latest);
        assert!(session.is_current(latest));
        match update {
            SessionUpdate::Analyzed { report, .. } => {
                assert_eq!(report.analysis.samples.len(), INTERACTIVE_SAMPLES);
                assert_eq!(report.status, LinkStatus::Good);
            }
            SessionUpdate::Failed { error, .. } => panic!("unexpected failure: {error}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_result_is_dropped() {
        let source = |_start: Coord<f64>, end: Coord<f64>, n: usize| async move {
            // The first placement is slow to fetch.
            if end.x == 0.1 {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok::<_, TerrainError>(flat(n))
        };
        let (mut session, worker, mut updates) =
            LinkSession::new(source, LinkConfig::default(), 10);
        tokio::spawn(worker.run());

        let first = session.place(coord(0.0), coord(0.1));
        tokio::time::sleep(Duration::from_secs(1)).await;
        let second = session.place(coord(0.0), coord(0.2));
        assert!(!session.is_current(first));

        let update = updates.recv().await.unwrap();
        assert_eq!(update.token(), second);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_not_a_verdict() {
        let source = |_start: Coord<f64>, _end: Coord<f64>, _n: usize| async move {
            Err::<Vec<ElevationSample>, _>(TerrainError::Upstream("rate limited".into()))
        };
        let (mut session, worker, mut updates) =
            LinkSession::new(source, LinkConfig::default(), 10);
        tokio::spawn(worker.run());

        let token = session.place(coord(0.0), coord(0.1));
        match updates.recv().await.unwrap() {
            SessionUpdate::Failed { token: t, error } => {
                assert_eq!(t, token);
                assert!(matches!(error, TerrainError::Upstream(_)));
            }
            SessionUpdate::Analyzed { .. } => panic!("expected a failure"),
        }
    }

    #[tokio::test]
    async fn test_empty_terrain_is_no_data() {
        let source = |_start: Coord<f64>, _end: Coord<f64>, _n: usize| async move {
            Ok::<_, TerrainError>(Vec::new())
        };
        let (mut session, worker, mut updates) =
            LinkSession::new(source, LinkConfig::default(), 10);
        tokio::spawn(worker.run());

        session.place(coord(0.0), coord(0.1));
        match updates.recv().await.unwrap() {
            SessionUpdate::Analyzed { report, .. } => {
                assert!(report.analysis.verdict.is_no_data());
                assert_eq!(report.status, LinkStatus::Error);
            }
            SessionUpdate::Failed { error, .. } => panic!("unexpected failure: {error}"),
        }
    }

    #[tokio::test]
    async fn test_colocated_endpoints_are_an_error() {
        let source = |_start: Coord<f64>, _end: Coord<f64>, n: usize| async move {
            Ok::<_, TerrainError>(
                (0..n)
                    .map(|_| ElevationSample {
                        distance_km: 0.0,
                        elevation_m: 50.0,
                    })
                    .collect(),
            )
        };
        let (mut session, worker, mut updates) =
            LinkSession::new(source, LinkConfig::default(), 10);
        tokio::spawn(worker.run());

        session.place(coord(0.1), coord(0.1));
        match updates.recv().await.unwrap() {
            SessionUpdate::Analyzed { report, .. } => {
                assert_eq!(report.status, LinkStatus::Error);
                assert_eq!(report.distance_km, 0.0);
            }
            SessionUpdate::Failed { error, .. } => panic!("unexpected failure: {error}"),
        }
    }
}
