//! Pairwise link matrix over a set of nodes.

use crate::{
    error::PropahError,
    link::{LinkConfig, LinkStatus},
    p2p::Quality,
};
use geo::geometry::{Coord, Point};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use terrain::{math::haversine_km, TerrainError, TerrainSource};
use tokio::time::Instant;

/// A radio site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl Node {
    pub fn validate(&self) -> Result<(), PropahError> {
        let reason = if self.name.trim().is_empty() {
            "empty name"
        } else if !self.lat.is_finite() || self.lat.abs() > 90.0 {
            "latitude out of range"
        } else if !self.lng.is_finite() || self.lng.abs() > 180.0 {
            "longitude out of range"
        } else {
            return Ok(());
        };
        Err(PropahError::Node {
            name: self.name.clone(),
            reason,
        })
    }

    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lng,
            y: self.lat,
        }
    }
}

/// Batch run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    /// Radio and antenna settings. Every node uses the same antenna
    /// height, `link.tx_alt_m`.
    pub link: LinkConfig,

    /// Elevation samples per pair. Kept coarse to bound the run time.
    pub samples: usize,

    /// Minimum time between consecutive terrain requests.
    pub min_request_interval_ms: u64,

    /// Give up on a single terrain request after this long.
    pub fetch_timeout_ms: u64,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            link: LinkConfig::default(),
            samples: 32,
            min_request_interval_ms: 1000,
            fetch_timeout_ms: 30_000,
        }
    }
}

impl MatrixConfig {
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Uses the same antenna height at both ends of every pair.
    fn pair_link(&self) -> LinkConfig {
        LinkConfig {
            rx_alt_m: self.link.tx_alt_m,
            ..self.link.clone()
        }
    }
}

/// One line of the matrix report.
///
/// Field order is stable. Failed pairs have [`LinkStatus::Error`] and
/// no quality, margin or clearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub source: String,
    pub target: String,
    pub distance_km: f64,
    pub status: LinkStatus,
    pub quality: Option<Quality>,
    pub margin_db: Option<f64>,
    pub min_clearance_m: Option<f64>,
}

impl ReportRow {
    pub const CSV_HEADER: &'static str =
        "source,target,distance_km,status,quality,margin_db,min_clearance_m";

    fn error(source: &Node, target: &Node, distance_km: f64) -> Self {
        Self {
            source: source.name.clone(),
            target: target.name.clone(),
            distance_km,
            status: LinkStatus::Error,
            quality: None,
            margin_db: None,
            min_clearance_m: None,
        }
    }

    /// Formats the row as one CSV record, without a line terminator.
    ///
    /// Numbers are plain decimals; missing values are empty fields.
    pub fn to_csv_record(&self) -> String {
        let number = |v: Option<f64>| v.map(|v| format!("{v:.2}")).unwrap_or_default();
        format!(
            "{},{},{:.3},{},{},{},{}",
            csv_field(&self.source),
            csv_field(&self.target),
            self.distance_km,
            self.status,
            self.quality.map(|q| q.to_string()).unwrap_or_default(),
            number(self.margin_db),
            number(self.min_clearance_m),
        )
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

/// Stops a running batch.
///
/// Requests already in flight finish; no new ones are issued.
#[derive(Debug, Clone, Default)]
pub struct Cancel(Arc<AtomicBool>);

impl Cancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Enforces a minimum interval between requests.
#[derive(Debug)]
pub(crate) struct Pacer {
    interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Waits until the next request may be issued and claims the
    /// slot.
    pub(crate) async fn ready(&mut self) {
        if let Some(last) = self.last {
            tokio::time::sleep_until(last + self.interval).await;
        }
        self.last = Some(Instant::now());
    }
}

/// Returns every unordered index pair `(i, j)` with `i < j`.
pub fn pairs(n: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..n).flat_map(move |i| (i + 1..n).map(move |j| (i, j)))
}

/// Evaluates every unordered pair of `nodes`.
pub async fn run_matrix<S: TerrainSource>(
    nodes: &[Node],
    cfg: &MatrixConfig,
    source: &S,
    cancel: &Cancel,
) -> Vec<ReportRow> {
    run_matrix_with(nodes, cfg, source, cancel, |_| ()).await
}

/// Like [`run_matrix`], calling `on_row` as each row completes.
///
/// Pairs are fetched one at a time, never closer together than
/// [`MatrixConfig::min_request_interval`]. A pair whose fetch fails,
/// times out or comes back empty produces an error row and the run
/// continues. Cancelling returns the rows finished so far.
pub async fn run_matrix_with<S, F>(
    nodes: &[Node],
    cfg: &MatrixConfig,
    source: &S,
    cancel: &Cancel,
    mut on_row: F,
) -> Vec<ReportRow>
where
    S: TerrainSource,
    F: FnMut(&ReportRow),
{
    let total = nodes.len() * nodes.len().saturating_sub(1) / 2;
    info!("matrix; nodes: {}, pairs: {total}", nodes.len());

    let link = cfg.pair_link();
    let mut pacer = Pacer::new(cfg.min_request_interval());
    let mut rows = Vec::with_capacity(total);

    for (i, j) in pairs(nodes.len()) {
        let (a, b) = (&nodes[i], &nodes[j]);

        let row = if let Err(e) = a.validate().and_then(|()| b.validate()) {
            warn!("matrix; skipping {} -> {}: {e}", a.name, b.name);
            ReportRow::error(a, b, 0.0)
        } else {
            if cancel.is_cancelled() {
                break;
            }
            pacer.ready().await;
            // Cancellation may have arrived while we were waiting.
            if cancel.is_cancelled() {
                break;
            }
            evaluate_pair(a, b, &link, cfg, source).await
        };

        debug!("matrix; {}/{total}: {row:?}", rows.len() + 1);
        on_row(&row);
        rows.push(row);
    }

    if rows.len() < total {
        info!("matrix; cancelled after {} of {total} pairs", rows.len());
    }
    rows
}

async fn evaluate_pair<S: TerrainSource>(
    a: &Node,
    b: &Node,
    link: &LinkConfig,
    cfg: &MatrixConfig,
    source: &S,
) -> ReportRow {
    let distance_km = haversine_km(Point::from(a.coord()), Point::from(b.coord()));
    let timeout = cfg.fetch_timeout();
    let fetched = tokio::time::timeout(timeout, source.profile(a.coord(), b.coord(), cfg.samples))
        .await
        .unwrap_or_else(|_| Err(TerrainError::Timeout(timeout)))
        .and_then(|samples| {
            if samples.is_empty() {
                Err(TerrainError::Empty)
            } else {
                Ok(samples)
            }
        });

    match fetched {
        Ok(samples) => {
            let report = link.evaluate(&samples);
            if report.status == LinkStatus::Error {
                return ReportRow::error(a, b, distance_km);
            }
            ReportRow {
                source: a.name.clone(),
                target: b.name.clone(),
                distance_km: report.distance_km,
                status: report.status,
                quality: Some(report.analysis.verdict.quality),
                margin_db: Some(report.budget.margin_db),
                min_clearance_m: Some(report.analysis.verdict.min_clearance_m),
            }
        }
        Err(e) => {
            warn!("matrix; terrain for {} -> {}: {e}", a.name, b.name);
            ReportRow::error(a, b, distance_km)
        }
    }
}
