//! Choose relay sites that cover an area.
//!
//! Candidate [`Site`]s are linked to grid [`Target`]s wherever the
//! path analysis allows a link, and a greedy weighted set cover picks
//! the sites.

use crate::{
    link::{LinkConfig, LinkStatus},
    matrix::{Cancel, Pacer},
};
use geo::{
    algorithm::{BoundingRect, Contains},
    geometry::{Coord, Point, Polygon},
};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use terrain::{ElevationSample, TerrainSource};

/// Meters per degree used to turn grid spacing into degrees.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// A candidate relay location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    /// Antenna height above ground.
    #[serde(default = "Site::default_height")]
    pub height_m: f64,
    /// Cost of building here. Lower is cheaper.
    #[serde(default = "Site::default_weight")]
    pub weight: f64,
}

impl Site {
    fn default_height() -> f64 {
        10.0
    }

    fn default_weight() -> f64 {
        1.0
    }

    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lng,
            y: self.lat,
        }
    }
}

/// A point that should be reachable from some selected site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
}

impl Target {
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lng,
            y: self.lat,
        }
    }
}

/// Returns grid points inside `area`, `spacing_m` apart.
///
/// The grid starts at the south west corner of the bounding box and
/// spacing is converted to degrees without regard to latitude.
pub fn grid_targets(area: &Polygon<f64>, spacing_m: f64) -> Vec<Target> {
    let Some(rect) = area.bounding_rect() else {
        return Vec::new();
    };
    if !(spacing_m.is_finite() && spacing_m > 0.0) {
        warn!("grid; invalid spacing {spacing_m} m");
        return Vec::new();
    }
    let step = spacing_m / METERS_PER_DEGREE;
    let (min, max) = (rect.min(), rect.max());
    let steps = |lo: f64, hi: f64| ((hi - lo) / step).ceil() as usize;

    let mut targets = Vec::new();
    for i in 0..steps(min.x, max.x) {
        let x = min.x + i as f64 * step;
        for j in 0..steps(min.y, max.y) {
            let y = min.y + j as f64 * step;
            if area.contains(&Point::new(x, y)) {
                targets.push(Target {
                    id: format!("tgt_{}", targets.len()),
                    lat: y,
                    lng: x,
                });
            }
        }
    }
    debug!("grid; spacing: {spacing_m} m, targets: {}", targets.len());
    targets
}

/// Terrain between one site and one target.
#[derive(Debug, Clone, PartialEq)]
pub struct PairProfile {
    pub site: usize,
    pub target: usize,
    pub samples: Vec<ElevationSample>,
}

/// Fetches terrain for every site/target pair.
///
/// Requests are paced and time limited like a matrix run. Pairs whose
/// fetch fails or times out are left out, so they never produce a
/// coverage edge.
pub async fn fetch_profiles<S: TerrainSource>(
    sites: &[Site],
    targets: &[Target],
    samples: usize,
    min_request_interval: Duration,
    fetch_timeout: Duration,
    source: &S,
    cancel: &Cancel,
) -> Vec<PairProfile> {
    let mut pacer = Pacer::new(min_request_interval);
    let mut profiles = Vec::with_capacity(sites.len() * targets.len());
    'sites: for (site, s) in sites.iter().enumerate() {
        for (target, t) in targets.iter().enumerate() {
            if cancel.is_cancelled() {
                break 'sites;
            }
            pacer.ready().await;
            let fetch = source.profile(s.coord(), t.coord(), samples);
            match tokio::time::timeout(fetch_timeout, fetch).await {
                Ok(Ok(samples)) => profiles.push(PairProfile {
                    site,
                    target,
                    samples,
                }),
                Ok(Err(e)) => warn!("planner; terrain for {} -> {}: {e}", s.name, t.id),
                Err(_) => warn!(
                    "planner; terrain for {} -> {}: timed out after {fetch_timeout:?}",
                    s.name, t.id
                ),
            }
        }
    }
    profiles
}

/// Which targets each site can reach.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageGraph {
    weights: Vec<f64>,
    /// Sorted target indices per site.
    edges: Vec<Vec<usize>>,
    targets: usize,
}

impl CoverageGraph {
    /// Analyzes `profiles` in parallel.
    ///
    /// Each site transmits from its own `height_m`; targets receive
    /// at `link.rx_alt_m`. A pair is an edge unless its path is
    /// obstructed or has no terrain.
    pub fn build(
        sites: &[Site],
        targets: usize,
        link: &LinkConfig,
        profiles: &[PairProfile],
    ) -> Self {
        let mut edges: Vec<(usize, usize)> = profiles
            .par_iter()
            .filter(|p| p.site < sites.len() && p.target < targets)
            .filter_map(|p| {
                let cfg = LinkConfig {
                    tx_alt_m: sites[p.site].height_m,
                    ..link.clone()
                };
                match cfg.evaluate(&p.samples).status {
                    LinkStatus::Good | LinkStatus::Marginal => Some((p.site, p.target)),
                    LinkStatus::Obstructed | LinkStatus::Error => None,
                }
            })
            .collect();
        edges.sort_unstable();
        edges.dedup();

        let mut graph = Self {
            weights: sites.iter().map(|s| s.weight).collect(),
            edges: vec![Vec::new(); sites.len()],
            targets,
        };
        for (site, target) in edges {
            graph.edges[site].push(target);
        }
        info!(
            "coverage; sites: {}, targets: {targets}, edges: {}",
            sites.len(),
            graph.edges.iter().map(Vec::len).sum::<usize>()
        );
        graph
    }

    /// Targets reachable from `site`.
    pub fn reachable(&self, site: usize) -> &[usize] {
        self.edges.get(site).map_or(&[], Vec::as_slice)
    }
}

/// Result of [`greedy_cover`].
#[derive(Debug, Clone, PartialEq)]
pub struct Cover {
    /// Site indices in the order they were picked.
    pub selected: Vec<usize>,
    /// Share of targets reached by the selection, 0 when there are no
    /// targets.
    pub covered_fraction: f64,
}

/// Greedy weighted set cover.
///
/// Repeatedly picks the site with the lowest weight per newly covered
/// target, the earliest site winning ties, until every target is
/// covered or no site adds coverage.
pub fn greedy_cover(graph: &CoverageGraph) -> Cover {
    let mut covered = vec![false; graph.targets];
    let mut covered_count = 0;
    let mut selected = Vec::new();

    while covered_count < graph.targets {
        let mut best: Option<(usize, f64)> = None;
        for (site, reach) in graph.edges.iter().enumerate() {
            if selected.contains(&site) {
                continue;
            }
            let new = reach.iter().filter(|&&t| !covered[t]).count();
            if new == 0 {
                continue;
            }
            let ratio = graph.weights[site] / new as f64;
            if best.map_or(true, |(_, best_ratio)| ratio < best_ratio) {
                best = Some((site, ratio));
            }
        }
        let Some((site, _)) = best else {
            break;
        };
        for &t in &graph.edges[site] {
            if !covered[t] {
                covered[t] = true;
                covered_count += 1;
            }
        }
        selected.push(site);
    }

    let covered_fraction = if graph.targets == 0 {
        0.0
    } else {
        covered_count as f64 / graph.targets as f64
    };
    debug!("cover; selected: {selected:?}, covered: {covered_fraction:.3}");
    Cover {
        selected,
        covered_fraction,
    }
}
