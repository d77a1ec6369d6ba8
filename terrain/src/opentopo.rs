//! [OpenTopoData](https://www.opentopodata.org) elevation client.

use crate::{ElevationSample, Profile, TerrainError, TerrainSource};
use geo::geometry::{Coord, Point};
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use std::{future::Future, time::Duration};

/// Public OpenTopoData instance.
pub const DEFAULT_URL: &str = "https://api.opentopodata.org";

/// 1 arc-second SRTM.
pub const DEFAULT_DATASET: &str = "srtm30m";

/// Maximum locations the service accepts per request.
const MAX_LOCATIONS: usize = 100;

/// Pause between consecutive batches of a single profile.
const BATCH_DELAY: Duration = Duration::from_millis(300);

/// Fetches elevation profiles from an OpenTopoData instance.
#[derive(Debug, Clone)]
pub struct OpenTopoData {
    client: Client,
    base_url: String,
    dataset: String,
}

impl OpenTopoData {
    pub fn new(base_url: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            dataset: dataset.into(),
        }
    }

    /// Uses `ELEVATION_API_URL` and `ELEVATION_DATASET` when set,
    /// falling back to the public instance and [`DEFAULT_DATASET`].
    pub fn from_env() -> Self {
        let base_url = std::env::var("ELEVATION_API_URL").unwrap_or_else(|_| DEFAULT_URL.into());
        let dataset =
            std::env::var("ELEVATION_DATASET").unwrap_or_else(|_| DEFAULT_DATASET.into());
        Self::new(base_url, dataset)
    }

    /// Applies a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, TerrainError> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn url(&self) -> String {
        format!("{}/v1/{}", self.base_url, self.dataset)
    }

    /// Returns the elevation, in meters, at each of `points`.
    ///
    /// Points with no coverage in the dataset report 0 m.
    pub async fn elevations(&self, points: &[Point<f64>]) -> Result<Vec<f64>, TerrainError> {
        let url = self.url();
        let mut elevations = Vec::with_capacity(points.len());
        for (batch, chunk) in points.chunks(MAX_LOCATIONS).enumerate() {
            if batch > 0 {
                tokio::time::sleep(BATCH_DELAY).await;
            }
            let response: Response = self
                .client
                .get(&url)
                .query(&[("locations", locations(chunk))])
                .send()
                .await?
                .json()
                .await?;
            let batch_elevations = response.into_elevations()?;
            if batch_elevations.len() != chunk.len() {
                return Err(TerrainError::Short {
                    expected: chunk.len(),
                    actual: batch_elevations.len(),
                });
            }
            debug!("{url}; batch: {batch}, len: {}", chunk.len());
            elevations.extend(batch_elevations);
        }
        Ok(elevations)
    }
}

impl TerrainSource for OpenTopoData {
    fn profile(
        &self,
        start: Coord<f64>,
        end: Coord<f64>,
        samples: usize,
    ) -> impl Future<Output = Result<Vec<ElevationSample>, TerrainError>> + Send {
        async move {
            check_coord(start)?;
            check_coord(end)?;
            let n = samples.max(2);
            let great_circle = Profile::great_circle(start, end, n);
            let elevations = self.elevations(&great_circle).await?;
            Ok(Profile::from_elevations(start, end, elevations).samples)
        }
    }
}

fn check_coord(Coord { x: lon, y: lat }: Coord<f64>) -> Result<(), TerrainError> {
    if lat.is_finite() && lon.is_finite() && lat.abs() <= 90.0 && lon.abs() <= 180.0 {
        Ok(())
    } else {
        Err(TerrainError::Coord { lat, lon })
    }
}

/// Formats points as the service's `lat,lon|lat,lon` list.
fn locations(points: &[Point<f64>]) -> String {
    points
        .iter()
        .map(|p| format!("{:.6},{:.6}", p.y(), p.x()))
        .collect::<Vec<_>>()
        .join("|")
}

#[derive(Debug, Deserialize)]
struct Response {
    status: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    results: Vec<Elevation>,
}

#[derive(Debug, Deserialize)]
struct Elevation {
    elevation: Option<f64>,
}

impl Response {
    fn into_elevations(self) -> Result<Vec<f64>, TerrainError> {
        if self.status != "OK" {
            warn!("elevation service status: {}", self.status);
            return Err(TerrainError::Upstream(self.error.unwrap_or(self.status)));
        }
        Ok(self
            .results
            .into_iter()
            .map(|r| r.elevation.unwrap_or(0.0))
            .collect())
    }
}
