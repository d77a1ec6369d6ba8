use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerrainError {
    #[error("invalid coordinate ({lat}, {lon})")]
    Coord { lat: f64, lon: f64 },

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("elevation service returned '{0}'")]
    Upstream(String),

    #[error("expected {expected} elevations, got {actual}")]
    Short { expected: usize, actual: usize },

    #[error("elevation service returned no samples")]
    Empty,

    #[error("elevation request timed out after {0:?}")]
    Timeout(Duration),
}
