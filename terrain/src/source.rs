use crate::{ElevationSample, TerrainError};
use geo::geometry::Coord;
use std::future::Future;

/// Anything that can produce an elevation profile between two
/// points.
///
/// Implementations return `samples` evenly spaced
/// [`ElevationSample`]s along the path, the first at distance 0 and
/// the last at the full path length. An empty result means no
/// terrain is available for the path, never that the path is clear.
///
/// Coordinates are `x: longitude, y: latitude` in degrees.
///
/// Async closures of the matching shape implement this trait, which
/// is how tests and callers inject canned terrain.
pub trait TerrainSource {
    fn profile(
        &self,
        start: Coord<f64>,
        end: Coord<f64>,
        samples: usize,
    ) -> impl Future<Output = Result<Vec<ElevationSample>, TerrainError>> + Send;
}

impl<F, Fut> TerrainSource for F
where
    F: Fn(Coord<f64>, Coord<f64>, usize) -> Fut,
    Fut: Future<Output = Result<Vec<ElevationSample>, TerrainError>> + Send,
{
    fn profile(
        &self,
        start: Coord<f64>,
        end: Coord<f64>,
        samples: usize,
    ) -> impl Future<Output = Result<Vec<ElevationSample>, TerrainError>> + Send {
        self(start, end, samples)
    }
}
