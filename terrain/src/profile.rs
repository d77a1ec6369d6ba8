use crate::math::{haversine_km, linspace, HaversineIter};
use geo::geometry::{Coord, Point};
use log::debug;
use serde::{Deserialize, Serialize};

/// A single terrain elevation along a path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationSample {
    /// Distance from the start of the path in kilometers.
    pub distance_km: f64,

    /// Terrain elevation above mean sea level in meters.
    pub elevation_m: f64,
}

/// An ordered terrain profile from `start` to `end`.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    /// Location of each sample along the great circle route from
    /// `start` to `end`.
    pub great_circle: Vec<Point<f64>>,

    /// Elevation samples, first at distance 0, last at the full path
    /// length.
    pub samples: Vec<ElevationSample>,
}

impl Profile {
    /// Returns the `n` evenly spaced great circle points sampled for
    /// a profile from `start` to `end`.
    pub fn great_circle(start: Coord<f64>, end: Coord<f64>, n: usize) -> Vec<Point<f64>> {
        HaversineIter::new(Point::from(start), Point::from(end), n).collect()
    }

    /// Pairs elevations taken at the [`Profile::great_circle`] points
    /// with their distance from `start`.
    ///
    /// Extra elevations beyond the number of points are ignored.
    pub fn from_elevations(
        start: Coord<f64>,
        end: Coord<f64>,
        elevations: impl IntoIterator<Item = f64>,
    ) -> Self {
        let elevations: Vec<f64> = elevations.into_iter().collect();
        let n = elevations.len();
        let great_circle = Self::great_circle(start, end, n);
        let total_km = haversine_km(Point::from(start), Point::from(end));
        let samples: Vec<ElevationSample> = linspace(0.0, total_km, n)
            .zip(elevations)
            .map(|(distance_km, elevation_m)| ElevationSample {
                distance_km,
                elevation_m,
            })
            .collect();
        debug!("profile; len: {n}, distance: {total_km:.3} km");
        Self {
            great_circle,
            samples,
        }
    }

    /// Total path length in kilometers, or 0 for an empty profile.
    pub fn distance_km(&self) -> f64 {
        self.samples.last().map_or(0.0, |s| s.distance_km)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
