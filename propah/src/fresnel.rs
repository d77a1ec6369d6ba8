use geo::{HaversineBearing, HaversineDestination, LineString, Point, Polygon};
use num_traits::{Float, FromPrimitive};
use std::ops::Range;
use terrain::math::{haversine_km, HaversineIter};

/// `sqrt(c / 1e9) * 1e3`, the first zone radius in meters for
/// distances in km and frequency in GHz.
pub const FRESNEL_COEFFICIENT: f64 = 17.32;

/// Returns the first Fresnel zone radius, in meters, at `point_km`
/// along a path of `total_km` for a signal of `freq_mhz`.
///
/// The radius is zero at both endpoints and greatest at the
/// midpoint. Non-positive or non-finite distance or frequency yields
/// zero.
pub fn fresnel_radius<T>(total_km: T, freq_mhz: T, point_km: T) -> T
where
    T: Float + FromPrimitive,
{
    let positive = |v: T| v.is_finite() && v > T::zero();
    if !positive(total_km) || !positive(freq_mhz) {
        return T::zero();
    }
    let d1 = point_km.max(T::zero()).min(total_km);
    let d2 = total_km - d1;
    let f_ghz = freq_mhz / T::from_f64(1000.0).unwrap_or_else(T::one);
    T::from_f64(FRESNEL_COEFFICIENT).unwrap_or_else(T::one) * (d1 * d2 / (f_ghz * total_km)).sqrt()
}

/// Returns the first Fresnel zone radius at the midpoint of the
/// path, where it is widest.
pub fn max_fresnel_radius<T>(total_km: T, freq_mhz: T) -> T
where
    T: Float + FromPrimitive,
{
    let half = total_km / (T::one() + T::one());
    fresnel_radius(total_km, freq_mhz, half)
}

/// First Fresnel zone of a radio link.
#[derive(Debug, Clone, Copy)]
pub struct FresnelZone<T> {
    freq_mhz: T,
    distance_km: T,
}

impl<T> FresnelZone<T>
where
    T: Float + FromPrimitive,
{
    pub fn new(freq_mhz: T, distance_km: T) -> Self {
        Self {
            freq_mhz,
            distance_km,
        }
    }

    /// Returns the radius, in meters, at `len` evenly spaced points
    /// from one end of the link to the other.
    pub fn iter(&self, len: usize) -> FresnelZoneIter<T> {
        FresnelZoneIter {
            freq_mhz: self.freq_mhz,
            distance_km: self.distance_km,
            range: 0..len,
        }
    }
}

/// An iterator over the first Fresnel zone radius along a link.
#[derive(Debug)]
pub struct FresnelZoneIter<T> {
    freq_mhz: T,
    distance_km: T,
    range: Range<usize>,
}

impl<T> Iterator for FresnelZoneIter<T>
where
    T: Float + FromPrimitive,
{
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        let last = self.range.end.saturating_sub(1);
        self.range.next().map(|n| {
            let fraction = if last == 0 {
                T::zero()
            } else {
                let n = T::from_usize(n).unwrap_or_else(T::zero);
                n / T::from_usize(last).unwrap_or_else(T::one)
            };
            fresnel_radius(self.distance_km, self.freq_mhz, self.distance_km * fraction)
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.range.size_hint()
    }
}

/// Returns the outline of the first Fresnel zone as seen from above,
/// for drawing on a map.
///
/// The path from `start` to `end` is divided into `steps` segments.
/// At each of the `steps + 1` points the zone radius is projected
/// perpendicular to the local path bearing on both sides. The ring
/// runs through the left offsets from start to end, then the right
/// offsets from end back to start, and is closed. The zone has no
/// width at either end, so each endpoint appears once.
pub fn fresnel_corridor(
    start: Point<f64>,
    end: Point<f64>,
    freq_mhz: f64,
    steps: usize,
) -> Polygon<f64> {
    let n = steps.max(1) + 1;
    let total_km = haversine_km(start, end);
    let centerline: Vec<Point<f64>> = HaversineIter::new(start, end, n).collect();
    let radii = FresnelZone::new(freq_mhz, total_km).iter(n);

    let (left, right): (Vec<Point<f64>>, Vec<Point<f64>>) = centerline
        .iter()
        .enumerate()
        .zip(radii)
        .map(|((idx, point), radius_m)| {
            let bearing = if idx + 1 < n {
                point.haversine_bearing(centerline[idx + 1])
            } else {
                centerline[idx - 1].haversine_bearing(*point)
            };
            (
                point.haversine_destination(bearing - 90.0, radius_m),
                point.haversine_destination(bearing + 90.0, radius_m),
            )
        })
        .unzip();

    // The right offsets at both ends coincide with the left ones.
    let inner = right.len().saturating_sub(1);
    let ring: Vec<Point<f64>> = left
        .into_iter()
        .chain(right.into_iter().take(inner).skip(1).rev())
        .collect();
    Polygon::new(LineString::from(ring), vec![])
}
