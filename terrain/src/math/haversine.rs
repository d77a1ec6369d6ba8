//! Great circle interpolation after [geo]'s haversine intermediate
//! points, emitting a fixed number of evenly spaced points.
//!
//! [geo](https://github.com/georust/geo/blob/eb0cd98f3ccfa226631af23d94d66d214ea66488/geo/src/algorithm/haversine_intermediate.rs)

use geo::{algorithm::HaversineDistance, CoordFloat, Point};
use num_traits::FromPrimitive;

/// Returns the great circle distance from `start` to `end` in
/// kilometers.
pub fn haversine_km(start: Point<f64>, end: Point<f64>) -> f64 {
    start.haversine_distance(&end) / 1000.0
}

/// Iterator over `n` evenly spaced points along the great circle
/// from `start` to `end`, both included.
pub struct HaversineIter<T: CoordFloat = f64> {
    arc: GreatCircle<T>,
    start: Point<T>,
    end: Point<T>,
    total_points: usize,
    current_point: usize,
}

impl<T: CoordFloat + FromPrimitive> HaversineIter<T> {
    pub fn new(start: Point<T>, end: Point<T>, n: usize) -> Self {
        Self {
            arc: GreatCircle::new(start, end),
            start,
            end,
            total_points: n,
            current_point: 0,
        }
    }
}

impl<T: CoordFloat + FromPrimitive> Iterator for HaversineIter<T> {
    type Item = Point<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_point >= self.total_points {
            return None;
        }
        let idx = self.current_point;
        self.current_point += 1;

        // Coincident endpoints make the interpolation divide by
        // sin(0).
        if idx == 0 || self.arc.angle == T::zero() {
            return Some(self.start);
        }
        if idx + 1 == self.total_points {
            return Some(self.end);
        }
        let fraction = T::from_usize(idx)? / T::from_usize(self.total_points - 1)?;
        Some(self.arc.at(fraction))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total_points - self.current_point;
        (remaining, Some(remaining))
    }
}

impl<T: CoordFloat + FromPrimitive> ExactSizeIterator for HaversineIter<T> {}

/// Endpoint unit vectors and the central angle, in radians, between
/// them.
#[derive(Clone, Copy)]
struct GreatCircle<T> {
    from: [T; 3],
    to: [T; 3],
    angle: T,
}

impl<T: CoordFloat> GreatCircle<T> {
    fn new(start: Point<T>, end: Point<T>) -> Self {
        let two = T::one() + T::one();
        let (lat1, lon1) = (start.y().to_radians(), start.x().to_radians());
        let (lat2, lon2) = (end.y().to_radians(), end.x().to_radians());
        let half_dlat = ((lat1 - lat2) / two).sin();
        let half_dlon = ((lon1 - lon2) / two).sin();
        let h = half_dlat.powi(2) + lat1.cos() * lat2.cos() * half_dlon.powi(2);
        Self {
            from: unit_vector(lat1, lon1),
            to: unit_vector(lat2, lon2),
            angle: two * h.sqrt().asin(),
        }
    }

    /// Spherical linear interpolation, `fraction` 0 at `from` and 1
    /// at `to`.
    fn at(&self, fraction: T) -> Point<T> {
        let sin_angle = self.angle.sin();
        let a = ((T::one() - fraction) * self.angle).sin() / sin_angle;
        let b = (fraction * self.angle).sin() / sin_angle;
        let [x, y, z] = [0, 1, 2].map(|i| a * self.from[i] + b * self.to[i]);
        Point::new(y.atan2(x).to_degrees(), z.atan2(x.hypot(y)).to_degrees())
    }
}

fn unit_vector<T: CoordFloat>(lat: T, lon: T) -> [T; 3] {
    let (lat_sin, lat_cos) = lat.sin_cos();
    let (lon_sin, lon_cos) = lon.sin_cos();
    [lat_cos * lon_cos, lat_cos * lon_sin, lat_sin]
}

#[cfg(test)]
mod tests {
    use super::{haversine_km, HaversineIter};
    use approx::assert_relative_eq;
    use geo::point;

    #[test]
    fn test_haversine_iter() {
        let start = point!(x: -0.5, y: -0.5);
        let end = point!(x: 0.5, y: 0.5);
        let haversine = HaversineIter::new(start, end, 10);
        assert_eq!(haversine.len(), 10);
        let points = haversine.collect::<Vec<_>>();
        let expected = [
            point!(x: -0.5, y: -0.5),
            point!(x: -0.388_884_988_799_152_34, y: -0.388_890_838_895_255_3),
            point!(x: -0.277_772_902_687_608_4, y: -0.277_780_215_266_485_2),
            point!(x: -0.166_662_905_894_136_8, y: -0.166_668_547_005_197_93),
            point!(x: -0.055_554_162_678_936_12, y: -0.055_556_251_975_400_386),
            point!(x: 0.055_554_162_678_936_12, y: 0.055_556_251_975_400_386),
            point!(x: 0.166_662_905_894_136_7, y: 0.166_668_547_005_197_84),
            point!(x: 0.277_772_902_687_608_24, y: 0.277_780_215_266_485_1),
            point!(x: 0.388_884_988_799_152_3, y: 0.388_890_838_895_255_2),
            point!(x: 0.5, y: 0.5),
        ];
        for (actual, expected) in points.iter().zip(expected.iter()) {
            assert_relative_eq!(actual.x(), expected.x(), epsilon = 1e-12);
            assert_relative_eq!(actual.y(), expected.y(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_coincident_endpoints() {
        let p = point!(x: -71.3, y: 44.27);
        let points: Vec<_> = HaversineIter::new(p, p, 5).collect();
        assert_eq!(points, vec![p; 5]);
    }

    #[test]
    fn test_short_iters() {
        let start = point!(x: 0.0, y: 0.0);
        let end = point!(x: 1.0, y: 0.0);
        assert_eq!(HaversineIter::new(start, end, 0).count(), 0);
        assert_eq!(HaversineIter::new(start, end, 1).collect::<Vec<_>>(), vec![start]);
        assert_eq!(
            HaversineIter::new(start, end, 2).collect::<Vec<_>>(),
            vec![start, end]
        );
    }

    #[test]
    fn test_haversine_km() {
        // One degree of longitude on the equator.
        assert_relative_eq!(
            haversine_km(point!(x: 0.0, y: 0.0), point!(x: 1.0, y: 0.0)),
            111.195,
            epsilon = 1e-2
        );
    }
}
