use crate::constants::EARTH_RADIUS_KM;
use num_traits::{Float, FromPrimitive};

/// Returns the earth bulge, in meters, at `d_km` along a path of
/// `total_km` for refraction factor `k`.
///
/// The bulge is the height a straight chord between the path
/// endpoints sits above a curved, refracting earth of effective
/// radius `EARTH_RADIUS_KM * k`. It is zero at both endpoints and
/// greatest at the midpoint.
///
/// Points outside `[0, total_km]` are clamped onto the path, and a
/// non-positive or non-finite `k` yields zero.
pub fn earth_bulge<T>(d_km: T, total_km: T, k: T) -> T
where
    T: Float + FromPrimitive,
{
    let positive = |v: T| v.is_finite() && v > T::zero();
    if !positive(k) || !positive(total_km) {
        return T::zero();
    }
    let d1 = d_km.max(T::zero()).min(total_km);
    let d2 = total_km - d1;
    let two = T::one() + T::one();
    let effective_radius_km = T::from_f64(EARTH_RADIUS_KM).unwrap_or_else(T::one) * k;
    let bulge_km = d1 * d2 / (two * effective_radius_km);
    bulge_km * T::from_f64(1000.0).unwrap_or_else(T::one)
}
