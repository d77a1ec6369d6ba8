/// Mean earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Effective earth radius multiplier for the standard refracting
/// atmosphere.
pub const STANDARD_K_FACTOR: f64 = 1.33;

/// Effective earth radius multiplier for bare (unrefracted) earth.
pub const BARE_EARTH_K_FACTOR: f64 = 1.0;
