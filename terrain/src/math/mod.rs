mod bulge;
mod haversine;
mod linspace;

pub use {
    bulge::earth_bulge,
    haversine::{haversine_km, HaversineIter},
    linspace::linspace,
};
