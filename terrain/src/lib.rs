//! # Terrain
//!
//! Terrain profiles along great circle paths, the earth curvature
//! model applied to them, and the [`TerrainSource`] boundary through
//! which elevation samples are fetched.

pub mod constants;
mod error;
pub mod math;
pub mod opentopo;
mod profile;
mod source;

pub use {
    crate::{
        error::TerrainError,
        opentopo::OpenTopoData,
        profile::{ElevationSample, Profile},
        source::TerrainSource,
    },
    geo,
};
