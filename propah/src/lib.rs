//! # Point to Point Link Feasibility
//!
//! `propah` judges whether two radio sites can talk to each other:
//! first Fresnel zone clearance over a terrain profile, a LoRa link
//! budget, and batch or interactive evaluation on top of a
//! [`terrain::TerrainSource`].

pub mod budget;
mod error;
pub mod fresnel;
pub mod link;
pub mod matrix;
pub mod p2p;
pub mod planner;
pub mod session;

pub use {
    crate::{
        budget::{LinkBudget, MarginPolicy, RadioParams},
        error::PropahError,
        link::{LinkConfig, LinkReport, LinkStatus},
        matrix::{run_matrix, run_matrix_with, Cancel, MatrixConfig, Node, ReportRow},
        p2p::{analyze, Analysis, Clutter, LinkVerdict, Quality},
        session::{LinkSession, RequestToken, SessionUpdate},
    },
    geo, terrain,
};
