use crate::{error::PropahError, fresnel::fresnel_radius};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use terrain::{constants::STANDARD_K_FACTOR, math::earth_bulge, ElevationSample};

/// Placeholder `min_clearance_m` reported when there is no terrain
/// to judge.
pub const NO_DATA_CLEARANCE_M: f64 = 9999.0;

/// Fresnel ratio at or above which a path is [`Quality::Excellent`].
pub const EXCELLENT_RATIO: f64 = 0.8;

/// Fresnel ratio at or above which a path is [`Quality::Good`]; the
/// common 60% clearance rule.
pub const GOOD_RATIO: f64 = 0.6;

/// Path quality by worst first-Fresnel-zone clearance ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    Excellent,
    Good,
    Marginal,
    Obstructed,
    /// No terrain was available, which says nothing about the path.
    NoData,
}

impl Quality {
    pub fn from_ratio(worst_fresnel_ratio: f64) -> Self {
        if worst_fresnel_ratio >= EXCELLENT_RATIO {
            Quality::Excellent
        } else if worst_fresnel_ratio >= GOOD_RATIO {
            Quality::Good
        } else if worst_fresnel_ratio > 0.0 {
            Quality::Marginal
        } else {
            Quality::Obstructed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Excellent => "Excellent",
            Quality::Good => "Good",
            Quality::Marginal => "Marginal",
            Quality::Obstructed => "Obstructed",
            Quality::NoData => "No Data",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Obstruction height added on top of bare terrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Clutter {
    /// The same height everywhere along the path.
    Uniform(f64),

    /// One height per profile sample. Samples past the end of the
    /// list get none.
    PerSample(Vec<f64>),
}

impl Default for Clutter {
    fn default() -> Self {
        Clutter::Uniform(0.0)
    }
}

impl Clutter {
    pub fn at(&self, idx: usize) -> f64 {
        match self {
            Clutter::Uniform(height_m) => *height_m,
            Clutter::PerSample(heights_m) => heights_m.get(idx).copied().unwrap_or(0.0),
        }
    }
}

/// An [`ElevationSample`] with the geometry used to judge it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedSample {
    pub distance_km: f64,
    pub elevation_m: f64,
    pub earth_bulge_m: f64,
    /// `elevation_m + earth_bulge_m + clutter`.
    pub effective_terrain_m: f64,
    /// Height of the straight line between the antennas.
    pub los_m: f64,
    pub fresnel_radius_m: f64,
    /// Height of the lower edge of the first Fresnel zone above
    /// effective terrain. Negative inside the zone.
    pub clearance_m: f64,
    /// Line of sight clearance in units of the zone radius; 1.0 where
    /// the radius vanishes.
    pub fresnel_ratio: f64,
}

impl AnnotatedSample {
    /// Line of sight height above effective terrain.
    pub fn vertical_gap_m(&self) -> f64 {
        self.los_m - self.effective_terrain_m
    }
}

/// Aggregate judgement of a path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkVerdict {
    pub min_clearance_m: f64,
    pub worst_fresnel_ratio: f64,
    /// Line of sight touches or passes below effective terrain
    /// somewhere. Independent of `quality`, which grades Fresnel zone
    /// infringement.
    pub is_obstructed: bool,
    pub quality: Quality,
}

impl LinkVerdict {
    /// The sentinel verdict for a path with no terrain.
    pub fn no_data() -> Self {
        Self {
            min_clearance_m: NO_DATA_CLEARANCE_M,
            worst_fresnel_ratio: 1.0,
            is_obstructed: false,
            quality: Quality::NoData,
        }
    }

    pub fn is_no_data(&self) -> bool {
        self.quality == Quality::NoData
    }

    /// Reduces annotated samples into a verdict.
    pub fn from_samples(samples: &[AnnotatedSample]) -> Self {
        if samples.is_empty() {
            return Self::no_data();
        }
        let (min_clearance_m, worst_fresnel_ratio, is_obstructed) = samples.iter().fold(
            (f64::INFINITY, f64::INFINITY, false),
            |(clearance, ratio, obstructed), s| {
                (
                    clearance.min(s.clearance_m),
                    ratio.min(s.fresnel_ratio),
                    obstructed || s.vertical_gap_m() <= 0.0,
                )
            },
        );
        Self {
            min_clearance_m,
            worst_fresnel_ratio,
            is_obstructed,
            quality: Quality::from_ratio(worst_fresnel_ratio),
        }
    }
}

/// Terrain and Fresnel zone analysis of a point to point path.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub samples: Vec<AnnotatedSample>,
    pub verdict: LinkVerdict,
}

impl Analysis {
    pub fn builder() -> AnalysisBuilder {
        AnalysisBuilder {
            freq_mhz: None,
            tx_alt_m: 0.0,
            rx_alt_m: 0.0,
            k_factor: STANDARD_K_FACTOR,
            clutter: Clutter::default(),
        }
    }

    fn no_data() -> Self {
        Self {
            samples: Vec::new(),
            verdict: LinkVerdict::no_data(),
        }
    }

    /// Total path length in kilometers.
    pub fn distance_km(&self) -> f64 {
        self.samples.last().map_or(0.0, |s| s.distance_km)
    }
}

/// Analyzes `profile` with a uniform clutter height.
pub fn analyze(
    profile: &[ElevationSample],
    freq_mhz: f64,
    tx_alt_m: f64,
    rx_alt_m: f64,
    k_factor: f64,
    clutter_m: f64,
) -> Analysis {
    AnalysisBuilder {
        freq_mhz: Some(freq_mhz),
        tx_alt_m,
        rx_alt_m,
        k_factor,
        clutter: Clutter::Uniform(clutter_m),
    }
    .run(freq_mhz, profile)
}

#[derive(Debug, Clone)]
pub struct AnalysisBuilder {
    /// Signal frequency (MHz, required).
    freq_mhz: Option<f64>,

    /// Transmit antenna height above ground (meters, defaults to 0).
    tx_alt_m: f64,

    /// Receive antenna height above ground (meters, defaults to 0).
    rx_alt_m: f64,

    /// Effective earth radius factor (defaults to 1.33).
    k_factor: f64,

    /// Obstructions above bare terrain (defaults to none).
    clutter: Clutter,
}

impl AnalysisBuilder {
    /// Frequency of signal (MHz, required).
    #[must_use]
    pub fn freq(mut self, freq_mhz: f64) -> Self {
        self.freq_mhz = Some(freq_mhz);
        self
    }

    /// Transmit antenna height above ground at the first sample
    /// (meters, defaults to 0).
    #[must_use]
    pub fn tx_alt(mut self, meters: f64) -> Self {
        self.tx_alt_m = meters;
        self
    }

    /// Receive antenna height above ground at the last sample
    /// (meters, defaults to 0).
    #[must_use]
    pub fn rx_alt(mut self, meters: f64) -> Self {
        self.rx_alt_m = meters;
        self
    }

    /// Effective earth radius factor (defaults to 1.33).
    #[must_use]
    pub fn k_factor(mut self, k: f64) -> Self {
        self.k_factor = k;
        self
    }

    /// Obstructions above bare terrain (defaults to none).
    #[must_use]
    pub fn clutter(mut self, clutter: Clutter) -> Self {
        self.clutter = clutter;
        self
    }

    pub fn build(&self, profile: &[ElevationSample]) -> Result<Analysis, PropahError> {
        let freq_mhz = self.freq_mhz.ok_or(PropahError::Builder("freq"))?;
        Ok(self.run(freq_mhz, profile))
    }

    fn run(&self, freq_mhz: f64, profile: &[ElevationSample]) -> Analysis {
        let (first, last) = match (profile.first(), profile.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                debug!("analysis; empty profile");
                return Analysis::no_data();
            }
        };
        let valid_freq = freq_mhz.is_finite() && freq_mhz > 0.0;
        let valid_k = self.k_factor.is_finite() && self.k_factor > 0.0;
        if !(valid_freq && valid_k) {
            warn!(
                "analysis; invalid freq {freq_mhz} MHz or k-factor {}",
                self.k_factor
            );
            return Analysis::no_data();
        }

        // Co-located endpoints have no path to judge.
        let total_km = last.distance_km;
        if !(total_km.is_finite() && total_km > 0.0) {
            warn!("analysis; degenerate path length {total_km} km");
            return Analysis::no_data();
        }
        let tx_abs_m = first.elevation_m + self.tx_alt_m;
        let rx_abs_m = last.elevation_m + self.rx_alt_m;

        let samples: Vec<AnnotatedSample> = profile
            .iter()
            .enumerate()
            .map(|(idx, &ElevationSample { distance_km, elevation_m })| {
                let earth_bulge_m = earth_bulge(distance_km, total_km, self.k_factor);
                let effective_terrain_m = elevation_m + earth_bulge_m + self.clutter.at(idx);
                let los_m = tx_abs_m + (rx_abs_m - tx_abs_m) * (distance_km / total_km);
                let fresnel_radius_m = fresnel_radius(total_km, freq_mhz, distance_km);
                let vertical_gap_m = los_m - effective_terrain_m;
                let fresnel_ratio = if fresnel_radius_m > 0.0 {
                    vertical_gap_m / fresnel_radius_m
                } else {
                    1.0
                };
                AnnotatedSample {
                    distance_km,
                    elevation_m,
                    earth_bulge_m,
                    effective_terrain_m,
                    los_m,
                    fresnel_radius_m,
                    clearance_m: vertical_gap_m - fresnel_radius_m,
                    fresnel_ratio,
                }
            })
            .collect();

        if let Some(bad) = samples
            .iter()
            .find(|s| !(s.effective_terrain_m.is_finite() && s.los_m.is_finite()))
        {
            warn!(
                "analysis; non-finite sample at {} km, elevation: {}",
                bad.distance_km, bad.elevation_m
            );
            return Analysis::no_data();
        }

        let verdict = LinkVerdict::from_samples(&samples);
        debug!(
            "analysis; len: {}, distance: {total_km:.3} km, verdict: {verdict:?}",
            samples.len()
        );
        Analysis { samples, verdict }
    }
}
