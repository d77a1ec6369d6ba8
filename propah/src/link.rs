use crate::{
    budget::{LinkBudget, MarginPolicy, RadioParams},
    error::PropahError,
    p2p::{analyze, Analysis, LinkVerdict},
};
use geo::geometry::Coord;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use terrain::{constants::STANDARD_K_FACTOR, ElevationSample, TerrainSource};

/// Everything besides terrain needed to judge a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub radio: RadioParams,
    pub tx_alt_m: f64,
    pub rx_alt_m: f64,
    pub k_factor: f64,
    pub clutter_m: f64,
    pub policy: MarginPolicy,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            radio: RadioParams::default(),
            tx_alt_m: 10.0,
            rx_alt_m: 10.0,
            k_factor: STANDARD_K_FACTOR,
            clutter_m: 0.0,
            policy: MarginPolicy::default(),
        }
    }
}

impl LinkConfig {
    /// Runs the terrain analysis and link budget over `profile`.
    ///
    /// The budget uses the profile's own length.
    pub fn evaluate(&self, profile: &[ElevationSample]) -> LinkReport {
        let analysis = analyze(
            profile,
            self.radio.freq_mhz,
            self.tx_alt_m,
            self.rx_alt_m,
            self.k_factor,
            self.clutter_m,
        );
        let distance_km = analysis.distance_km();
        let budget = LinkBudget::compute(&self.radio, distance_km);
        let status = LinkStatus::classify(&analysis.verdict, &budget, &self.policy);
        LinkReport {
            distance_km,
            analysis,
            budget,
            status,
        }
    }

    /// Fetches `samples` elevations between `start` and `end` and
    /// evaluates them.
    ///
    /// A fetch failure is an error, while an empty profile is an
    /// [`LinkStatus::Error`] report.
    pub async fn fetch_and_evaluate<S: TerrainSource>(
        &self,
        source: &S,
        start: Coord<f64>,
        end: Coord<f64>,
        samples: usize,
    ) -> Result<(Vec<ElevationSample>, LinkReport), PropahError> {
        let profile = source.profile(start, end, samples).await?;
        let report = self.evaluate(&profile);
        debug!("link; {start:?} -> {end:?}, status: {}", report.status);
        Ok((profile, report))
    }
}

/// Coarse link state combining obstruction and margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    Obstructed,
    Good,
    Marginal,
    /// No verdict: terrain was missing, unusable or could not be fetched.
    Error,
}

impl LinkStatus {
    pub fn classify(verdict: &LinkVerdict, budget: &LinkBudget, policy: &MarginPolicy) -> Self {
        if verdict.is_no_data() {
            LinkStatus::Error
        } else if verdict.is_obstructed {
            LinkStatus::Obstructed
        } else if policy.is_safe(budget.margin_db) {
            LinkStatus::Good
        } else {
            LinkStatus::Marginal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Obstructed => "OBSTRUCTED",
            LinkStatus::Good => "GOOD",
            LinkStatus::Marginal => "MARGINAL",
            LinkStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terrain analysis and link budget for one link.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkReport {
    pub distance_km: f64,
    pub analysis: Analysis,
    pub budget: LinkBudget,
    pub status: LinkStatus,
}

#[cfg(test)]
mod tests {
    use super::{LinkConfig, LinkStatus};
    use crate::{budget::MarginPolicy, p2p::Quality, PropahError};
    use geo::Coord;
    use terrain::{math::linspace, ElevationSample, TerrainError};

    fn flat(distance_km: f64, n: usize) -> Vec<ElevationSample> {
        linspace(0.0, distance_km, n)
            .map(|distance_km| ElevationSample {
                distance_km,
                elevation_m: 300.0,
            })
            .collect()
    }

    #[test]
    fn test_evaluate_flat() {
        let report = LinkConfig::default().evaluate(&flat(5.0, 21));
        assert_eq!(report.distance_km, 5.0);
        assert_eq!(report.status, LinkStatus::Good);
        assert!(report.budget.margin_db > 40.0);
        assert_eq!(report.analysis.verdict.quality, Quality::Marginal);
    }

    #[test]
    fn test_evaluate_policy() {
        let cfg = LinkConfig {
            policy: MarginPolicy {
                safe_margin_db: 50.0,
            },
            ..LinkConfig::default()
        };
        assert_eq!(cfg.evaluate(&flat(5.0, 21)).status, LinkStatus::Marginal);
    }

    #[test]
    fn test_evaluate_obstructed() {
        let mut profile = flat(5.0, 21);
        profile[10].elevation_m = 400.0;
        let report = LinkConfig::default().evaluate(&profile);
        assert_eq!(report.status, LinkStatus::Obstructed);
    }

    #[test]
    fn test_evaluate_empty() {
        let report = LinkConfig::default().evaluate(&[]);
        assert_eq!(report.status, LinkStatus::Error);
        assert!(report.analysis.verdict.is_no_data());
    }

    #[test]
    fn test_evaluate_colocated() {
        let report = LinkConfig::default().evaluate(&flat(0.0, 21));
        assert_eq!(report.status, LinkStatus::Error);
        assert_eq!(report.distance_km, 0.0);
        assert!(report.analysis.verdict.is_no_data());
    }

    #[test]
    fn test_evaluate_nan_elevation() {
        let mut profile = flat(5.0, 21);
        profile[7].elevation_m = f64::NAN;
        let report = LinkConfig::default().evaluate(&profile);
        assert_eq!(report.status, LinkStatus::Error);
    }

    #[test]
    fn test_status_names() {
        assert_eq!(LinkStatus::Obstructed.to_string(), "OBSTRUCTED");
        assert_eq!(LinkStatus::Good.to_string(), "GOOD");
        assert_eq!(LinkStatus::Marginal.to_string(), "MARGINAL");
        assert_eq!(LinkStatus::Error.to_string(), "ERROR");
    }

    #[tokio::test]
    async fn test_fetch_and_evaluate() {
        let source = |_start: Coord<f64>, _end: Coord<f64>, n: usize| async move {
            Ok::<_, TerrainError>(flat(5.0, n))
        };
        let origin = Coord { x: 0.0, y: 0.0 };
        let (profile, report) = LinkConfig::default()
            .fetch_and_evaluate(&source, origin, origin, 21)
            .await
            .unwrap();
        assert_eq!(profile.len(), 21);
        assert_eq!(report.status, LinkStatus::Good);

        let down = |_start: Coord<f64>, _end: Coord<f64>, _n: usize| async move {
            Err::<Vec<ElevationSample>, _>(TerrainError::Empty)
        };
        assert!(matches!(
            LinkConfig::default().fetch_and_evaluate(&down, origin, origin, 21).await,
            Err(PropahError::Terrain(TerrainError::Empty))
        ));
    }
}
