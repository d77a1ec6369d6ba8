//! LoRa link budget.

use serde::{Deserialize, Serialize};

/// Free space path loss constant for distances in km and frequency
/// in MHz.
pub const FSPL_CONSTANT_DB: f64 = 32.44;

/// Receiver sensitivity at SF7 / 125 kHz.
pub const SENSITIVITY_BASELINE_DBM: f64 = -123.0;

/// Bandwidth the baseline sensitivity is calibrated for.
pub const REFERENCE_BANDWIDTH_KHZ: f64 = 125.0;

/// Spreading factor the baseline sensitivity is calibrated for.
pub const REFERENCE_SPREADING_FACTOR: u8 = 7;

/// Sensitivity change per spreading factor step above the reference.
pub const SPREADING_FACTOR_STEP_DB: f64 = -2.5;

/// Radio configuration shared by both ends of a link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioParams {
    pub tx_power_dbm: f64,
    pub tx_gain_dbi: f64,
    pub tx_cable_loss_db: f64,
    pub rx_gain_dbi: f64,
    pub rx_cable_loss_db: f64,
    pub freq_mhz: f64,
    /// LoRa spreading factor, 6 through 12.
    pub spreading_factor: u8,
    pub bandwidth_khz: f64,
}

impl Default for RadioParams {
    fn default() -> Self {
        Self {
            tx_power_dbm: 20.0,
            tx_gain_dbi: 3.0,
            tx_cable_loss_db: 1.0,
            rx_gain_dbi: 3.0,
            rx_cable_loss_db: 1.0,
            freq_mhz: 915.0,
            spreading_factor: REFERENCE_SPREADING_FACTOR,
            bandwidth_khz: REFERENCE_BANDWIDTH_KHZ,
        }
    }
}

impl RadioParams {
    pub fn is_valid(&self) -> bool {
        self.freq_mhz.is_finite()
            && self.freq_mhz > 0.0
            && self.bandwidth_khz.is_finite()
            && self.bandwidth_khz > 0.0
            && (6..=12).contains(&self.spreading_factor)
    }

    /// Effective isotropic radiated power in dBm.
    pub fn eirp_dbm(&self) -> f64 {
        self.tx_power_dbm + self.tx_gain_dbi - self.tx_cable_loss_db
    }

    /// Weakest signal, in dBm, the receiver can decode.
    ///
    /// Wider bandwidth raises the noise floor; each spreading factor
    /// step above 7 lowers the threshold by 2.5 dB. An invalid
    /// bandwidth contributes no adjustment.
    pub fn sensitivity_dbm(&self) -> f64 {
        let bw_adjust = if self.bandwidth_khz.is_finite() && self.bandwidth_khz > 0.0 {
            10.0 * (self.bandwidth_khz / REFERENCE_BANDWIDTH_KHZ).log10()
        } else {
            0.0
        };
        let sf_steps = f64::from(self.spreading_factor) - f64::from(REFERENCE_SPREADING_FACTOR);
        SENSITIVITY_BASELINE_DBM + bw_adjust + sf_steps * SPREADING_FACTOR_STEP_DB
    }
}

/// Returns free space path loss in dB.
///
/// Co-located (`distance_km <= 0`) or otherwise degenerate inputs
/// return 0 instead of propagating a NaN or infinity.
pub fn fspl_db(distance_km: f64, freq_mhz: f64) -> f64 {
    let positive = |v: f64| v.is_finite() && v > 0.0;
    if !positive(distance_km) || !positive(freq_mhz) {
        return 0.0;
    }
    20.0 * distance_km.log10() + 20.0 * freq_mhz.log10() + FSPL_CONSTANT_DB
}

/// Signal levels for one link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkBudget {
    pub fspl_db: f64,
    pub rx_signal_dbm: f64,
    pub sensitivity_dbm: f64,
    /// Received signal above sensitivity. Positive means the link
    /// closes.
    pub margin_db: f64,
}

impl LinkBudget {
    pub fn compute(params: &RadioParams, distance_km: f64) -> Self {
        let fspl_db = fspl_db(distance_km, params.freq_mhz);
        let rx_signal_dbm =
            params.eirp_dbm() - fspl_db + params.rx_gain_dbi - params.rx_cable_loss_db;
        let sensitivity_dbm = params.sensitivity_dbm();
        Self {
            fspl_db,
            rx_signal_dbm,
            sensitivity_dbm,
            margin_db: rx_signal_dbm - sensitivity_dbm,
        }
    }
}

/// Where a link's margin stops being comfortable.
///
/// This is an operator policy, not a physical property, and never
/// decides obstruction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarginPolicy {
    pub safe_margin_db: f64,
}

impl Default for MarginPolicy {
    fn default() -> Self {
        Self {
            safe_margin_db: 10.0,
        }
    }
}

impl MarginPolicy {
    pub fn is_safe(&self, margin_db: f64) -> bool {
        margin_db > self.safe_margin_db
    }
}
