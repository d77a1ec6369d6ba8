use anyhow::{anyhow, Context, Error as AnyError};
use clap::{Args, Parser, Subcommand};
use geo::geometry::Coord;
use propah::{session::INTERACTIVE_SAMPLES, LinkConfig};
use std::{fs, path::PathBuf, str::FromStr};

/// Plan point-to-point radio links over real terrain.
///
/// Terrain comes from an OpenTopoData compatible service, set with
/// `ELEVATION_API_URL` and `ELEVATION_DATASET`.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub radio: RadioArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

/// Radio settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct RadioArgs {
    /// JSON link configuration to start from. Flags below override
    /// its values.
    #[arg(long, global = true)]
    pub radio: Option<PathBuf>,

    /// Carrier frequency in MHz.
    #[arg(short, long, global = true)]
    pub freq: Option<f64>,

    /// Transmit power in dBm.
    #[arg(long, global = true)]
    pub tx_power: Option<f64>,

    /// Antenna gain in dBi, both ends.
    #[arg(long, global = true)]
    pub gain: Option<f64>,

    /// LoRa spreading factor.
    #[arg(long, global = true)]
    pub sf: Option<u8>,

    /// LoRa bandwidth in kHz.
    #[arg(long, global = true)]
    pub bw: Option<f64>,

    /// Effective earth radius factor.
    #[arg(short, long, global = true)]
    pub k_factor: Option<f64>,

    /// Clutter height, in meters, added to all terrain.
    #[arg(long, global = true)]
    pub clutter: Option<f64>,

    /// Margin, in dB, above which a clear link is GOOD.
    #[arg(long, global = true)]
    pub safe_margin: Option<f64>,
}

impl RadioArgs {
    pub fn link_config(&self) -> Result<LinkConfig, AnyError> {
        let mut cfg: LinkConfig = match &self.radio {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))?
            }
            None => LinkConfig::default(),
        };
        if let Some(freq) = self.freq {
            cfg.radio.freq_mhz = freq;
        }
        if let Some(tx_power) = self.tx_power {
            cfg.radio.tx_power_dbm = tx_power;
        }
        if let Some(gain) = self.gain {
            cfg.radio.tx_gain_dbi = gain;
            cfg.radio.rx_gain_dbi = gain;
        }
        if let Some(sf) = self.sf {
            cfg.radio.spreading_factor = sf;
        }
        if let Some(bw) = self.bw {
            cfg.radio.bandwidth_khz = bw;
        }
        if let Some(k) = self.k_factor {
            cfg.k_factor = k;
        }
        if let Some(clutter) = self.clutter {
            cfg.clutter_m = clutter;
        }
        if let Some(safe_margin) = self.safe_margin {
            cfg.policy.safe_margin_db = safe_margin;
        }
        if !cfg.radio.is_valid() {
            return Err(anyhow!("invalid radio parameters {:?}", cfg.radio));
        }
        Ok(cfg)
    }
}

#[derive(Clone, Debug, Copy)]
pub struct LatLonAlt(pub Coord<f64>, pub f64);

impl FromStr for LatLonAlt {
    type Err = AnyError;
    fn from_str(s: &str) -> Result<Self, AnyError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let (lat, lon, alt) = match parts.as_slice() {
            [lat, lon] => (*lat, *lon, None),
            [lat, lon, alt] => (*lat, *lon, Some(*alt)),
            _ => return Err(anyhow!("not a valid lat,lon[,alt]")),
        };
        let lat = f64::from_str(lat)?;
        let lon = f64::from_str(lon)?;
        let alt = alt.map(f64::from_str).transpose()?.unwrap_or(10.0);
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(anyhow!("{lat},{lon} is out of range"));
        }
        Ok(Self(Coord { y: lat, x: lon }, alt))
    }
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Analyze a single link.
    Link(Link),

    /// Analyze every pair of a set of nodes.
    Matrix(Matrix),

    /// Choose relay sites that cover an area.
    Plan(Plan),
}

#[derive(Debug, Clone, Args)]
pub struct Link {
    /// Start "lat,lon[,alt]", where 'alt' is antenna meters above
    /// ground (defaults to 10).
    #[arg(long)]
    pub start: LatLonAlt,

    /// Destination "lat,lon[,alt]".
    #[arg(long)]
    pub dest: LatLonAlt,

    /// Number of elevation samples.
    #[arg(short, long, default_value_t = INTERACTIVE_SAMPLES)]
    pub samples: usize,

    #[command(subcommand)]
    pub output: LinkOutput,
}

#[derive(Debug, Subcommand, Clone)]
pub enum LinkOutput {
    /// Print the verdict and link budget.
    Summary,

    /// Print annotated samples as CSV.
    Csv,

    /// Print the full analysis as JSON.
    Json,

    /// Plot to terminal.
    Plot,

    /// Print the first Fresnel zone outline as a GeoJSON polygon.
    Corridor {
        /// Path segments along the corridor.
        #[arg(long, default_value_t = 40)]
        steps: usize,
    },
}

#[derive(Debug, Clone, Args)]
pub struct Matrix {
    /// Nodes as a JSON array of {name, lat, lng} or "name,lat,lng"
    /// CSV lines.
    #[arg(short, long)]
    pub nodes: PathBuf,

    /// Write the CSV report here instead of stdout.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Antenna height, in meters above ground, at every node.
    #[arg(long)]
    pub height: Option<f64>,

    /// Elevation samples per pair.
    #[arg(short, long, default_value_t = 32)]
    pub samples: usize,

    /// Minimum milliseconds between terrain requests.
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,

    /// Give up on a terrain request after this many milliseconds.
    #[arg(long, default_value_t = 30_000)]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Args)]
pub struct Plan {
    /// Candidate sites as a JSON array of
    /// {name, lat, lng, height_m?, weight?}.
    #[arg(long)]
    pub sites: PathBuf,

    /// Area to cover as a JSON array of [lng, lat] pairs.
    #[arg(long)]
    pub area: PathBuf,

    /// Target grid spacing in meters.
    #[arg(long, default_value_t = 500.0)]
    pub spacing: f64,

    /// Receive antenna height at targets, meters above ground.
    #[arg(long, default_value_t = 2.0)]
    pub target_height: f64,

    /// Elevation samples per site/target pair.
    #[arg(short, long, default_value_t = 32)]
    pub samples: usize,

    /// Minimum milliseconds between terrain requests.
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,

    /// Give up on a terrain request after this many milliseconds.
    #[arg(long, default_value_t = 30_000)]
    pub timeout_ms: u64,
}
