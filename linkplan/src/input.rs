//! Reading nodes, sites and areas from disk.

use anyhow::{anyhow, Context, Result};
use geo::geometry::{LineString, Polygon};
use propah::{planner::Site, Node};
use std::{fs, path::Path};

/// Reads nodes from a JSON array, or from CSV lines of
/// `name,lat,lng` when the file isn't JSON.
///
/// A CSV header line is skipped. Nodes without an id are numbered in
/// file order.
pub fn read_nodes(path: &Path) -> Result<Vec<Node>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut nodes = if text.trim_start().starts_with('[') {
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
    } else {
        parse_csv_nodes(&text)?
    };
    for (idx, node) in nodes.iter_mut().enumerate() {
        if node.id.is_empty() {
            node.id = idx.to_string();
        }
    }
    Ok(nodes)
}

fn parse_csv_nodes(text: &str) -> Result<Vec<Node>> {
    let mut nodes = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        // Split from the right so names may contain commas.
        let mut fields = line.rsplitn(3, ',').map(str::trim);
        let (Some(lng), Some(lat), Some(name)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(anyhow!("line {}: expected name,lat,lng", line_no + 1));
        };
        let (Ok(lat), Ok(lng)) = (lat.parse::<f64>(), lng.parse::<f64>()) else {
            if nodes.is_empty() && line_no == 0 {
                continue;
            }
            return Err(anyhow!("line {}: invalid coordinates", line_no + 1));
        };
        nodes.push(Node {
            id: String::new(),
            name: name.trim_matches('"').to_owned(),
            lat,
            lng,
        });
    }
    Ok(nodes)
}

pub fn read_sites(path: &Path) -> Result<Vec<Site>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Reads a polygon exterior from a JSON array of `[lng, lat]` pairs.
pub fn read_area(path: &Path) -> Result<Polygon<f64>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let ring: Vec<(f64, f64)> =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    if ring.len() < 3 {
        return Err(anyhow!("area needs at least 3 points, got {}", ring.len()));
    }
    Ok(Polygon::new(LineString::from(ring), vec![]))
}
