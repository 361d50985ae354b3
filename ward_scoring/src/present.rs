//! Helpers for the presentation collaborators: boundary join, leaderboard and shading.

use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

use crate::config::*;

/// Boundary features (GeoJSON `Feature` objects), keyed by region code.
pub type Boundaries = BTreeMap<String, JSValue>;

/// The property of the boundary features holding the region code.
pub const DEFAULT_BOUNDARY_CODE_PROPERTY: &str = "WD11CD";

/// Indexes the features of a GeoJSON feature collection by one of their properties.
///
/// Features without that property are skipped.
pub fn index_boundaries(collection: &JSValue, code_property: &str) -> Boundaries {
    let mut res = Boundaries::new();
    let features = match collection["features"].as_array() {
        Some(f) => f,
        None => {
            warn!("index_boundaries: no feature array in the collection");
            return res;
        }
    };
    for feature in features.iter() {
        match feature["properties"][code_property].as_str() {
            Some(code) => {
                res.insert(code.to_string(), feature.clone());
            }
            None => warn!(
                "index_boundaries: skipping a feature without {:?} property",
                code_property
            ),
        }
    }
    debug!("index_boundaries: indexed {} features", res.len());
    res
}

/// Joins every record with its boundary feature, in dataset order.
///
/// The fields of the record are merged into the `properties` of a copy of the feature,
/// overriding properties with the same name. Regions without a boundary are skipped.
pub fn join_boundaries(dataset: &Dataset, boundaries: &Boundaries) -> Vec<JSValue> {
    let mut res: Vec<JSValue> = Vec::with_capacity(dataset.len());
    let mut missing = 0;
    for record in dataset.records.iter() {
        let feature = match dataset.code_of(record).and_then(|c| boundaries.get(c)) {
            Some(f) => f,
            None => {
                missing += 1;
                continue;
            }
        };
        let mut joined = feature.clone();
        if !joined["properties"].is_object() {
            joined["properties"] = JSValue::Object(Default::default());
        }
        if let Some(properties) = joined["properties"].as_object_mut() {
            for (name, value) in record.iter() {
                let v = match value {
                    FieldValue::Number(x) => serde_json::json!(x),
                    FieldValue::Text(s) => JSValue::String(s.clone()),
                };
                properties.insert(name.clone(), v);
            }
        }
        res.push(joined);
    }
    if missing > 0 && !boundaries.is_empty() {
        warn!("join_boundaries: {} regions have no boundary", missing);
    }
    res
}

/// One line of the leaderboard.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub rank: u32,
    pub code: String,
    pub name: Option<String>,
    pub score: f64,
}

/// The ranked regions, best first, with their display name.
pub fn leaderboard(
    table: &RankingTable,
    dataset: &Dataset,
    name_field: &str,
    limit: Option<usize>,
) -> Vec<LeaderboardRow> {
    let names: HashMap<&str, &str> = dataset
        .records
        .iter()
        .filter_map(|r| Some((dataset.code_of(r)?, r.text(name_field)?)))
        .collect();
    table
        .by_rank()
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|(code, entry)| LeaderboardRow {
            rank: entry.rank,
            code: code.to_string(),
            name: names.get(code).map(|n| n.to_string()),
            score: entry.score,
        })
        .collect()
}

/// Restricts the regions shown on the map.
#[derive(PartialEq, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DisplayFilter {
    /// Only the regions ranked at most this. Zero means no limit.
    pub show_top: Option<u32>,
    /// Only the regions with a score fraction of at least this.
    pub show_above: Option<f64>,
}

impl DisplayFilter {
    pub fn is_visible(&self, entry: &RankEntry) -> bool {
        if let Some(top) = self.show_top {
            if top > 0 && top < entry.rank {
                return false;
            }
        }
        if let Some(above) = self.show_above {
            if entry.score < above {
                return false;
            }
        }
        true
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Linear mix: `weight` 0 gives `self`, 1 gives `other`.
    pub fn mix(self, other: Rgb, weight: f64) -> Rgb {
        let w = weight.clamp(0.0, 1.0);
        let channel = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * w).round() as u8;
        Rgb(
            channel(self.0, other.0),
            channel(self.1, other.1),
            channel(self.2, other.2),
        )
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// The two ends of the colour gradient.
#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Palette {
    pub bad: Rgb,
    pub good: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Palette {
            bad: Rgb(0xf4, 0x43, 0x36),
            good: Rgb(0x3f, 0x51, 0xb5),
        }
    }
}

/// Fill style of one region on the map.
#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Shade {
    /// None for a transparent fill.
    pub fill: Option<Rgb>,
    pub fill_opacity: f64,
}

pub fn shade(
    entry: &RankEntry,
    range: &ScoreRange,
    filter: &DisplayFilter,
    palette: &Palette,
) -> Shade {
    if !filter.is_visible(entry) {
        return Shade {
            fill: None,
            fill_opacity: 0.0,
        };
    }
    // Extreme scores are drawn more opaque than the middle of the range.
    let fill_opacity = if range.is_flat() {
        0.0
    } else {
        (0.5 - entry.score).abs() * 0.5 + 0.3
    };
    Shade {
        fill: Some(palette.bad.mix(palette.good, entry.score)),
        fill_opacity,
    }
}
