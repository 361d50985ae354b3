// ********* Input data structures ***********

use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::Display;

use log::warn;
use serde::{Deserialize, Serialize};

/// Epsilon added to every score range so that it can always be used as a divisor.
pub const QUANTUM: f64 = 0.000001;

/// Suffix of the synthesized field holding the min/max normalized value of a field.
pub const NORMALIZED_SUFFIX: &str = "_NORMALIZED";
/// Suffix of the synthesized field holding the percentile rank of a field.
pub const RANK_SUFFIX: &str = "_RANK";

pub const DEFAULT_CODE_FIELD: &str = "Ward Code";
pub const DEFAULT_NAME_FIELD: &str = "Ward Name";

/// Identifier, name and administrative columns of the ward statistics table.
/// None of them can be weighted.
pub const DEFAULT_EXCLUDED_FIELDS: [&str; 12] = [
    "WD11CD",
    "WD11CDO",
    "WD11NM",
    "WD11NMW",
    DEFAULT_CODE_FIELD,
    DEFAULT_NAME_FIELD,
    "LA Name",
    "Region",
    "Rurality",
    "Constituency",
    "Constituency Code",
    "GE 2017",
];

/// A single cell of the statistics table.
///
/// Numeric contexts are lenient: text (and NaN) count as zero, see [`FieldValue::as_number`].
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// The value used in every arithmetic context.
    ///
    /// Non-numeric values are coerced to 0. This is the documented fallback of the
    /// scoring engine, not an error.
    pub fn as_number(&self) -> f64 {
        match self {
            FieldValue::Number(x) if !x.is_nan() => *x,
            _ => 0.0,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            FieldValue::Number(_) => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(x: f64) -> Self {
        FieldValue::Number(x)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Number(x) => write!(f, "{}", x),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One row of the table: field name -> value.
///
/// Derived fields are added as new keys, the original keys are never rewritten.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl RegionRecord {
    pub fn new() -> RegionRecord {
        RegionRecord::default()
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// The numeric value of a field. Missing and non-numeric fields are 0.
    pub fn number(&self, field: &str) -> f64 {
        self.fields
            .get(field)
            .map(FieldValue::as_number)
            .unwrap_or(0.0)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(FieldValue::as_text)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, FieldValue)> for RegionRecord {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        RegionRecord {
            fields: iter.into_iter().collect(),
        }
    }
}

/// The parsed statistics table.
///
/// The order of the records is meaningful: it is the tie-break order for field ranks
/// and for the final ranking.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub code_field: String,
    pub records: Vec<RegionRecord>,
}

impl Dataset {
    pub fn new(code_field: &str, records: Vec<RegionRecord>) -> Dataset {
        Dataset {
            code_field: code_field.to_string(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A representative record. All the records share the same field names.
    pub fn sample(&self) -> Option<&RegionRecord> {
        self.records.first()
    }

    pub fn code_of<'a>(&self, record: &'a RegionRecord) -> Option<&'a str> {
        record.text(&self.code_field)
    }

    pub fn find(&self, code: &str) -> Option<&RegionRecord> {
        self.records
            .iter()
            .find(|r| self.code_of(r) == Some(code))
    }
}

// ********* Weighting configuration **********

/// Which representation of a field contributes to the score.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreMode {
    /// The raw value.
    Value,
    /// The value rescaled to [0, 1] with the dataset-wide min and max.
    #[default]
    Normalized,
    /// The ascending percentile position of the value, in [0, 1].
    Rank,
}

impl ScoreMode {
    pub fn suffix(self) -> &'static str {
        match self {
            ScoreMode::Value => "",
            ScoreMode::Normalized => NORMALIZED_SUFFIX,
            ScoreMode::Rank => RANK_SUFFIX,
        }
    }

    /// The name of the record field read for `field` under this mode.
    pub fn field_name(self, field: &str) -> String {
        format!("{}{}", field, self.suffix())
    }
}

#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Weighting {
    pub weight: f64,
    pub mode: ScoreMode,
}

impl Weighting {
    pub const NEUTRAL: Weighting = Weighting {
        weight: 0.0,
        mode: ScoreMode::Normalized,
    };
}

/// Per-field weights, edited by the user.
///
/// Backed by an ordered map so that iteration and serialization are deterministic.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weightings {
    entries: BTreeMap<String, Weighting>,
}

impl Weightings {
    /// The initial configuration for a freshly loaded dataset: every field at weight 0.
    pub fn for_fields<S: AsRef<str>>(fields: impl IntoIterator<Item = S>) -> Weightings {
        Weightings {
            entries: fields
                .into_iter()
                .map(|f| (f.as_ref().to_string(), Weighting::NEUTRAL))
                .collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Weighting> {
        self.entries.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Weighting)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, field: &str, weighting: Weighting) {
        self.entries.insert(field.to_string(), weighting);
    }

    pub fn set_weight(&mut self, field: &str, weight: f64) -> Result<(), ScoringError> {
        let entry = self
            .entries
            .get_mut(field)
            .ok_or_else(|| ScoringError::UnknownField(field.to_string()))?;
        entry.weight = weight;
        Ok(())
    }

    pub fn set_mode(&mut self, field: &str, mode: ScoreMode) -> Result<(), ScoringError> {
        let entry = self
            .entries
            .get_mut(field)
            .ok_or_else(|| ScoringError::UnknownField(field.to_string()))?;
        entry.mode = mode;
        Ok(())
    }

    /// Aligns the configuration with the comparison fields of a dataset.
    ///
    /// Missing fields get the neutral weighting, entries for fields the dataset does not
    /// have are dropped. Returns true if anything changed.
    pub fn reconcile(&mut self, fields: &BTreeSet<String>) -> bool {
        let before = self.entries.len();
        self.entries.retain(|name, _| {
            let keep = fields.contains(name);
            if !keep {
                warn!("reconcile: dropping weighting for unknown field {:?}", name);
            }
            keep
        });
        let mut changed = self.entries.len() != before;
        for f in fields.iter() {
            if !self.entries.contains_key(f) {
                self.entries.insert(f.clone(), Weighting::NEUTRAL);
                changed = true;
            }
        }
        changed
    }

    /// True when no field carries any weight: every region then scores 0.
    pub fn is_neutral(&self) -> bool {
        self.entries.values().all(|w| w.weight == 0.0)
    }

    /// A digest of the configuration, equal for equal configurations.
    pub fn fingerprint(&self) -> Result<String, ScoringError> {
        fingerprint(self)
    }
}

/// sha256 of the canonical JSON encoding of a value.
pub fn fingerprint<T: Serialize>(value: &T) -> Result<String, ScoringError> {
    let encoded =
        serde_json::to_string(value).map_err(|e| ScoringError::Serialization(e.to_string()))?;
    Ok(sha256::digest(encoded))
}

// ******** Output data structures *********

/// Extent of one comparison field over the whole dataset.
#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FieldStats {
    pub min: f64,
    pub max: f64,
}

impl FieldStats {
    /// Identity element for `include`.
    pub const EMPTY: FieldStats = FieldStats {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
    };

    pub fn include(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Linear rescaling to [0, 1]. A zero-range field maps every value to 0.
    pub fn normalize(&self, value: f64) -> f64 {
        let range = self.range();
        if range.is_nan() || range <= 0.0 {
            return 0.0;
        }
        let x = if range.is_finite() {
            (value - self.min) / range
        } else {
            // The extent overflows: rescale from the halves instead.
            (value / 2.0 - self.min / 2.0) / (self.max / 2.0 - self.min / 2.0)
        };
        x.clamp(0.0, 1.0)
    }
}

/// Position of one region in the final ranking.
#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RankEntry {
    /// Score rescaled with the score range, in [0, 1).
    pub score: f64,
    /// 1-based rank, 1 being the highest score.
    pub rank: u32,
}

impl RankEntry {
    /// What the presentation layer shows for a region missing from the ranking.
    pub const UNRANKED: RankEntry = RankEntry {
        score: 0.0,
        rank: 0,
    };
}

#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreRange {
    #[serde(rename = "minScore")]
    pub min_score: f64,
    #[serde(rename = "maxScore")]
    pub max_score: f64,
    /// `max_score - min_score + QUANTUM`, always strictly positive.
    #[serde(rename = "scoreRange")]
    pub range: f64,
}

impl ScoreRange {
    /// The "no scores available" sentinel.
    pub const EMPTY: ScoreRange = ScoreRange {
        min_score: 0.0,
        max_score: 0.0,
        range: QUANTUM,
    };

    pub fn from_bounds(min_score: f64, max_score: f64) -> ScoreRange {
        ScoreRange {
            min_score,
            max_score,
            range: max_score - min_score + QUANTUM,
        }
    }

    /// True when there is no meaningful spread of scores, the presentation should
    /// render every region neutrally.
    pub fn is_flat(&self) -> bool {
        self.range <= QUANTUM
    }

    pub fn fraction(&self, raw_score: f64) -> f64 {
        (raw_score - self.min_score) / self.range
    }
}

/// The complete output of the ranking engine.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RankingTable {
    #[serde(rename = "scoreRange")]
    pub score_range: ScoreRange,
    pub rankings: BTreeMap<String, RankEntry>,
}

impl RankingTable {
    pub fn empty() -> RankingTable {
        RankingTable {
            score_range: ScoreRange::EMPTY,
            rankings: BTreeMap::new(),
        }
    }

    pub fn get(&self, code: &str) -> RankEntry {
        self.rankings
            .get(code)
            .copied()
            .unwrap_or(RankEntry::UNRANKED)
    }

    pub fn len(&self) -> usize {
        self.rankings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rankings.is_empty()
    }

    /// All the entries, best rank first.
    pub fn by_rank(&self) -> Vec<(&str, RankEntry)> {
        let mut res: Vec<(&str, RankEntry)> = self
            .rankings
            .iter()
            .map(|(code, entry)| (code.as_str(), *entry))
            .collect();
        res.sort_by_key(|(_, entry)| entry.rank);
        res
    }
}

/// Errors raised while assembling or configuring a dataset.
///
/// The scoring pipeline itself never fails: anomalies are absorbed there.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ScoringError {
    MissingCodeColumn(String),
    MissingRegionCode { row: usize },
    DuplicateRegion(String),
    UnknownField(String),
    Serialization(String),
}

impl Error for ScoringError {}

impl Display for ScoringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringError::MissingCodeColumn(c) => write!(f, "missing region code column {:?}", c),
            ScoringError::MissingRegionCode { row } => {
                write!(f, "missing region code on row {}", row)
            }
            ScoringError::DuplicateRegion(code) => write!(f, "duplicate region code {:?}", code),
            ScoringError::UnknownField(name) => write!(f, "unknown comparison field {:?}", name),
            ScoringError::Serialization(msg) => write!(f, "serialization error: {}", msg),
        }
    }
}
