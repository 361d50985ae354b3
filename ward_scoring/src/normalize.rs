//! Per-field statistics and the derived normalized / rank fields.
//!
//! All arithmetic is done on `f64`. Non-numeric cells are read as 0 (see
//! [`FieldValue::as_number`]): callers providing text in a comparison field get a
//! region that behaves as if it held 0 for that field.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};

use crate::config::*;
use crate::fields::classify;

/// Min and max of every comparison field, in a single pass over the records.
///
/// An empty dataset has no statistics.
pub fn compute_stats(dataset: &Dataset, fields: &BTreeSet<String>) -> BTreeMap<String, FieldStats> {
    if dataset.is_empty() {
        return BTreeMap::new();
    }
    let names: Vec<&String> = fields.iter().collect();
    let mut acc: Vec<FieldStats> = vec![FieldStats::EMPTY; names.len()];
    for record in dataset.records.iter() {
        for (idx, name) in names.iter().enumerate() {
            acc[idx].include(record.number(name));
        }
    }
    names.into_iter().cloned().zip(acc).collect()
}

/// The ascending percentile position of every record for one field, in dataset order.
///
/// The lowest value gets 0, the highest 1. Ties keep the dataset order (stable sort),
/// so tied values get distinct, adjacent fractions. A single record gets 0.
pub fn field_ranks(dataset: &Dataset, field: &str) -> Vec<f64> {
    let n = dataset.len();
    let mut ranks = vec![0.0; n];
    if n < 2 {
        return ranks;
    }
    let mut order: Vec<(usize, f64)> = dataset
        .records
        .iter()
        .map(|r| r.number(field))
        .enumerate()
        .collect();
    // Values are never NaN here.
    order.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    let denominator = (n - 1) as f64;
    for (position, (idx, _)) in order.iter().enumerate() {
        ranks[*idx] = position as f64 / denominator;
    }
    ranks
}

/// Returns a copy of the dataset with `<field>_NORMALIZED` and `<field>_RANK` added to
/// every record, for every comparison field.
pub fn apply_derived_fields(
    dataset: &Dataset,
    fields: &BTreeSet<String>,
    stats: &BTreeMap<String, FieldStats>,
) -> Dataset {
    let mut records = dataset.records.clone();
    for field in fields.iter() {
        let field_stats = match stats.get(field) {
            Some(s) => *s,
            None => FieldStats { min: 0.0, max: 0.0 },
        };
        if field_stats.range() == 0.0 {
            debug!("apply_derived_fields: {:?} has a zero range", field);
        }
        let normalized_name = ScoreMode::Normalized.field_name(field);
        let rank_name = ScoreMode::Rank.field_name(field);
        let ranks = field_ranks(dataset, field);
        for (record, rank) in records.iter_mut().zip(ranks) {
            let normalized = field_stats.normalize(record.number(field));
            record.insert(normalized_name.clone(), normalized);
            record.insert(rank_name.clone(), rank);
        }
    }
    Dataset {
        code_field: dataset.code_field.clone(),
        records,
    }
}

/// Classifies, measures and derives in one go.
///
/// Returns the derived dataset and its comparison fields. Running it again on its own
/// output gives the same result: derived fields are never comparison fields.
pub fn normalize_all<E: AsRef<str>>(dataset: &Dataset, excluded: &[E]) -> (Dataset, BTreeSet<String>) {
    let fields = classify(dataset.sample(), excluded);
    let stats = compute_stats(dataset, &fields);
    let derived = apply_derived_fields(dataset, &fields, &stats);
    info!(
        "normalize_all: {} regions, {} comparison fields",
        derived.len(),
        fields.len()
    );
    (derived, fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(values: &[(&str, f64)]) -> Dataset {
        let records = values
            .iter()
            .map(|(code, pop)| {
                let mut r = RegionRecord::new();
                r.insert("Code", *code);
                r.insert("Pop", *pop);
                r
            })
            .collect();
        Dataset::new("Code", records)
    }

    fn pop_fields() -> BTreeSet<String> {
        ["Pop".to_string()].into_iter().collect()
    }

    #[test]
    fn stats_track_min_and_max() {
        let ds = dataset(&[("a", 20.0), ("b", -3.0), ("c", 7.0)]);
        let stats = compute_stats(&ds, &pop_fields());
        assert_eq!(stats["Pop"], FieldStats { min: -3.0, max: 20.0 });
    }

    #[test]
    fn empty_dataset_has_no_stats() {
        let ds = dataset(&[]);
        assert!(compute_stats(&ds, &pop_fields()).is_empty());
        let (derived, _) = normalize_all(&ds, &["Code"]);
        assert!(derived.is_empty());
    }

    #[test]
    fn three_regions_normalize_linearly() {
        let ds = dataset(&[("r10", 10.0), ("r20", 20.0), ("r30", 30.0)]);
        let (derived, fields) = normalize_all(&ds, &["Code"]);
        assert_eq!(fields, pop_fields());
        let normalized: Vec<f64> = derived
            .records
            .iter()
            .map(|r| r.number("Pop_NORMALIZED"))
            .collect();
        assert_eq!(normalized, vec![0.0, 0.5, 1.0]);
        let ranks: Vec<f64> = derived.records.iter().map(|r| r.number("Pop_RANK")).collect();
        assert_eq!(ranks, vec![0.0, 0.5, 1.0]);
        // The raw values are untouched.
        assert_eq!(derived.records[2].number("Pop"), 30.0);
    }

    #[test]
    fn zero_range_field_normalizes_to_zero() {
        let ds = dataset(&[("a", 5.0), ("b", 5.0)]);
        let (derived, _) = normalize_all(&ds, &["Code"]);
        for r in derived.records.iter() {
            assert_eq!(r.number("Pop_NORMALIZED"), 0.0);
        }
    }

    #[test]
    fn ranks_follow_values_not_positions() {
        let ds = dataset(&[("a", 3.0), ("b", 1.0), ("c", 2.0), ("d", 0.0), ("e", 9.0)]);
        let ranks = field_ranks(&ds, "Pop");
        assert_eq!(ranks, vec![0.75, 0.25, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn ties_take_adjacent_ranks_in_dataset_order() {
        let ds = dataset(&[("a", 1.0), ("b", 1.0), ("c", 0.0)]);
        let ranks = field_ranks(&ds, "Pop");
        assert_eq!(ranks, vec![0.5, 1.0, 0.0]);
    }

    #[test]
    fn single_region_ranks_zero() {
        let ds = dataset(&[("a", 42.0)]);
        assert_eq!(field_ranks(&ds, "Pop"), vec![0.0]);
        let (derived, _) = normalize_all(&ds, &["Code"]);
        assert_eq!(derived.records[0].number("Pop_NORMALIZED"), 0.0);
    }

    #[test]
    fn text_cells_are_read_as_zero() {
        let mut ds = dataset(&[("a", 4.0), ("b", 8.0)]);
        ds.records[1].insert("Pop", "unknown");
        let (derived, _) = normalize_all(&ds, &["Code"]);
        assert_eq!(derived.records[0].number("Pop_NORMALIZED"), 1.0);
        assert_eq!(derived.records[1].number("Pop_NORMALIZED"), 0.0);
    }

    #[test]
    fn normalization_bounds_hold() {
        let values: Vec<(String, f64)> = (0..50)
            .map(|i| (format!("r{}", i), ((i * 37) % 23) as f64 - 11.0))
            .collect();
        let refs: Vec<(&str, f64)> = values.iter().map(|(c, v)| (c.as_str(), *v)).collect();
        let ds = dataset(&refs);
        let (derived, _) = normalize_all(&ds, &["Code"]);
        for r in derived.records.iter() {
            let n = r.number("Pop_NORMALIZED");
            let k = r.number("Pop_RANK");
            assert!((0.0..=1.0).contains(&n));
            assert!((0.0..=1.0).contains(&k));
        }
        // Ascending raw values give non-decreasing ranks.
        let mut pairs: Vec<(f64, f64)> = derived
            .records
            .iter()
            .map(|r| (r.number("Pop"), r.number("Pop_RANK")))
            .collect();
        pairs.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        assert!(pairs.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[test]
    fn normalizing_twice_is_stable() {
        let ds = dataset(&[("a", 1.0), ("b", 4.0), ("c", 2.0)]);
        let (once, fields_once) = normalize_all(&ds, &["Code"]);
        let (twice, fields_twice) = normalize_all(&once, &["Code"]);
        assert_eq!(once, twice);
        assert_eq!(fields_once, fields_twice);
    }
}
