use std::collections::HashMap;

use log::{debug, warn};

use crate::config::*;

// The record field read for each weighted field, resolved once per weighting configuration.
fn lookup_plan(weightings: &Weightings) -> Vec<(String, f64)> {
    weightings
        .iter()
        .map(|(field, w)| (w.mode.field_name(field), w.weight))
        .collect()
}

fn score_with_plan(record: &RegionRecord, plan: &[(String, f64)]) -> f64 {
    plan.iter()
        .fold(0.0, |acc, (name, weight)| acc + weight * record.number(name))
}

/// The composite score of one region: the sum of weight x selected value over all the
/// weighted fields.
///
/// Missing and non-numeric values contribute 0. This never fails and has no side effect.
pub fn score_one(record: &RegionRecord, weightings: &Weightings) -> f64 {
    score_with_plan(record, &lookup_plan(weightings))
}

/// Scores of all the regions, in dataset order.
///
/// Records without a region code cannot be ranked and are skipped.
pub fn scores_in_order<'a>(dataset: &'a Dataset, weightings: &Weightings) -> Vec<(&'a str, f64)> {
    let plan = lookup_plan(weightings);
    debug!("scores_in_order: lookup plan: {:?}", plan);
    dataset
        .records
        .iter()
        .filter_map(|record| match dataset.code_of(record) {
            Some(code) => Some((code, score_with_plan(record, &plan))),
            None => {
                warn!("scores_in_order: skipping a record without region code");
                None
            }
        })
        .collect()
}

/// Scores of all the regions, keyed by region code.
pub fn score_all(dataset: &Dataset, weightings: &Weightings) -> HashMap<String, f64> {
    scores_in_order(dataset, weightings)
        .into_iter()
        .map(|(code, score)| (code.to_string(), score))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_all;

    fn sample() -> Dataset {
        let rows = [("a", 10.0, 3.0), ("b", 20.0, 1.0), ("c", 30.0, 2.0)];
        let records = rows
            .iter()
            .map(|(code, pop, age)| {
                let mut r = RegionRecord::new();
                r.insert("Code", *code);
                r.insert("Pop", *pop);
                r.insert("Age", *age);
                r
            })
            .collect();
        normalize_all(&Dataset::new("Code", records), &["Code"]).0
    }

    fn weights(entries: &[(&str, f64, ScoreMode)]) -> Weightings {
        let mut w = Weightings::default();
        for (field, weight, mode) in entries {
            w.insert(
                field,
                Weighting {
                    weight: *weight,
                    mode: *mode,
                },
            );
        }
        w
    }

    #[test]
    fn modes_select_the_representation() {
        let ds = sample();
        let b = &ds.records[1];
        assert_eq!(score_one(b, &weights(&[("Pop", 1.0, ScoreMode::Value)])), 20.0);
        assert_eq!(
            score_one(b, &weights(&[("Pop", 1.0, ScoreMode::Normalized)])),
            0.5
        );
        assert_eq!(score_one(b, &weights(&[("Age", 2.0, ScoreMode::Rank)])), 0.0);
    }

    #[test]
    fn negative_weights_are_allowed() {
        let ds = sample();
        let w = weights(&[("Pop", -2.0, ScoreMode::Value), ("Age", 1.0, ScoreMode::Value)]);
        assert_eq!(score_one(&ds.records[0], &w), -17.0);
    }

    #[test]
    fn missing_fields_contribute_nothing() {
        let ds = sample();
        let w = weights(&[("Missing", 5.0, ScoreMode::Value), ("Pop", 1.0, ScoreMode::Value)]);
        assert_eq!(score_one(&ds.records[2], &w), 30.0);
        let raw = Dataset::new("Code", vec![ds.records[2].clone()]);
        // Not normalized yet: the derived field is missing.
        let w = weights(&[("Pop", 1.0, ScoreMode::Rank)]);
        let mut r = raw.records[0].clone();
        r.insert("Pop_RANK", "bad");
        assert_eq!(score_one(&r, &w), 0.0);
    }

    #[test]
    fn scores_are_linear_in_the_weights() {
        let ds = sample();
        let w1 = weights(&[("Pop", 1.5, ScoreMode::Normalized), ("Age", -1.0, ScoreMode::Value)]);
        let w2 = weights(&[("Pop", 0.5, ScoreMode::Normalized), ("Age", 4.0, ScoreMode::Value)]);
        let sum = weights(&[("Pop", 2.0, ScoreMode::Normalized), ("Age", 3.0, ScoreMode::Value)]);
        for r in ds.records.iter() {
            let lhs = score_one(r, &sum);
            let rhs = score_one(r, &w1) + score_one(r, &w2);
            assert!((lhs - rhs).abs() < 1e-12);
        }
    }

    #[test]
    fn neutral_weightings_score_zero() {
        let ds = sample();
        let w = Weightings::for_fields(["Pop", "Age"]);
        let all = score_all(&ds, &w);
        assert_eq!(all.len(), 3);
        assert!(all.values().all(|s| *s == 0.0));
    }

    #[test]
    fn records_without_codes_are_skipped() {
        let mut ds = sample();
        let mut orphan = RegionRecord::new();
        orphan.insert("Pop", 1.0);
        ds.records.push(orphan);
        let w = weights(&[("Pop", 1.0, ScoreMode::Value)]);
        let scores = scores_in_order(&ds, &w);
        assert_eq!(scores, vec![("a", 10.0), ("b", 20.0), ("c", 30.0)]);
    }
}
