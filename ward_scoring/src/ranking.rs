use log::{debug, info, warn};

use crate::config::*;
use crate::score::scores_in_order;

/// Extent of the raw scores, with the QUANTUM floor.
///
/// Without any region, this is the `ScoreRange::EMPTY` sentinel.
pub fn score_range(scores: &[(&str, f64)]) -> ScoreRange {
    if scores.is_empty() {
        return ScoreRange::EMPTY;
    }
    let (min_score, max_score) = scores.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(lo, hi), (_, s)| (lo.min(*s), hi.max(*s)),
    );
    ScoreRange::from_bounds(min_score, max_score)
}

/// Ranks all the regions of a (normalized) dataset for a weighting configuration.
///
/// Regions are sorted by decreasing raw score. The sort is stable: regions with the
/// same score keep the dataset order. Each region gets its 1-based rank and its score
/// rescaled with the score range.
pub fn rank(dataset: &Dataset, weightings: &Weightings) -> RankingTable {
    let mut scored = scores_in_order(dataset, weightings);
    if scored.is_empty() {
        debug!("rank: no region to rank");
        return RankingTable::empty();
    }
    let range = score_range(&scored);
    debug!("rank: score range: {:?}", range);
    if range.is_flat() {
        info!("rank: all {} regions have the same score", scored.len());
    }

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut table = RankingTable {
        score_range: range,
        rankings: Default::default(),
    };
    for (idx, (code, raw_score)) in scored.into_iter().enumerate() {
        let entry = RankEntry {
            score: range.fraction(raw_score),
            rank: (idx + 1) as u32,
        };
        if table.rankings.insert(code.to_string(), entry).is_some() {
            warn!("rank: region {:?} appears more than once", code);
        }
    }
    info!(
        "rank: ranked {} regions, scores in [{}, {}]",
        table.len(),
        range.min_score,
        range.max_score
    );
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_all;
    use std::collections::BTreeSet;

    fn pop_dataset(values: &[(&str, f64)]) -> Dataset {
        let records = values
            .iter()
            .map(|(code, pop)| {
                let mut r = RegionRecord::new();
                r.insert("Code", *code);
                r.insert("Pop", *pop);
                r
            })
            .collect();
        normalize_all(&Dataset::new("Code", records), &["Code"]).0
    }

    fn pop_weight(weight: f64, mode: ScoreMode) -> Weightings {
        let mut w = Weightings::for_fields(["Pop"]);
        w.set_weight("Pop", weight).unwrap();
        w.set_mode("Pop", mode).unwrap();
        w
    }

    #[test]
    fn three_regions_normalized() {
        let ds = pop_dataset(&[("region10", 10.0), ("region20", 20.0), ("region30", 30.0)]);
        let table = rank(&ds, &pop_weight(1.0, ScoreMode::Normalized));
        let range = table.score_range;
        assert_eq!(range.min_score, 0.0);
        assert_eq!(range.max_score, 1.0);
        assert!((range.range - 1.000001).abs() < 1e-12);
        assert_eq!(table.get("region30").rank, 1);
        assert_eq!(table.get("region20").rank, 2);
        assert_eq!(table.get("region10").rank, 3);
        assert_eq!(table.get("region10").score, 0.0);
        assert!((table.get("region20").score - 0.5 / 1.000001).abs() < 1e-12);
        assert!(table.get("region30").score < 1.0);
    }

    #[test]
    fn identical_values_give_the_sentinel_range() {
        let ds = pop_dataset(&[("a", 5.0), ("b", 5.0)]);
        let table = rank(&ds, &pop_weight(1.0, ScoreMode::Value));
        assert_eq!(table.score_range.min_score, 5.0);
        assert_eq!(table.score_range.max_score, 5.0);
        assert_eq!(table.score_range.range, QUANTUM);
        assert!(table.score_range.is_flat());
        assert_eq!(table.get("a").score, 0.0);
        assert_eq!(table.get("b").score, 0.0);
    }

    #[test]
    fn neutral_weightings_keep_dataset_order() {
        let ds = pop_dataset(&[("c", 3.0), ("a", 1.0), ("b", 2.0)]);
        let table = rank(&ds, &Weightings::for_fields(["Pop"]));
        assert_eq!(table.score_range.range, QUANTUM);
        assert_eq!(table.get("c").rank, 1);
        assert_eq!(table.get("a").rank, 2);
        assert_eq!(table.get("b").rank, 3);
    }

    #[test]
    fn empty_dataset_gives_empty_table() {
        let ds = pop_dataset(&[]);
        let table = rank(&ds, &pop_weight(1.0, ScoreMode::Value));
        assert!(table.is_empty());
        assert_eq!(table.score_range, ScoreRange::EMPTY);
        assert_eq!(table.get("anything"), RankEntry::UNRANKED);
    }

    #[test]
    fn single_region() {
        let ds = pop_dataset(&[("only", 12.0)]);
        let table = rank(&ds, &pop_weight(3.0, ScoreMode::Value));
        assert_eq!(table.get("only"), RankEntry { score: 0.0, rank: 1 });
    }

    #[test]
    fn negative_weights_reverse_the_order() {
        let ds = pop_dataset(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        let table = rank(&ds, &pop_weight(-1.0, ScoreMode::Value));
        let order: Vec<&str> = table.by_rank().iter().map(|(c, _)| *c).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn ranks_are_a_permutation() {
        let values: Vec<(String, f64)> = (0..40)
            .map(|i| (format!("w{:02}", i), ((i * 17) % 11) as f64))
            .collect();
        let refs: Vec<(&str, f64)> = values.iter().map(|(c, v)| (c.as_str(), *v)).collect();
        let ds = pop_dataset(&refs);
        let table = rank(&ds, &pop_weight(1.0, ScoreMode::Rank));
        assert_eq!(table.len(), 40);
        let ranks: BTreeSet<u32> = table.rankings.values().map(|e| e.rank).collect();
        assert_eq!(ranks, (1..=40).collect::<BTreeSet<u32>>());
        for (_, e) in table.rankings.iter() {
            assert!(e.score >= 0.0 && e.score < 1.0);
        }
    }

    #[test]
    fn ranking_is_idempotent() {
        let ds = pop_dataset(&[("a", 4.0), ("b", 4.0), ("c", 1.0), ("d", 9.0)]);
        let w = pop_weight(0.7, ScoreMode::Normalized);
        let first = serde_json::to_string(&rank(&ds, &w)).unwrap();
        let second = serde_json::to_string(&rank(&ds, &w)).unwrap();
        assert_eq!(first, second);
    }
}
