use std::collections::BTreeSet;

use log::debug;

use crate::config::*;

/// True for the synthesized fields added by a previous normalization pass.
pub fn is_derived_field(name: &str) -> bool {
    name.ends_with(NORMALIZED_SUFFIX) || name.ends_with(RANK_SUFFIX)
}

/// Finds the comparison fields: the fields that can be weighted.
///
/// All the records share the same field names, so one representative record is
/// enough. Excluded (identifier, name, administrative) fields and derived fields are
/// left out. An absent sample (empty dataset) yields no field.
pub fn classify<E: AsRef<str>>(sample: Option<&RegionRecord>, excluded: &[E]) -> BTreeSet<String> {
    let sample = match sample {
        Some(s) => s,
        None => return BTreeSet::new(),
    };
    let fields: BTreeSet<String> = sample
        .field_names()
        .filter(|name| !excluded.iter().any(|e| e.as_ref() == *name))
        .filter(|name| !is_derived_field(name))
        .map(|name| name.to_string())
        .collect();
    debug!("classify: comparison fields: {:?}", fields);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> RegionRecord {
        fields
            .iter()
            .map(|f| (f.to_string(), FieldValue::Number(1.0)))
            .collect()
    }

    #[test]
    fn exclusions_and_derived_fields_are_dropped() {
        let r = record(&[
            "Ward Code",
            "Ward Name",
            "Pop",
            "Pop_NORMALIZED",
            "Pop_RANK",
            "Income",
        ]);
        let fields = classify(Some(&r), &DEFAULT_EXCLUDED_FIELDS);
        let expected: Vec<&str> = vec!["Income", "Pop"];
        assert_eq!(fields.iter().map(|s| s.as_str()).collect::<Vec<_>>(), expected);
    }

    #[test]
    fn custom_exclusions() {
        let r = record(&["Code", "Pop", "Income"]);
        let excluded = vec!["Code".to_string(), "Income".to_string()];
        let fields = classify(Some(&r), &excluded);
        assert_eq!(fields.len(), 1);
        assert!(fields.contains("Pop"));
    }

    #[test]
    fn no_sample_no_fields() {
        let excluded: [&str; 0] = [];
        assert!(classify(None, &excluded).is_empty());
    }
}
