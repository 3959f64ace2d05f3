use std::collections::BTreeMap;

use crate::catalog::{
    column_for_placeholder, placeholder_variants, DECLARED_PLACEHOLDERS, INITIAL_MAX_CRITERIA,
    RESUBMISSION_MAX_CRITERIA,
};
use crate::criteria::process_criteria;
use crate::table::Row;

/// Placeholder-text to replacement-text for one row. Values are final; a
/// bracketed value is never expanded again.
pub type ReplacementMap = BTreeMap<String, String>;

const INITIAL_TARGETED_COLUMN: &str = "Initial - Targeted Criteria";
const INITIAL_ACHIEVED_COLUMN: &str = "Initial - Criteria Achieved";
const RESUBMISSION_TARGETED_COLUMN: &str = "Resubmission - Targeted Criteria";
const RESUBMISSION_ACHIEVED_COLUMN: &str = "Resubmission - Criteria Achieved";

/// Builds the full replacement map for one row: synthesized criteria tokens
/// first, then every declared token (with all spelling variants) mapped to
/// the trimmed row value. The criteria and declared namespaces are disjoint,
/// so insertion order never decides a key's value.
pub fn build_replacement_map(row: &Row) -> ReplacementMap {
    let mut map = ReplacementMap::new();

    insert_criteria_tokens(
        &mut map,
        row,
        INITIAL_TARGETED_COLUMN,
        INITIAL_ACHIEVED_COLUMN,
        "ITC",
        "ICA",
        INITIAL_MAX_CRITERIA,
    );
    insert_criteria_tokens(
        &mut map,
        row,
        RESUBMISSION_TARGETED_COLUMN,
        RESUBMISSION_ACHIEVED_COLUMN,
        "RTC",
        "RCA",
        RESUBMISSION_MAX_CRITERIA,
    );

    for placeholder in DECLARED_PLACEHOLDERS {
        let value = row.field(column_for_placeholder(placeholder)).trim();
        for variant in placeholder_variants(placeholder) {
            map.insert(variant, value.to_string());
        }
    }

    map
}

fn insert_criteria_tokens(
    map: &mut ReplacementMap,
    row: &Row,
    targeted_column: &str,
    achieved_column: &str,
    targeted_prefix: &str,
    achieved_prefix: &str,
    max_criteria: usize,
) {
    let (targets, achieved) = process_criteria(
        row.field(targeted_column).trim(),
        row.field(achieved_column).trim(),
        max_criteria,
    );
    for (i, (target, mark)) in targets.into_iter().zip(achieved).enumerate() {
        map.insert(format!("[{targeted_prefix}{}]", i + 1), target);
        map.insert(format!("[{achieved_prefix}{}]", i + 1), mark);
    }
}

#[cfg(test)]
mod tests {
    use crate::table::Row;

    use super::build_replacement_map;

    fn sample_row() -> Row {
        Row::from_pairs([
            ("Learner Name", "Jane Doe"),
            ("Learner Registration Number", "R123"),
            ("Initial - Targeted Criteria", "P1, M1, D1"),
            ("Initial - Criteria Achieved", "P1, D1"),
            ("Resubmission - Targeted Criteria", "M1"),
            ("Resubmission - Criteria Achieved", ""),
            ("First Submission - Deadline", " 2025-06-01 "),
        ])
    }

    #[test]
    fn criteria_tokens_are_indexed_and_padded() {
        let map = build_replacement_map(&sample_row());
        assert_eq!(map["[ITC1]"], "P1");
        assert_eq!(map["[ITC2]"], "M1");
        assert_eq!(map["[ITC3]"], "D1");
        assert_eq!(map["[ICA1]"], "Y");
        assert_eq!(map["[ICA2]"], "N");
        assert_eq!(map["[ICA3]"], "Y");

        assert_eq!(map["[RTC1]"], "M1");
        assert_eq!(map["[RCA1]"], "N");
        for i in 2..=5 {
            assert_eq!(map[&format!("[RTC{i}]")], "");
            assert_eq!(map[&format!("[RCA{i}]")], "");
        }
    }

    #[test]
    fn declared_values_are_trimmed_and_variant_consistent() {
        let map = build_replacement_map(&sample_row());
        assert_eq!(map["[First Submission - Deadline]"], "2025-06-01");
        // The en-dash spelling resolves to the identical replacement.
        assert_eq!(map["[First Submission \u{2013} Deadline]"], "2025-06-01");
    }

    #[test]
    fn missing_declared_column_maps_to_empty() {
        let map = build_replacement_map(&sample_row());
        assert_eq!(map["[Programme Title]"], "");
        assert_eq!(map["[Retake - Deadline]"], "");
    }

    #[test]
    fn undeclared_columns_never_enter_the_map() {
        let row = Row::from_pairs([("Secret Column", "x")]);
        let map = build_replacement_map(&row);
        assert!(!map.contains_key("[Secret Column]"));
    }

    #[test]
    fn no_key_is_empty_and_all_keys_are_literals() {
        let map = build_replacement_map(&sample_row());
        assert!(map.keys().all(|k| !k.is_empty()));
        assert!(map.keys().all(|k| k.starts_with('[')));
    }
}
