/// Canonical tokenization for criteria fields: split on commas, trim each
/// piece, drop empties. There is no quoting; embedded commas separate.
pub fn split_criteria(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

/// Turns targeted/achieved criteria fields into an ordered criteria list and
/// a parallel Y/N achievement vector, both exactly `max_criteria` long.
///
/// Achievement is "Y" iff the targeted entry appears verbatim anywhere in the
/// achieved list. The vector is computed over the full targeted list first;
/// padding and truncation are positional afterwards, so both outputs stay
/// aligned by index.
pub fn process_criteria(
    targeted: &str,
    achieved: &str,
    max_criteria: usize,
) -> (Vec<String>, Vec<String>) {
    let mut targeted_list = split_criteria(targeted);
    let achieved_list = split_criteria(achieved);

    let mut achieved_yn: Vec<String> = targeted_list
        .iter()
        .map(|t| {
            if achieved_list.iter().any(|a| a == t) {
                "Y".to_string()
            } else {
                "N".to_string()
            }
        })
        .collect();

    targeted_list.resize(max_criteria, String::new());
    achieved_yn.resize(max_criteria, String::new());
    (targeted_list, achieved_yn)
}

#[cfg(test)]
mod tests {
    use super::process_criteria;

    #[test]
    fn marks_achieved_criteria() {
        let (targets, achieved) = process_criteria("A, B, C", "B", 3);
        assert_eq!(targets, vec!["A", "B", "C"]);
        assert_eq!(achieved, vec!["N", "Y", "N"]);
    }

    #[test]
    fn empty_input_pads_with_empties() {
        let (targets, achieved) = process_criteria("", "", 3);
        assert_eq!(targets, vec!["", "", ""]);
        assert_eq!(achieved, vec!["", "", ""]);
    }

    #[test]
    fn truncates_after_computing_achievement() {
        // D is achieved but falls outside the limit; its Y is computed and
        // then dropped positionally along with D itself.
        let (targets, achieved) = process_criteria("A,B,C,D", "A,D", 3);
        assert_eq!(targets, vec!["A", "B", "C"]);
        assert_eq!(achieved, vec!["Y", "N", "N"]);
    }

    #[test]
    fn outputs_are_always_max_criteria_long() {
        for (targeted, achieved_raw) in [("", ""), ("A", "A"), ("A,B,C,D,E,F", "B,F"), (" , ,", "")]
        {
            let (targets, achieved) = process_criteria(targeted, achieved_raw, 5);
            assert_eq!(targets.len(), 5);
            assert_eq!(achieved.len(), 5);
        }
    }

    #[test]
    fn matches_are_exact_not_substring() {
        let (_, achieved) = process_criteria("P1", "P10, P11", 3);
        assert_eq!(achieved, vec!["N", "", ""]);
    }

    #[test]
    fn whitespace_around_pieces_is_ignored() {
        let (targets, achieved) = process_criteria("  M1 ,  D2 ", "D2", 3);
        assert_eq!(targets, vec!["M1", "D2", ""]);
        assert_eq!(achieved, vec!["N", "Y", ""]);
    }
}
