use std::collections::BTreeSet;

/// Criteria slots available on the template per assessment phase.
pub const INITIAL_MAX_CRITERIA: usize = 3;
pub const RESUBMISSION_MAX_CRITERIA: usize = 5;

/// The fixed placeholder catalog. Each token corresponds to the marksheet
/// column of the same name minus the brackets; templates may use any spelling
/// variant from `placeholder_variants`.
pub const DECLARED_PLACEHOLDERS: [&str; 34] = [
    "[Programme Title]",
    "[Learner Registration Number]",
    "[Learner Name]",
    "[Assignment Title]",
    "[Assessor Name]",
    "[Unit/Component Number and Title]",
    "[Targeted Learning Aims/Assessment Criteria (Initial)]",
    "[First Submission - Deadline]",
    "[First Submission - Date Submitted]",
    "[Extension Approved (Y/N)]",
    "[Initial - General Comments]",
    "[Initial - Learner Signature (Name or File Path)]",
    "[Initial - Learner Declaration Date]",
    "[Initial - Assessor Signature (Name or File Path)]",
    "[Initial - Assessor Declaration Date]",
    "[Initial - Date of Feedback to Learner]",
    "[Resubmission - Authorised by Lead Internal Verifier (Name)]",
    "[Resubmission - Authorisation Date]",
    "[Resubmission - Deadline]",
    "[Resubmission - Date Submitted]",
    "[Resubmission - General Comments]",
    "[Resubmission - Learner Signature (Name or File Path)]",
    "[Resubmission - Learner Declaration Date]",
    "[Resubmission - Assessor Signature (Name or File Path)]",
    "[Resubmission - Assessor Declaration Date]",
    "[Resubmission - Date of Feedback to Learner]",
    "[Retake - Deadline]",
    "[Retake - Date Submitted]",
    "[Retake - General Comments]",
    "[Retake - Learner Signature (Name or File Path)]",
    "[Retake - Learner Declaration Date]",
    "[Retake - Assessor Signature (Name or File Path)]",
    "[Retake - Assessor Declaration Date]",
    "[Retake - Date of Feedback to Learner]",
];

/// Alternate literal spellings a template may use for one declared token:
/// the token itself, a bracket-completed form if the closing bracket is
/// missing, and dash-normalized forms (en dash and hyphen swapped both ways,
/// but only when the source character is actually present).
pub fn placeholder_variants(placeholder: &str) -> BTreeSet<String> {
    let mut variants = BTreeSet::new();
    variants.insert(placeholder.to_string());

    if placeholder.starts_with('[') && !placeholder.ends_with(']') {
        variants.insert(format!("{placeholder}]"));
    }

    if placeholder.contains('\u{2013}') {
        variants.insert(placeholder.replace('\u{2013}', "-"));
    }
    if placeholder.contains('-') {
        variants.insert(placeholder.replace('-', "\u{2013}"));
    }

    variants
}

/// Row-lookup key for a declared token: the label between the brackets.
pub fn column_for_placeholder(placeholder: &str) -> &str {
    placeholder
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
}

#[cfg(test)]
mod tests {
    use super::{column_for_placeholder, placeholder_variants, DECLARED_PLACEHOLDERS};

    #[test]
    fn hyphen_token_gains_en_dash_variant() {
        let variants = placeholder_variants("[Foo-Bar]");
        assert!(variants.contains("[Foo-Bar]"));
        assert!(variants.contains("[Foo\u{2013}Bar]"));
        assert_eq!(variants.len(), 2);
    }

    #[test]
    fn en_dash_token_gains_hyphen_variant() {
        let variants = placeholder_variants("[Foo \u{2013} Bar]");
        assert!(variants.contains("[Foo - Bar]"));
        assert!(variants.contains("[Foo \u{2013} Bar]"));
    }

    #[test]
    fn dashless_token_has_only_itself() {
        let variants = placeholder_variants("[Foo]");
        assert_eq!(variants.len(), 1);
        assert!(variants.contains("[Foo]"));
    }

    #[test]
    fn missing_closing_bracket_is_completed() {
        let variants = placeholder_variants("[Foo");
        assert!(variants.contains("[Foo"));
        assert!(variants.contains("[Foo]"));
    }

    #[test]
    fn column_strips_brackets_only() {
        assert_eq!(column_for_placeholder("[Learner Name]"), "Learner Name");
        assert_eq!(
            column_for_placeholder("[Extension Approved (Y/N)]"),
            "Extension Approved (Y/N)"
        );
    }

    #[test]
    fn every_declared_placeholder_is_bracketed() {
        for placeholder in DECLARED_PLACEHOLDERS {
            assert!(placeholder.starts_with('['), "{placeholder}");
            assert!(placeholder.ends_with(']'), "{placeholder}");
            assert!(!placeholder_variants(placeholder).is_empty());
        }
    }
}
