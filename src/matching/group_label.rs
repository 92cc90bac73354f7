// src/matching/group_label.rs

/// Marker left on a group label by the earlier grouping pass once a lease has
/// already been downweighted.
pub const DOWNWEIGHTED_GROUP: &str = "C";

/// Trims surrounding whitespace, then strips trailing ASCII digits.
/// `" C12 "` becomes `"C"`, `"A2B3"` becomes `"A2B"`.
pub fn normalize_group_label(label: &str) -> String {
    label
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_digit())
        .to_string()
}

/// True when the label normalizes to the downweighted group. Case-sensitive.
pub fn is_downweighted(label: &str) -> bool {
    normalize_group_label(label) == DOWNWEIGHTED_GROUP
}
