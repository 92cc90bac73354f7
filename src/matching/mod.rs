pub mod fuzzy;
pub mod group_label;
