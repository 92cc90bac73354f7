// src/scoring/pair.rs - Per-pair distance aggregation and override masking

use super::columns::PairInput;
use super::ScoringOptions;
use crate::errors::ScoringError;
use crate::matching::fuzzy::partial_ratio;
use crate::matching::group_label::{is_downweighted, normalize_group_label};

/// Which rule, if any, replaced the computed distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceOverride {
    None,
    /// One side was already downweighted in the grouping pass.
    Downweighted,
    /// Both sides are the same record.
    SelfPair,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairScore {
    pub grantor_score_dist: f64,
    pub grantee_score_dist: f64,
    pub dist_raw: f64,
    pub dist: f64,
    pub group_final_c_x: String,
    pub group_final_c_y: String,
    pub applied_override: DistanceOverride,
}

/// `weight * (1 - ratio / 100)`. A missing operand counts as no similarity.
pub fn weighted_text_distance(
    a: Option<&str>,
    b: Option<&str>,
    weight: f64,
    options: &ScoringOptions,
) -> f64 {
    let ratio = match (a, b) {
        (Some(a), Some(b)) => partial_ratio(a, b, options.text_processing),
        _ => 0,
    };
    weight * (1.0 - f64::from(ratio) / 100.0)
}

/// Scores a single pair. `sentinel` is the distance forced onto pairs that
/// touch an already-downweighted group.
pub fn score_pair(
    pair: &PairInput<'_>,
    sentinel: f64,
    options: &ScoringOptions,
) -> Result<PairScore, ScoringError> {
    let grantor_score_dist =
        weighted_text_distance(pair.grantor_x, pair.grantor_y, pair.grantor_weight, options);
    let grantee_score_dist =
        weighted_text_distance(pair.grantee_x, pair.grantee_y, pair.grantee_weight, options);

    let dist_raw = pair.distances.iter().sum::<f64>() + grantor_score_dist + grantee_score_dist;
    if dist_raw < 0.0 {
        return Err(ScoringError::NegativeDistance {
            row: pair.row,
            value: dist_raw,
        });
    }
    // `sqrt(-0.0)` is `-0.0`; keep the output sign clean.
    let computed = if dist_raw == 0.0 { 0.0 } else { dist_raw.sqrt() };

    let group_final_c_x = normalize_group_label(pair.group_final_x);
    let group_final_c_y = normalize_group_label(pair.group_final_y);

    let downweighted = is_downweighted(pair.group_final_x) || is_downweighted(pair.group_final_y);
    let self_pair = matches!(
        (pair.unique_id_x, pair.unique_id_y),
        (Some(x), Some(y)) if x == y
    );
    let (dist, applied_override) = apply_overrides(computed, downweighted, self_pair, sentinel);

    Ok(PairScore {
        grantor_score_dist,
        grantee_score_dist,
        dist_raw,
        dist,
        group_final_c_x,
        group_final_c_y,
        applied_override,
    })
}

/// Group "C" on either side forces the sentinel; a self-pair is checked last
/// and always ends at zero.
pub fn apply_overrides(
    computed: f64,
    downweighted: bool,
    self_pair: bool,
    sentinel: f64,
) -> (f64, DistanceOverride) {
    let mut dist = computed;
    let mut applied = DistanceOverride::None;

    if downweighted {
        dist = sentinel;
        applied = DistanceOverride::Downweighted;
    }

    if self_pair {
        dist = 0.0;
        applied = DistanceOverride::SelfPair;
    }

    (dist, applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair<'a>() -> PairInput<'a> {
        PairInput {
            row: 0,
            unique_id_x: Some("5"),
            unique_id_y: Some("9"),
            group_final_x: "A1",
            group_final_y: "B2",
            grantor_x: Some("Acme Oil"),
            grantor_y: Some("Acme Oil"),
            grantee_x: Some("Smith John"),
            grantee_y: Some("Smith John"),
            grantor_weight: 2.0,
            grantee_weight: 3.0,
            distances: [0.0; 6],
        }
    }

    fn options() -> ScoringOptions {
        ScoringOptions::default()
    }

    #[test]
    fn test_contained_grantor_has_zero_distance() {
        let mut p = pair();
        p.grantor_y = Some("Acme Oil Co");
        let score = score_pair(&p, 99999.0, &options()).unwrap();
        assert_eq!(score.grantor_score_dist, 0.0);
    }

    #[test]
    fn test_eight_components_are_summed() {
        let mut p = pair();
        p.distances = [1.0; 6];
        let score = score_pair(&p, 99999.0, &options()).unwrap();
        assert_eq!(score.grantor_score_dist, 0.0);
        assert_eq!(score.grantee_score_dist, 0.0);
        assert_eq!(score.dist_raw, 6.0);
        assert!((score.dist - 6.0_f64.sqrt()).abs() < 1e-12);
        assert!((score.dist - 2.449).abs() < 1e-3);
        assert_eq!(score.applied_override, DistanceOverride::None);
    }

    #[test]
    fn test_text_distances_are_weighted() {
        let mut p = pair();
        p.grantor_x = Some("abc");
        p.grantor_y = Some("xyz");
        p.grantee_x = Some("kitten");
        p.grantee_y = Some("sitting");
        let score = score_pair(&p, 99999.0, &options()).unwrap();
        assert_eq!(score.grantor_score_dist, 2.0);
        // partial ratio 67
        assert!((score.grantee_score_dist - 3.0 * 0.33).abs() < 1e-12);
        assert!((score.dist_raw - (2.0 + 0.99)).abs() < 1e-12);
    }

    #[test]
    fn test_missing_and_empty_text() {
        let o = options();
        assert_eq!(weighted_text_distance(None, None, 2.0, &o), 2.0);
        assert_eq!(weighted_text_distance(Some("Acme"), None, 2.0, &o), 2.0);
        assert_eq!(weighted_text_distance(Some(""), Some(""), 2.0, &o), 0.0);
        assert_eq!(weighted_text_distance(Some(""), Some("Acme"), 2.0, &o), 2.0);
    }

    #[test]
    fn test_group_c_forces_sentinel_from_either_side() {
        let mut p = pair();
        p.group_final_x = "C1";
        p.group_final_y = "A2";
        let score = score_pair(&p, 99999.0, &options()).unwrap();
        assert_eq!(score.dist, 99999.0);
        assert_eq!(score.group_final_c_x, "C");
        assert_eq!(score.group_final_c_y, "A");
        assert_eq!(score.applied_override, DistanceOverride::Downweighted);

        let mut p = pair();
        p.group_final_y = " C ";
        let score = score_pair(&p, 42.0, &options()).unwrap();
        assert_eq!(score.dist, 42.0);
    }

    #[test]
    fn test_self_pair_wins_over_group_c() {
        let mut p = pair();
        p.unique_id_x = Some("7");
        p.unique_id_y = Some("7");
        p.group_final_x = "C";
        p.distances = [4.0; 6];
        let score = score_pair(&p, 99999.0, &options()).unwrap();
        assert_eq!(score.dist, 0.0);
        assert!(score.dist.is_sign_positive());
        assert_eq!(score.dist_raw, 24.0);
        assert_eq!(score.applied_override, DistanceOverride::SelfPair);
    }

    #[test]
    fn test_missing_identifiers_are_never_a_self_pair() {
        let mut p = pair();
        p.unique_id_x = None;
        p.unique_id_y = None;
        p.distances = [1.0; 6];
        let score = score_pair(&p, 99999.0, &options()).unwrap();
        assert_eq!(score.applied_override, DistanceOverride::None);
        assert_eq!(score.dist_raw, 6.0);

        p.unique_id_y = Some("5");
        p.group_final_x = "C";
        let score = score_pair(&p, 99999.0, &options()).unwrap();
        assert_eq!(score.dist, 99999.0);
        assert_eq!(score.applied_override, DistanceOverride::Downweighted);
    }

    #[test]
    fn test_apply_overrides_order() {
        assert_eq!(apply_overrides(3.0, false, false, 50.0), (3.0, DistanceOverride::None));
        assert_eq!(apply_overrides(3.0, true, false, 50.0), (50.0, DistanceOverride::Downweighted));
        assert_eq!(apply_overrides(3.0, true, true, 50.0), (0.0, DistanceOverride::SelfPair));
        assert_eq!(apply_overrides(f64::NAN, false, true, 50.0), (0.0, DistanceOverride::SelfPair));
    }

    #[test]
    fn test_negative_sum_is_rejected() {
        let mut p = pair();
        p.row = 3;
        p.distances = [0.0, -1.0, 0.0, 0.0, 0.0, 0.0];
        let err = score_pair(&p, 99999.0, &options()).unwrap_err();
        assert_eq!(err, ScoringError::NegativeDistance { row: 3, value: -1.0 });
    }

    #[test]
    fn test_nan_component_propagates_but_overrides_still_apply() {
        let mut p = pair();
        p.distances[2] = f64::NAN;
        let score = score_pair(&p, 99999.0, &options()).unwrap();
        assert!(score.dist_raw.is_nan());
        assert!(score.dist.is_nan());

        p.group_final_x = "C";
        let score = score_pair(&p, 99999.0, &options()).unwrap();
        assert_eq!(score.dist, 99999.0);
    }
}
