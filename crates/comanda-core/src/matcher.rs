//! Nearest-embedding identification.
//!
//! Compares a probe embedding against every enrolled chef and accepts the
//! closest one only when it is strictly inside the match threshold.

use crate::types::Embedding;

/// Maximum Euclidean distance for a positive identification. Empirically
/// chosen by the face-recognition model's authors, not derived here.
pub const MATCH_THRESHOLD: f64 = 0.6;

/// An enrolled chef as fetched from the identity store.
#[derive(Debug, Clone)]
pub struct EnrolledChef {
    pub collaborator_id: i32,
    pub display_name: String,
    pub is_admin: bool,
    pub embedding: Embedding,
}

/// A positive identification.
#[derive(Debug, Clone, PartialEq)]
pub struct ChefMatch {
    pub collaborator_id: i32,
    pub display_name: String,
    pub is_admin: bool,
    pub distance: f64,
}

/// Strategy for identifying a probe embedding against the enrolled roster.
pub trait Matcher {
    fn identify(
        &self,
        probe: &Embedding,
        roster: &[EnrolledChef],
        threshold: f64,
    ) -> Option<ChefMatch>;
}

/// Exhaustive nearest-neighbor matcher over Euclidean distance.
///
/// Scans the full roster on every probe — fine at single-kitchen scale, no
/// index structures needed. Distance ties go to the lowest collaborator id
/// so repeated probes are deterministic.
pub struct NearestMatcher;

impl Matcher for NearestMatcher {
    fn identify(
        &self,
        probe: &Embedding,
        roster: &[EnrolledChef],
        threshold: f64,
    ) -> Option<ChefMatch> {
        let mut best: Option<(f64, &EnrolledChef)> = None;

        for chef in roster {
            let distance = probe.distance(&chef.embedding);
            let better = match best {
                None => true,
                Some((best_distance, best_chef)) => {
                    distance < best_distance
                        || (distance == best_distance
                            && chef.collaborator_id < best_chef.collaborator_id)
                }
            };
            if better {
                best = Some((distance, chef));
            }
        }

        match best {
            // Strictly below the threshold; a distance of exactly 0.6 is a reject.
            Some((distance, chef)) if distance < threshold => Some(ChefMatch {
                collaborator_id: chef.collaborator_id,
                display_name: chef.display_name.clone(),
                is_admin: chef.is_admin,
                distance,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EMBEDDING_DIM;

    fn embedding(head: &[f64]) -> Embedding {
        let mut values = head.to_vec();
        values.resize(EMBEDDING_DIM, 0.0);
        Embedding { values }
    }

    fn chef(id: i32, name: &str, admin: bool, head: &[f64]) -> EnrolledChef {
        EnrolledChef {
            collaborator_id: id,
            display_name: name.to_string(),
            is_admin: admin,
            embedding: embedding(head),
        }
    }

    #[test]
    fn test_empty_roster_is_no_match() {
        let probe = embedding(&[0.1, 0.2]);
        assert!(NearestMatcher.identify(&probe, &[], MATCH_THRESHOLD).is_none());
    }

    #[test]
    fn test_nearest_candidate_wins() {
        let probe = embedding(&[]);
        let roster = vec![
            chef(1, "ana", false, &[0.9]),
            chef(2, "benito", true, &[0.3]),
            chef(3, "carla", false, &[0.55]),
        ];
        let found = NearestMatcher.identify(&probe, &roster, MATCH_THRESHOLD).unwrap();
        assert_eq!(found.collaborator_id, 2);
        assert_eq!(found.display_name, "benito");
        assert!(found.is_admin);
        assert!((found.distance - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_is_strict() {
        // Best distance exactly 0.6 must be rejected, not accepted.
        let probe = embedding(&[]);
        let roster = vec![chef(1, "ana", false, &[0.6])];
        assert!(NearestMatcher.identify(&probe, &roster, MATCH_THRESHOLD).is_none());
    }

    #[test]
    fn test_just_inside_threshold_is_accepted() {
        let probe = embedding(&[]);
        let roster = vec![chef(1, "ana", false, &[0.599])];
        let found = NearestMatcher.identify(&probe, &roster, MATCH_THRESHOLD).unwrap();
        assert_eq!(found.collaborator_id, 1);
    }

    #[test]
    fn test_all_candidates_too_far() {
        let probe = embedding(&[]);
        let roster = vec![chef(1, "ana", false, &[0.8]), chef(2, "benito", false, &[1.4])];
        assert!(NearestMatcher.identify(&probe, &roster, MATCH_THRESHOLD).is_none());
    }

    #[test]
    fn test_distance_tie_breaks_on_lowest_id() {
        let probe = embedding(&[]);
        let roster = vec![
            chef(7, "gema", false, &[0.2]),
            chef(3, "dario", false, &[0.2]),
            chef(9, "hugo", false, &[0.2]),
        ];
        let found = NearestMatcher.identify(&probe, &roster, MATCH_THRESHOLD).unwrap();
        assert_eq!(found.collaborator_id, 3);
    }

    #[test]
    fn test_exact_duplicate_embedding_matches_at_zero() {
        let probe = embedding(&[0.11, -0.4, 0.25]);
        let roster = vec![chef(5, "elia", true, &[0.11, -0.4, 0.25])];
        let found = NearestMatcher.identify(&probe, &roster, MATCH_THRESHOLD).unwrap();
        assert_eq!(found.collaborator_id, 5);
        assert_eq!(found.distance, 0.0);
    }
}
