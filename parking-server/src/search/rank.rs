//! Recommendation ranking.
//!
//! Longer permitted stays rank first; distance breaks ties.

use std::cmp::Ordering;

use super::engine::EnrichedSpot;

/// Restriction codes, most preferred first. Codes not listed rank after
/// all of these.
pub const RANK_ORDER: [&str; 11] = [
    "4P", "MP4P", "2P", "MP2P", "MP3P", "1P", "MP1P", "LZ30", "QP", "SP", "PP",
];

/// Position of a code in `RANK_ORDER`; unknown codes share the last rank.
pub fn restriction_rank(code: &str) -> usize {
    RANK_ORDER
        .iter()
        .position(|c| *c == code)
        .unwrap_or(RANK_ORDER.len())
}

/// Sort by restriction rank, then by ascending distance.
///
/// The sort is stable, so spots equal on both keys keep their order.
pub fn rank_spots(spots: &mut [EnrichedSpot]) {
    spots.sort_by(|a, b| compare(a, b));
}

fn compare(a: &EnrichedSpot, b: &EnrichedSpot) -> Ordering {
    restriction_rank(&a.restriction_display)
        .cmp(&restriction_rank(&b.restriction_display))
        .then_with(|| a.distance_km.total_cmp(&b.distance_km))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::SpotStatus;
    use crate::domain::fixtures::spot;
    use proptest::prelude::*;

    fn enriched() -> impl Strategy<Value = EnrichedSpot> {
        let code = prop_oneof![
            prop::sample::select(RANK_ORDER.to_vec()).prop_map(str::to_string),
            Just("Unknown".to_string()),
            "[A-Z]{1,4}",
        ];
        (code, 0.0f64..5.0).prop_map(|(code, distance_km)| EnrichedSpot {
            spot: spot("s", -37.8, 144.9, SpotStatus::Available, None),
            restriction_display: code,
            restriction_days: "Daily".to_string(),
            time_restriction_start: String::new(),
            time_restriction_finish: String::new(),
            distance_km,
        })
    }

    proptest! {
        #[test]
        fn output_is_ordered_by_rank_then_distance(
            mut spots in prop::collection::vec(enriched(), 0..30)
        ) {
            rank_spots(&mut spots);
            for pair in spots.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                let (ra, rb) = (
                    restriction_rank(&a.restriction_display),
                    restriction_rank(&b.restriction_display),
                );
                prop_assert!(ra <= rb);
                if ra == rb {
                    prop_assert!(a.distance_km <= b.distance_km);
                }
            }
        }

        #[test]
        fn ranking_is_a_permutation(spots in prop::collection::vec(enriched(), 0..30)) {
            let mut ranked = spots.clone();
            rank_spots(&mut ranked);

            let mut before: Vec<(String, u64)> = spots
                .iter()
                .map(|s| (s.restriction_display.clone(), s.distance_km.to_bits()))
                .collect();
            let mut after: Vec<(String, u64)> = ranked
                .iter()
                .map(|s| (s.restriction_display.clone(), s.distance_km.to_bits()))
                .collect();
            before.sort();
            after.sort();
            prop_assert_eq!(before, after);
        }
    }
}
