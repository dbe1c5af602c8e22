//! Pure vote-aggregation logic shared by live tallies, frozen results and
//! the final report.

use indexmap::IndexMap;

use crate::{
    dao::models::{VoteEntity, VoteResponseEntity},
    dto::common::{PhotoTallySnapshot, TallyCounts},
};

/// Consensus share (percent) below which a photo is flagged as divergent.
pub const LOW_CONSENSUS_THRESHOLD: f32 = 70.0;

/// Bucket label used when a voter declared no value for a demographic field.
pub const UNDECLARED_BUCKET: &str = "nao_informado";

/// Aggregate the votes of one photo into a tally snapshot.
///
/// `generation` filters the live path: while a photo is on screen, only
/// votes matching the session's current generation count, hiding anything a
/// concurrent restart is about to delete. Finalized photos are tallied
/// unfiltered, since restart and reset delete the rows they invalidate.
/// The administrator's verdict is surfaced separately and never enters the
/// counters, the breakdowns or the consensus figure. `present_participants`
/// drives the derived `not_answered` counter and the `all_voted` flag.
pub fn compute_photo_tally(
    photo: u16,
    generation: Option<u32>,
    votes: &[VoteEntity],
    present_participants: usize,
) -> PhotoTallySnapshot {
    let mut counts = TallyCounts::default();
    let mut by_gender: IndexMap<String, TallyCounts> = IndexMap::new();
    let mut by_age_bracket: IndexMap<String, TallyCounts> = IndexMap::new();
    let mut by_region: IndexMap<String, TallyCounts> = IndexMap::new();
    let mut elapsed_total: u64 = 0;
    let mut admin_response = None;

    for vote in votes.iter().filter(|vote| {
        vote.photo == photo && generation.map_or(true, |current| vote.generation == current)
    }) {
        if vote.is_admin_vote {
            admin_response = Some(vote.response.into());
            continue;
        }

        record(&mut counts, vote.response);
        record(
            bucket(&mut by_gender, vote.demographics.gender.as_deref()),
            vote.response,
        );
        record(
            bucket(&mut by_age_bracket, vote.demographics.age_bracket.as_deref()),
            vote.response,
        );
        record(
            bucket(&mut by_region, vote.demographics.region.as_deref()),
            vote.response,
        );
        elapsed_total += u64::from(vote.elapsed_ms);
    }

    let recorded = counts.recorded();
    counts.not_answered = (present_participants as u32).saturating_sub(recorded);

    let average_elapsed_ms = if recorded > 0 {
        Some((elapsed_total / u64::from(recorded)) as u32)
    } else {
        None
    };
    let consensus_pct = consensus(&counts);

    PhotoTallySnapshot {
        photo,
        counts,
        by_gender,
        by_age_bracket,
        by_region,
        average_elapsed_ms,
        consensus_pct,
        low_consensus: recorded > 0 && consensus_pct < LOW_CONSENSUS_THRESHOLD,
        all_voted: present_participants > 0 && recorded as usize >= present_participants,
        admin_response,
    }
}

/// Share of the majority response over recorded votes, 0.0 when empty.
fn consensus(counts: &TallyCounts) -> f32 {
    let recorded = counts.recorded();
    if recorded == 0 {
        return 0.0;
    }
    counts.deferido.max(counts.indeferido) as f32 / recorded as f32 * 100.0
}

fn record(counts: &mut TallyCounts, response: VoteResponseEntity) {
    match response {
        VoteResponseEntity::Deferido => counts.deferido += 1,
        VoteResponseEntity::Indeferido => counts.indeferido += 1,
    }
}

fn bucket<'a>(
    map: &'a mut IndexMap<String, TallyCounts>,
    label: Option<&str>,
) -> &'a mut TallyCounts {
    let key = match label {
        Some(value) if !value.trim().is_empty() => value.to_string(),
        _ => UNDECLARED_BUCKET.to_string(),
    };
    map.entry(key).or_default()
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use uuid::Uuid;

    use super::*;
    use crate::dao::models::DemographicsEntity;

    fn vote(
        photo: u16,
        voter: &str,
        response: VoteResponseEntity,
        elapsed_ms: u32,
        generation: u32,
    ) -> VoteEntity {
        VoteEntity {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            photo,
            voter_id: voter.to_string(),
            response,
            elapsed_ms,
            demographics: DemographicsEntity::default(),
            is_admin_vote: false,
            generation,
            created_at: SystemTime::now(),
        }
    }

    #[test]
    fn empty_tally_has_zero_consensus_and_no_average() {
        let tally = compute_photo_tally(1, Some(0), &[], 5);
        assert_eq!(tally.counts.recorded(), 0);
        assert_eq!(tally.counts.not_answered, 5);
        assert_eq!(tally.consensus_pct, 0.0);
        assert!(!tally.low_consensus);
        assert!(!tally.all_voted);
        assert_eq!(tally.average_elapsed_ms, None);
    }

    #[test]
    fn majority_share_drives_consensus() {
        let votes = vec![
            vote(1, "a", VoteResponseEntity::Deferido, 1_000, 0),
            vote(1, "b", VoteResponseEntity::Deferido, 2_000, 0),
            vote(1, "c", VoteResponseEntity::Deferido, 3_000, 0),
            vote(1, "d", VoteResponseEntity::Indeferido, 4_000, 0),
        ];
        let tally = compute_photo_tally(1, Some(0), &votes, 4);
        assert_eq!(tally.counts.deferido, 3);
        assert_eq!(tally.counts.indeferido, 1);
        assert_eq!(tally.consensus_pct, 75.0);
        assert!(!tally.low_consensus);
        assert!(tally.all_voted);
        assert_eq!(tally.average_elapsed_ms, Some(2_500));
    }

    #[test]
    fn two_to_one_vote_lands_below_the_threshold() {
        let votes = vec![
            vote(1, "a", VoteResponseEntity::Deferido, 900, 0),
            vote(1, "b", VoteResponseEntity::Indeferido, 1_100, 0),
            vote(1, "c", VoteResponseEntity::Deferido, 1_000, 0),
        ];
        let tally = compute_photo_tally(1, Some(0), &votes, 3);
        assert_eq!(tally.counts.deferido, 2);
        assert_eq!(tally.counts.indeferido, 1);
        assert!((tally.consensus_pct - 200.0 / 3.0).abs() < 0.01);
        assert!(tally.low_consensus);
        assert_eq!(tally.average_elapsed_ms, Some(1_000));
    }

    #[test]
    fn split_vote_is_flagged_as_low_consensus() {
        let votes = vec![
            vote(1, "a", VoteResponseEntity::Deferido, 100, 0),
            vote(1, "b", VoteResponseEntity::Indeferido, 100, 0),
        ];
        let tally = compute_photo_tally(1, Some(0), &votes, 2);
        assert_eq!(tally.consensus_pct, 50.0);
        assert!(tally.low_consensus);
    }

    #[test]
    fn silent_participants_never_dilute_consensus() {
        // 7 of 10 present voted the same way; consensus is 100%, not 70%.
        let votes: Vec<_> = (0..7)
            .map(|i| {
                vote(
                    1,
                    &format!("p{i}"),
                    VoteResponseEntity::Deferido,
                    500,
                    0,
                )
            })
            .collect();
        let tally = compute_photo_tally(1, Some(0), &votes, 10);
        assert_eq!(tally.consensus_pct, 100.0);
        assert_eq!(tally.counts.not_answered, 3);
        assert!(!tally.all_voted);
    }

    #[test]
    fn votes_from_other_photos_and_generations_are_ignored() {
        let votes = vec![
            vote(1, "a", VoteResponseEntity::Deferido, 100, 1),
            vote(2, "a", VoteResponseEntity::Indeferido, 100, 1),
            vote(1, "b", VoteResponseEntity::Indeferido, 100, 0), // pre-restart
        ];
        let tally = compute_photo_tally(1, Some(1), &votes, 1);
        assert_eq!(tally.counts.deferido, 1);
        assert_eq!(tally.counts.indeferido, 0);
    }

    #[test]
    fn unfiltered_tally_counts_votes_across_generations() {
        // A finalized photo keeps its votes regardless of how often later
        // photos were restarted.
        let votes = vec![
            vote(1, "a", VoteResponseEntity::Deferido, 100, 0),
            vote(1, "b", VoteResponseEntity::Indeferido, 100, 2),
        ];
        let tally = compute_photo_tally(1, None, &votes, 2);
        assert_eq!(tally.counts.recorded(), 2);
    }

    #[test]
    fn admin_vote_is_surfaced_but_not_counted() {
        let mut admin = vote(1, "admin", VoteResponseEntity::Indeferido, 0, 0);
        admin.is_admin_vote = true;
        let votes = vec![
            vote(1, "a", VoteResponseEntity::Deferido, 100, 0),
            admin,
        ];
        let tally = compute_photo_tally(1, Some(0), &votes, 1);
        assert_eq!(tally.counts.recorded(), 1);
        assert_eq!(tally.consensus_pct, 100.0);
        assert_eq!(
            tally.admin_response,
            Some(crate::dto::common::VoteValue::Indeferido)
        );
        assert!(tally.all_voted);
    }

    #[test]
    fn missing_demographics_fall_into_the_undeclared_bucket() {
        let mut declared = vote(1, "a", VoteResponseEntity::Deferido, 100, 0);
        declared.demographics = DemographicsEntity {
            gender: Some("feminino".into()),
            age_bracket: Some("25-34".into()),
            region: Some("BA".into()),
        };
        let votes = vec![
            declared,
            vote(1, "b", VoteResponseEntity::Indeferido, 100, 0),
        ];
        let tally = compute_photo_tally(1, Some(0), &votes, 2);
        assert_eq!(tally.by_gender.get("feminino").unwrap().deferido, 1);
        assert_eq!(
            tally.by_gender.get(UNDECLARED_BUCKET).unwrap().indeferido,
            1
        );
        assert_eq!(tally.by_region.get("BA").unwrap().deferido, 1);
        assert_eq!(tally.by_age_bracket.len(), 2);
    }
}
