
use itertools::Itertools;
use log::trace;

use crate::mutation::ScoredMutation;

/// Picks the batch of mutations to apply this round.
/// Early rounds keep many well-separated mutations, later rounds fall back to only the best one so the search can settle.
/// # Arguments
/// * `candidates` - every mutation that improved the total score
/// * `min_dist` - minimum distance between the positions of two kept mutations
/// * `round_index` - the current refinement round, 0-based
/// * `max_multi_iters` - rounds at or after this index only keep the single best candidate
/// # Returns
/// The kept mutations ordered from best to worst score.
/// Equal scores favor the candidate that was enumerated later.
pub fn choose_candidates(candidates: &[ScoredMutation], min_dist: usize, round_index: usize, max_multi_iters: usize) -> Vec<ScoredMutation> {
    // stable sort, so reversing it puts later-enumerated ties first
    let mut ordered: Vec<ScoredMutation> = candidates.iter()
        .copied()
        .sorted_by(|a, b| a.score().total_cmp(&b.score()))
        .collect();

    if round_index >= max_multi_iters {
        return ordered.pop().into_iter().collect();
    }

    let mut positions: Vec<usize> = vec![];
    let mut chosen = vec![];
    for candidate in ordered.into_iter().rev() {
        let position = candidate.mutation().position();
        if positions.iter().any(|&p| p.abs_diff(position) < min_dist) {
            trace!("Skipping {} ({}), too close to a kept mutation", candidate.mutation(), candidate.score());
            continue;
        }
        positions.push(position);
        chosen.push(candidate);
    }
    chosen
}
