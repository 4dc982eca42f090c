/*!
Scores a candidate mutation against one read without re-aligning the read.
The forward matrix supplies the best scores up to the mutated column, the backward matrix supplies the best scores from there to the end.
Only the single column touched by the mutation gets recomputed.
*/

use std::borrow::Cow;
use std::ops::Range;

use crate::banded_alignment::{update_cell, AlignmentParameters};
use crate::banded_matrix::{BandedMatrix, BandedMatrixError};
use crate::mutation::Mutation;

/// Computes the forward column that follows template column `position` when the next template base is `base`.
/// This is the new column for both a substitution at `position` and an insertion before `position`.
/// # Arguments
/// * `position` - the template position being mutated
/// * `base` - the substituted or inserted base
/// * `read` - the read bases
/// * `log_error_probs` - per-base substitution cost for the read
/// * `forward_matrix` - the forward matrix of this read against the unmutated template
/// * `params` - gap penalties and bandwidth, must match the ones used for `forward_matrix`
/// # Returns
/// The in-band values of the new column, rows ordered the same way as `forward_matrix.range(position + 1)`.
/// # Errors
/// * if `forward_matrix` is not a forward matrix (offset 0) or its bandwidth differs from `params`
/// * if the band does not cover the new column
pub fn updated_column(
    position: usize, base: u8, read: &[u8], log_error_probs: &[f64],
    forward_matrix: &BandedMatrix, params: &AlignmentParameters
) -> Result<Vec<f64>, BandedMatrixError> {
    if forward_matrix.offset() != 0 {
        return Err(BandedMatrixError::UnexpectedOffset { expected: 0, found: forward_matrix.offset() });
    }
    let bandwidth = params.bandwidth;
    let rows = forward_matrix.rows();

    // column 0 of the scratch lines up exactly with column `position` of the forward matrix
    let mut scratch = BandedMatrix::new((rows, 2), bandwidth, -(position as isize))?;
    scratch.copy_column_from(0, forward_matrix, position)?;
    if position < bandwidth {
        scratch.set(0, 1, scratch.get(0, 0) + params.log_p_del)?;
    }

    let actual_j = position + 1;
    let start = actual_j.saturating_sub(bandwidth).max(1);
    let stop = rows.min(actual_j + bandwidth + 1);
    for i in start..stop {
        let value = update_cell(&scratch, i, 1, actual_j, read[i - 1], base, log_error_probs[i - 1], params)?;
        scratch.set(i as isize, 1, value)?;
    }
    Ok(scratch.column(1)?.to_vec())
}

/// Best combined score over the rows where both columns are in band.
/// Returns negative infinity if the two bands do not overlap.
fn splice_columns(forward_column: &[f64], forward_rows: Range<usize>, backward_column: &[f64], backward_rows: Range<usize>) -> f64 {
    let start = forward_rows.start.max(backward_rows.start);
    let stop = forward_rows.end.min(backward_rows.end);
    (start..stop)
        .map(|i| forward_column[i - forward_rows.start] + backward_column[i - backward_rows.start])
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Scores the total alignment of `read` against the mutated template using the forward-backward trick.
/// # Arguments
/// * `mutation` - the mutation to score, its position refers to the template both matrices were built on
/// * `read` - the read bases
/// * `log_error_probs` - per-base substitution cost for the read
/// * `forward_matrix` - forward matrix of the read against the current template
/// * `backward_matrix` - backward matrix of the read against the current template
/// * `params` - gap penalties and bandwidth used to build the matrices
/// # Errors
/// * if the band does not cover the columns involved
pub fn score_mutation(
    mutation: &Mutation, read: &[u8], log_error_probs: &[f64],
    forward_matrix: &BandedMatrix, backward_matrix: &BandedMatrix, params: &AlignmentParameters
) -> Result<f64, BandedMatrixError> {
    // (forward column index, forward column values, backward column index)
    let (forward_index, forward_column, backward_index): (usize, Cow<[f64]>, usize) = match *mutation {
        Mutation::Deletion { position } => {
            // skip template[position] by jumping straight from column `position` to the suffix after it
            (position, Cow::Borrowed(forward_matrix.column(position)?), position + 1)
        },
        Mutation::Substitution { position, base } => {
            let column = updated_column(position, base, read, log_error_probs, forward_matrix, params)?;
            (position + 1, Cow::Owned(column), position + 1)
        },
        Mutation::Insertion { position, base } => {
            let column = updated_column(position, base, read, log_error_probs, forward_matrix, params)?;
            (position + 1, Cow::Owned(column), position)
        }
    };

    let backward_column = backward_matrix.column(backward_index)?;
    let forward_rows = forward_matrix.range(forward_index)?;
    let backward_rows = backward_matrix.range(backward_index)?;
    Ok(splice_columns(&forward_column, forward_rows, backward_column, backward_rows))
}

/// The total alignment score held by a forward matrix.
pub fn alignment_score(forward_matrix: &BandedMatrix) -> f64 {
    forward_matrix.get(-1, -1)
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{Rng, SeedableRng};

    use crate::banded_alignment::{backward, forward, full_alignment_score};
    use crate::example_gen::random_sequence;
    use crate::mutation::enumerate_mutations;

    fn assert_close(actual: f64, expected: f64) {
        let tolerance = 1e-9 * expected.abs().max(1.0);
        assert!((actual - expected).abs() <= tolerance, "{actual} != {expected}");
    }

    #[test]
    fn test_splice_windows() {
        // overlap is rows 1..4, the best pairing is row 2
        let forward_column = [-1.0, -2.0, -3.0, -4.0];
        let backward_column = [-10.0, -1.0, -20.0];
        assert_eq!(splice_columns(&forward_column, 0..4, &backward_column, 1..4), -4.0);
        assert_eq!(splice_columns(&forward_column, 0..4, &backward_column, 4..7), f64::NEG_INFINITY);
    }

    #[test]
    fn test_identity_substitution_column() {
        // "substituting" a base with itself rebuilds the existing forward column, even in a narrow band
        let params = AlignmentParameters::new(-2.0, -3.0, 2);
        let read = b"ACGTTACGAT";
        let probs = [-1.0, -2.0, -3.0, -1.5, -2.5, -1.0, -2.0, -3.0, -1.5, -2.5];
        let template = b"ACGTACGGAT";
        let fwd = forward(read, &probs, template, &params).unwrap();
        for (position, &base) in template.iter().enumerate() {
            let column = updated_column(position, base, read, &probs, &fwd, &params).unwrap();
            assert_eq!(column.as_slice(), fwd.column(position + 1).unwrap());
        }
    }

    #[test]
    fn test_updated_column_wrong_matrix() {
        let params = AlignmentParameters::new(-2.0, -3.0, 2);
        let read = b"ACGTA";
        let probs = [-2.0; 5];
        let template = b"ACGA";

        // a backward matrix is centered elsewhere
        let bwd = backward(read, &probs, template, &params).unwrap();
        assert_eq!(
            updated_column(1, b'C', read, &probs, &bwd, &params),
            Err(BandedMatrixError::UnexpectedOffset { expected: 0, found: -1 })
        );

        // parameters from a different band
        let fwd = forward(read, &probs, template, &params).unwrap();
        assert_eq!(
            updated_column(1, b'C', read, &probs, &fwd, &params.with_bandwidth(3)),
            Err(BandedMatrixError::BandwidthMismatch { expected: 3, found: 2 })
        );
    }

    #[test]
    fn test_scores_match_realignment() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        for _ in 0..100 {
            let read_len = rng.gen_range(1..=8);
            let template_len = rng.gen_range(1..=8);
            let read = random_sequence(&mut rng, read_len);
            let template = random_sequence(&mut rng, template_len);
            let probs: Vec<f64> = (0..read_len).map(|_| -rng.gen_range(0.5..4.0)).collect();
            let log_p_ins = -rng.gen_range(1.0..5.0);
            let log_p_del = -rng.gen_range(1.0..5.0);

            // wide enough that the mutated template is also unbanded
            let params = AlignmentParameters::new(log_p_ins, log_p_del, read_len.max(template_len) + 1);
            let fwd = forward(&read, &probs, &template, &params).unwrap();
            let bwd = backward(&read, &probs, &template, &params).unwrap();
            for mutation in enumerate_mutations(&template) {
                let score = score_mutation(&mutation, &read, &probs, &fwd, &bwd, &params).unwrap();
                let expected = full_alignment_score(&read, &probs, &mutation.apply(&template), log_p_ins, log_p_del);
                assert_close(score, expected);
            }
        }
    }

    #[test]
    fn test_alignment_score() {
        let params = AlignmentParameters::new(-2.0, -2.0, 3);
        let fwd = forward(b"ACGT", &[-3.0; 4], b"ACTT", &params).unwrap();
        assert_eq!(alignment_score(&fwd), -3.0);
    }
}
