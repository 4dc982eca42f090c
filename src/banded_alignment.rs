/*!
Forward and backward banded alignment of a single read against a template.
Each cell holds the best log-likelihood of aligning a read prefix (forward) or suffix (backward) to a template prefix or suffix.

# Example usage
```rust
use quiver_con::banded_alignment::{backward, forward, AlignmentParameters};

let params = AlignmentParameters::new(-5.0, -5.0, 2);
let read = b"ACGT";
let log_error_probs = [-3.0; 4];
let template = b"AGT";

let fwd = forward(read, &log_error_probs, template, &params).unwrap();
let bwd = backward(read, &log_error_probs, template, &params).unwrap();

// one inserted base in the read
assert_eq!(fwd.get(-1, -1), -5.0);
assert_eq!(bwd.get(0, 0), -5.0);
```
*/

use crate::banded_matrix::{BandedMatrix, BandedMatrixError};

/// Scoring parameters shared by every alignment in a refinement round.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlignmentParameters {
    /// Log-probability of an extra base in the read
    pub log_p_ins: f64,
    /// Log-probability of a template base missing from the read
    pub log_p_del: f64,
    /// Half-width of the alignment band
    pub bandwidth: usize
}

impl AlignmentParameters {
    /// Constructor
    pub fn new(log_p_ins: f64, log_p_del: f64, bandwidth: usize) -> AlignmentParameters {
        AlignmentParameters {
            log_p_ins,
            log_p_del,
            bandwidth
        }
    }

    /// Copy of these parameters with a different bandwidth
    pub fn with_bandwidth(&self, bandwidth: usize) -> AlignmentParameters {
        AlignmentParameters {
            bandwidth,
            ..*self
        }
    }
}

/// Computes the value of one cell from its already filled neighbors.
/// `j` is the column in `matrix`, while `actual_j` is the template column it represents, which is what the band edges are measured against.
/// This lets scratch matrices with a shifted offset reuse the same recurrence.
/// # Arguments
/// * `matrix` - the matrix being filled
/// * `i` - the read row
/// * `j` - the column inside `matrix`
/// * `actual_j` - the template column that `j` corresponds to
/// * `read_base` - the read base consumed by row `i`
/// * `template_base` - the template base consumed by `actual_j`
/// * `log_error_prob` - the substitution cost for the read base
/// * `params` - gap penalties and bandwidth
/// # Errors
/// * if (i, actual_j) is outside of the band
#[allow(clippy::too_many_arguments)]
pub(crate) fn update_cell(
    matrix: &BandedMatrix, i: usize, j: usize, actual_j: usize,
    read_base: u8, template_base: u8, log_error_prob: f64, params: &AlignmentParameters
) -> Result<f64, BandedMatrixError> {
    let substitution = if read_base == template_base { 0.0 } else { log_error_prob };
    let (i, j) = (i as isize, j as isize);
    let actual_j = actual_j as isize;
    let bandwidth = params.bandwidth as isize;

    let insertion_step = || matrix.get(i - 1, j) + params.log_p_ins;
    let deletion_step = || matrix.get(i, j - 1) + params.log_p_del;
    let substitution_step = matrix.get(i - 1, j - 1) + substitution;

    if i == actual_j - bandwidth {
        // lower edge, the cell above is out of band
        Ok(deletion_step().max(substitution_step))
    } else if i == actual_j + bandwidth {
        // upper edge, the cell to the left is out of band
        Ok(insertion_step().max(substitution_step))
    } else if actual_j - bandwidth < i && i < actual_j + bandwidth {
        Ok(insertion_step().max(deletion_step()).max(substitution_step))
    } else {
        Err(BandedMatrixError::OutsideBand { row: i, col: j })
    }
}

/// Makes sure the band covers every column and contains the final cell.
fn check_band(matrix: &BandedMatrix) -> Result<(), BandedMatrixError> {
    for j in 0..matrix.cols() {
        matrix.range(j)?;
    }
    let (rows, cols) = matrix.shape();
    if !matrix.in_band(rows - 1, cols - 1) {
        return Err(BandedMatrixError::OutsideBand { row: rows as isize - 1, col: cols as isize - 1 });
    }
    Ok(())
}

/// Builds the forward matrix, where cell (i, j) is the best log-likelihood of aligning `read[..i]` to `template[..j]`.
/// The total alignment score is in the last cell.
/// # Arguments
/// * `read` - the read bases
/// * `log_error_probs` - per-base substitution cost for the read, same length as `read`
/// * `template` - the current template
/// * `params` - gap penalties and bandwidth
/// # Errors
/// * if the bandwidth is too small for the read/template shape
pub fn forward(read: &[u8], log_error_probs: &[f64], template: &[u8], params: &AlignmentParameters) -> Result<BandedMatrix, BandedMatrixError> {
    assert_eq!(read.len(), log_error_probs.len());
    let bandwidth = params.bandwidth;
    let mut result = BandedMatrix::new((read.len() + 1, template.len() + 1), bandwidth, 0)?;
    check_band(&result)?;

    for i in 0..(bandwidth + 1).min(read.len() + 1) {
        result.set(i as isize, 0, params.log_p_ins * i as f64)?;
    }
    for j in 0..(bandwidth + 1).min(template.len() + 1) {
        result.set(0, j as isize, params.log_p_del * j as f64)?;
    }

    for (i, (&read_base, &log_error_prob)) in read.iter().zip(log_error_probs.iter()).enumerate() {
        let i = i + 1;
        let start = i.saturating_sub(bandwidth).max(1);
        let stop = (template.len() + 1).min(i + bandwidth + 1);
        for j in start..stop {
            let value = update_cell(&result, i, j, j, read_base, template[j - 1], log_error_prob, params)?;
            result.set(i as isize, j as isize, value)?;
        }
    }
    Ok(result)
}

/// Builds the backward matrix, where cell (i, j) is the best log-likelihood of aligning `read[i..]` to `template[j..]`.
/// This runs `forward` on the reversed inputs and flips the result, the offset is re-centered so that indexing stays in the original coordinates.
/// When the lengths differ, the band is centered on `|template| - |read|` rather than mirroring the forward band.
/// Near the minimum bandwidth this can exclude the best path, so `get(0, 0)` may fall below the forward score.
/// # Arguments
/// * `read` - the read bases
/// * `log_error_probs` - per-base substitution cost for the read, same length as `read`
/// * `template` - the current template
/// * `params` - gap penalties and bandwidth
/// # Errors
/// * if the bandwidth is too small for the read/template shape
pub fn backward(read: &[u8], log_error_probs: &[f64], template: &[u8], params: &AlignmentParameters) -> Result<BandedMatrix, BandedMatrixError> {
    let rev_read: Vec<u8> = read.iter().rev().copied().collect();
    let rev_log_error_probs: Vec<f64> = log_error_probs.iter().rev().copied().collect();
    let rev_template: Vec<u8> = template.iter().rev().copied().collect();

    let mut result = forward(&rev_read, &rev_log_error_probs, &rev_template, params)?;
    result.reverse();
    result.set_offset(template.len() as isize - read.len() as isize);
    Ok(result)
}

/// Full (unbanded) global alignment score, used to check the banded results.
#[cfg(test)]
pub(crate) fn full_alignment_score(read: &[u8], log_error_probs: &[f64], template: &[u8], log_p_ins: f64, log_p_del: f64) -> f64 {
    let mut dp = vec![vec![0.0; template.len() + 1]; read.len() + 1];
    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = log_p_ins * i as f64;
    }
    for j in 0..=template.len() {
        dp[0][j] = log_p_del * j as f64;
    }
    for i in 1..=read.len() {
        for j in 1..=template.len() {
            let sub = if read[i - 1] == template[j - 1] { 0.0 } else { log_error_probs[i - 1] };
            dp[i][j] = (dp[i - 1][j] + log_p_ins)
                .max(dp[i][j - 1] + log_p_del)
                .max(dp[i - 1][j - 1] + sub);
        }
    }
    dp[read.len()][template.len()]
}
