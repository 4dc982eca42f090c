/*!
Initial template construction.
Refinement only needs a rough starting template, how it is produced is up to the `TemplateSeed` implementation.
The default, `MedoidSeed`, just picks the read closest to all of the others.

# Example usage
```rust
use quiver_con::template_seed::{MedoidSeed, TemplateSeed};

let reads: [&[u8]; 3] = [b"ACGTT", b"ACGT", b"ACCGT"];
let seed = MedoidSeed.seed(&reads).unwrap();
assert_eq!(seed, b"ACGT".to_vec());
```
*/

use log::debug;
use simple_error::bail;
use std::cmp::max;

/// Something that can produce a starting template from a set of reads
pub trait TemplateSeed {
    /// Produces an initial consensus over the same alphabet as the reads.
    /// # Arguments
    /// * `sequences` - the reads, in input order
    /// # Errors
    /// * if no usable template can be built
    fn seed(&self, sequences: &[&[u8]]) -> Result<Vec<u8>, Box<dyn std::error::Error>>;
}

/// Seeds with the medoid read: the one with the smallest summed edit distance to every other read.
/// Ties go to the earliest read.
#[derive(Clone, Copy, Debug, Default)]
pub struct MedoidSeed;

impl TemplateSeed for MedoidSeed {
    fn seed(&self, sequences: &[&[u8]]) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        if sequences.is_empty() {
            bail!("Cannot seed a template without any sequences");
        }

        // symmetric, so only fill the upper triangle
        let mut totals = vec![0; sequences.len()];
        for (i, &s1) in sequences.iter().enumerate() {
            for (j, &s2) in sequences.iter().enumerate().skip(i + 1) {
                let ed = edit_distance(s1, s2);
                totals[i] += ed;
                totals[j] += ed;
            }
        }

        let (best_index, best_total) = totals.iter()
            .enumerate()
            .min_by_key(|&(_i, &total)| total)
            .map(|(i, &total)| (i, total))
            .unwrap_or((0, 0));
        debug!("Seeding with read {best_index}, total edit distance {best_total}");

        if sequences[best_index].is_empty() {
            bail!("Medoid read is empty, cannot seed a template");
        }
        Ok(sequences[best_index].to_vec())
    }
}

/// Returns the full edit distance between two sequences by using a version of WFA.
/// # Arguments
/// * `v1` - the first sequence
/// * `v2` - the second sequence
/// # Examples
/// ```rust
/// use quiver_con::template_seed::edit_distance;
/// assert_eq!(edit_distance(b"ACGTA", b"ACGTA"), 0);
/// assert_eq!(edit_distance(b"ACGTA", b"ACTTA"), 1);
/// assert_eq!(edit_distance(b"ACGTA", b"CTTA"), 2);
/// ```
pub fn edit_distance(v1: &[u8], v2: &[u8]) -> usize {
    let l1 = v1.len();
    let l2 = v2.len();

    // furthest (i, j) reached on each diagonal for the current number of edits
    let mut curr_wf: Vec<(usize, usize)> = vec![(0, 0)];
    let mut edits = 0;

    loop {
        let mut next_wf: Vec<(usize, usize)> = vec![(0, 0); curr_wf.len() + 2];
        for (wf_index, &(start_i, start_j)) in curr_wf.iter().enumerate() {
            let (mut i, mut j) = (start_i, start_j);

            // free moves along the diagonal while the symbols match
            while i < l1 && j < l2 && v1[i] == v2[j] {
                i += 1;
                j += 1;
            }

            if i == l1 && j == l2 {
                return edits;
            }

            // deletion, mismatch, insertion; clamped when one side is exhausted
            let pushes = if i == l1 {
                [(i, j), (i, j + 1), (i, j + 1)]
            } else if j == l2 {
                [(i + 1, j), (i + 1, j), (i, j)]
            } else {
                [(i + 1, j), (i + 1, j + 1), (i, j + 1)]
            };
            for (slot, push) in next_wf[wf_index..wf_index + 3].iter_mut().zip(pushes) {
                *slot = max(*slot, push);
            }
        }

        edits += 1;
        curr_wf = next_wf;
    }
}
