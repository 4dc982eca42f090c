/*!
# quiver_con
This library provides access to a quality-aware consensus polisher for nucleotide reads.
A template is refined by repeatedly scoring every single-base mutation against banded forward/backward alignments of the reads and applying the ones that improve the total log-likelihood.

Key benefits:
* Per-base read qualities drive the substitution costs, so low quality disagreements count for less
* A mutation is scored from two saved alignment columns plus one recomputed column, no re-alignment needed
* Reads and candidate mutations are processed in parallel while the result stays deterministic

Performance notes:
* Alignments are banded, the band grows with the length spread between the reads and the template
* Reads are assumed to cover the full template, partial reads will pull the template towards their length

# Example usage
```rust
use quiver_con::quiver::QuiverConsensus;

let sequences: [&[u8]; 3] = [
    b"ACGTACGT",
    b"ACGTACGT", // this should be the consensus
    b"ACGTTCGT"
];

// add all the reads with a flat phred 30 quality
let mut quiver: QuiverConsensus = Default::default();
for s in sequences.iter() {
    quiver.add_sequence(s, &vec![30; s.len()]).unwrap();
}

// run consensus from a template that has one error
let refinement = quiver.refine(b"ACGTTCGT").unwrap();
assert_eq!(refinement.template(), sequences[1]);
assert!(refinement.converged());
```
*/

/// Banded forward and backward alignment of a read against a template
pub mod banded_alignment;
/// Storage for a diagonal band of a dynamic programming matrix
pub mod banded_matrix;
/// Picks which improving mutations get applied in a round
pub mod candidate_selection;
/// Utility for generating examples
pub mod example_gen;
/// Single-base template mutations and their enumeration
pub mod mutation;
/// Forward-backward scoring of a mutation without re-alignment
pub mod mutation_scoring;
/// Main functionality for the refinement loop
pub mod quiver;
/// Configuration for QuiverConsensus
pub mod quiver_config;
/// Reads with per-base error probabilities
pub mod read;
/// Starting template construction
pub mod template_seed;
