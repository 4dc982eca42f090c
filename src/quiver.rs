/*!
This module provides access to the QuiverConsensus, which polishes a template against a set of quality-aware reads.
Each round aligns every read to the template, scores every single-base mutation of the template, and applies the improving ones.
Refinement stops once no mutation improves the total score or the round budget runs out.

# Example usage
```rust
use quiver_con::quiver::QuiverConsensus;
use quiver_con::quiver_config::QuiverConfigBuilder;
use quiver_con::read::QualifiedRead;

let config = QuiverConfigBuilder::default()
    .log_p_ins(-5.0)
    .log_p_del(-5.0)
    .build().unwrap();
let mut quiver = QuiverConsensus::with_config(config).unwrap();
for sequence in [b"AAAA", b"AAAA", b"AATA"] {
    quiver.add_read(QualifiedRead::from_phred(sequence, &[30; 4]).unwrap());
}

// start from the outlier, refinement should fix the T
let refinement = quiver.refine(b"AATA").unwrap();
assert_eq!(refinement.template(), b"AAAA");
assert!(refinement.converged());
assert_eq!(refinement.score(), -3.0);
```
*/

use itertools::{Itertools, MinMaxResult};
use log::{log, trace, Level};
use rayon::prelude::*;
use simple_error::bail;

use crate::banded_alignment::{backward, forward, AlignmentParameters};
use crate::banded_matrix::{BandedMatrix, BandedMatrixError};
use crate::candidate_selection::choose_candidates;
use crate::mutation::{apply_mutations, enumerate_mutations, Mutation, ScoredMutation};
use crate::mutation_scoring::{alignment_score, score_mutation};
use crate::quiver_config::QuiverConfig;
use crate::read::{validate_sequence, QualifiedRead};
use crate::template_seed::{MedoidSeed, TemplateSeed};

/// How a refinement run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefinementStatus {
    /// A full search found no improving mutation
    Converged,
    /// The round budget ran out while mutations were still being applied
    IterationLimit
}

/// Bookkeeping for a single round that changed the template
#[derive(Clone, Debug, PartialEq)]
pub struct RoundSummary {
    /// Number of mutations that improved on the round's starting score
    candidates: usize,
    /// Number of mutations actually applied
    applied: usize,
    /// Total score after applying them and re-aligning
    score: f64,
    /// Bandwidth used for the re-alignment
    bandwidth: usize
}

impl RoundSummary {
    // Getters
    pub fn candidates(&self) -> usize {
        self.candidates
    }

    pub fn applied(&self) -> usize {
        self.applied
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn bandwidth(&self) -> usize {
        self.bandwidth
    }
}

/// Contains a final refinement result
#[derive(Clone, Debug, PartialEq)]
pub struct Refinement {
    /// The refined template
    template: Vec<u8>,
    /// Total log-likelihood of all reads against the refined template
    score: f64,
    /// Why the loop stopped
    status: RefinementStatus,
    /// Bandwidth of the final alignments
    bandwidth: usize,
    /// One entry per round that applied mutations
    rounds: Vec<RoundSummary>
}

impl Refinement {
    // Getters
    pub fn template(&self) -> &[u8] {
        &self.template
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn status(&self) -> RefinementStatus {
        self.status
    }

    pub fn converged(&self) -> bool {
        self.status == RefinementStatus::Converged
    }

    pub fn bandwidth(&self) -> usize {
        self.bandwidth
    }

    pub fn rounds(&self) -> &[RoundSummary] {
        &self.rounds
    }

    /// Number of rounds that changed the template
    pub fn iterations(&self) -> usize {
        self.rounds.len()
    }
}

/// Forward and backward matrices of one read against the current template
struct ReadAlignment {
    forward_matrix: BandedMatrix,
    backward_matrix: BandedMatrix
}

/// Core utility that refines a template against quality-aware reads.
/// All reads are assumed to span the full template.
#[derive(Debug, Default)]
pub struct QuiverConsensus {
    /// Contains all the reads that have been added so far
    reads: Vec<QualifiedRead>,
    /// The config for this refinement run
    config: QuiverConfig
}

impl QuiverConsensus {
    /// Creates a new instance of QuiverConsensus and performs sanity checks.
    /// # Arguments
    /// * `config` - the scoring and loop parameters
    /// # Errors
    /// * if the config fails validation
    pub fn with_config(config: QuiverConfig) -> Result<QuiverConsensus, Box<dyn std::error::Error>> {
        config.validate()?;
        Ok(QuiverConsensus {
            reads: vec![],
            config
        })
    }

    /// Adds a new read to the list.
    /// # Errors
    /// * None so far
    pub fn add_read(&mut self, read: QualifiedRead) -> Result<(), Box<dyn std::error::Error>> {
        self.reads.push(read);
        Ok(())
    }

    /// Adds a new read from bases and numeric phred qualities.
    /// # Errors
    /// * if the read cannot be built, see `QualifiedRead::from_phred`
    pub fn add_sequence(&mut self, sequence: &[u8], phred: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
        self.add_read(QualifiedRead::from_phred(sequence, phred)?)
    }

    /// Seeds a template with the medoid read and refines it.
    /// # Errors
    /// * if there are no reads or refinement fails
    pub fn consensus(&self) -> Result<Refinement, Box<dyn std::error::Error>> {
        self.consensus_with_seed(&MedoidSeed)
    }

    /// Seeds a template with the provided strategy and refines it.
    /// # Arguments
    /// * `seeder` - builds the starting template from the read sequences
    /// # Errors
    /// * if there are no reads, seeding fails, or refinement fails
    pub fn consensus_with_seed<S: TemplateSeed>(&self, seeder: &S) -> Result<Refinement, Box<dyn std::error::Error>> {
        if self.reads.is_empty() {
            bail!("Must add at least one read before generating a consensus");
        }
        let sequences: Vec<&[u8]> = self.reads.iter().map(|r| r.sequence()).collect();
        let template = seeder.seed(&sequences)?;
        self.refine(&template)
    }

    /// The core function, refines `template` until it stops improving or the round budget runs out.
    /// # Arguments
    /// * `template` - the starting template, lower-case bases are accepted
    /// # Errors
    /// * if there are no reads, or the template is empty or has non-ACGT symbols
    /// * if a fixed bandwidth is smaller than the length spread requires
    /// * if the band stops covering the alignment in a later round, only possible with a fixed bandwidth
    pub fn refine(&self, template: &[u8]) -> Result<Refinement, Box<dyn std::error::Error>> {
        if self.reads.is_empty() {
            bail!("Must add at least one read before refining");
        }
        if template.is_empty() {
            bail!("Initial template must not be empty");
        }
        let template = template.to_ascii_uppercase();
        validate_sequence(&template)?;

        let min_bandwidth = self.required_bandwidth(template.len());
        let bandwidth = match self.config.bandwidth {
            Some(bandwidth) => {
                if bandwidth < min_bandwidth {
                    bail!("Minimum bandwidth is {}, but {} was given", min_bandwidth, bandwidth);
                }
                bandwidth
            },
            None => min_bandwidth
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads)
            .build()?;
        let refinement = pool.install(|| self.run_rounds(template, min_bandwidth, bandwidth))?;
        Ok(refinement)
    }

    /// Smallest bandwidth that keeps the alignment end inside the band for every read.
    fn required_bandwidth(&self, template_len: usize) -> usize {
        let (min_read, max_read) = match self.reads.iter().map(|r| r.len()).minmax() {
            MinMaxResult::NoElements => (template_len, template_len),
            MinMaxResult::OneElement(l) => (l, l),
            MinMaxResult::MinMax(l1, l2) => (l1, l2)
        };
        let upper = max_read.max(template_len);
        let lower = min_read.min(template_len);
        (2 * (upper - lower)).max(1)
    }

    /// The refinement loop itself, expected to run inside the worker pool.
    fn run_rounds(&self, mut template: Vec<u8>, min_bandwidth: usize, bandwidth: usize) -> Result<Refinement, BandedMatrixError> {
        let level = if self.config.verbose { Level::Info } else { Level::Debug };
        let mut params = AlignmentParameters::new(self.config.log_p_ins, self.config.log_p_del, bandwidth);
        let mut alignments = self.align_all(&template, &params)?;
        let mut current_score = total_score(&alignments);

        let mut status = RefinementStatus::IterationLimit;
        let mut rounds = vec![];
        for round_index in 0..self.config.max_iters {
            log!(level, "Round {round_index}: template length {}, bandwidth {}, score {current_score}", template.len(), params.bandwidth);
            let candidates = self.search(&template, &alignments, &params, current_score)?;
            if candidates.is_empty() {
                status = RefinementStatus::Converged;
                break;
            }

            let chosen = choose_candidates(&candidates, self.config.min_dist, round_index, self.config.max_multi_iters);
            template = apply_mutations(&template, &chosen);

            // the length spread may have changed, so the adaptive band follows it
            if self.config.bandwidth.is_none() {
                let bandwidth = self.required_bandwidth(template.len()).max(min_bandwidth);
                params = params.with_bandwidth(bandwidth);
            }

            alignments = self.align_all(&template, &params)?;
            current_score = total_score(&alignments);
            log!(level, "Round {round_index}: applied {} of {} candidates, score {current_score}", chosen.len(), candidates.len());
            rounds.push(RoundSummary {
                candidates: candidates.len(),
                applied: chosen.len(),
                score: current_score,
                bandwidth: params.bandwidth
            });
        }

        log!(level, "Refinement finished with {status:?} after {} rounds, score {current_score}", rounds.len());
        Ok(Refinement {
            template,
            score: current_score,
            status,
            bandwidth: params.bandwidth,
            rounds
        })
    }

    /// Builds the forward and backward matrices of every read, in read order.
    fn align_all(&self, template: &[u8], params: &AlignmentParameters) -> Result<Vec<ReadAlignment>, BandedMatrixError> {
        self.reads.par_iter()
            .map(|read| {
                let forward_matrix = forward(read.sequence(), read.log_error_probs(), template, params)?;
                let backward_matrix = backward(read.sequence(), read.log_error_probs(), template, params)?;
                Ok(ReadAlignment {
                    forward_matrix,
                    backward_matrix
                })
            })
            .collect()
    }

    /// Scores every mutation of the template and keeps the ones that beat `current_score`, in enumeration order.
    fn search(
        &self, template: &[u8], alignments: &[ReadAlignment], params: &AlignmentParameters, current_score: f64
    ) -> Result<Vec<ScoredMutation>, BandedMatrixError> {
        let mutations: Vec<Mutation> = enumerate_mutations(template).collect();
        let scored: Vec<ScoredMutation> = mutations.par_iter()
            .map(|mutation| {
                // sequential over reads so the sum does not depend on scheduling
                let mut score = 0.0;
                for (read, alignment) in self.reads.iter().zip(alignments.iter()) {
                    score += score_mutation(
                        mutation, read.sequence(), read.log_error_probs(),
                        &alignment.forward_matrix, &alignment.backward_matrix, params
                    )?;
                }
                Ok(ScoredMutation::new(*mutation, score))
            })
            .collect::<Result<Vec<_>, BandedMatrixError>>()?;

        let candidates: Vec<ScoredMutation> = scored.into_iter()
            .filter(|c| c.score() > current_score)
            .collect();
        for candidate in candidates.iter() {
            trace!("Candidate {} => {}", candidate.mutation(), candidate.score());
        }
        Ok(candidates)
    }

    // Getters
    pub fn reads(&self) -> &[QualifiedRead] {
        &self.reads
    }

    pub fn config(&self) -> &QuiverConfig {
        &self.config
    }
}

/// Sum of the alignment scores, always in read order.
fn total_score(alignments: &[ReadAlignment]) -> f64 {
    alignments.iter()
        .map(|a| alignment_score(&a.forward_matrix))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    use crate::example_gen::generate_test;
    use crate::quiver_config::QuiverConfigBuilder;

    fn aaaa_consensus(bandwidth: Option<usize>) -> QuiverConsensus {
        let config = QuiverConfigBuilder::default()
            .log_p_ins(-5.0)
            .log_p_del(-5.0)
            .bandwidth(bandwidth)
            .max_iters(10)
            .build().unwrap();
        let mut quiver = QuiverConsensus::with_config(config).unwrap();
        for sequence in [b"AAAA", b"AAAA", b"AATA"] {
            quiver.add_sequence(sequence, &[30; 4]).unwrap();
        }
        quiver
    }

    #[test_log::test]
    fn test_fixed_bandwidth() {
        let quiver = aaaa_consensus(Some(2));
        let refinement = quiver.refine(b"AATA").unwrap();
        assert_eq!(refinement.template(), b"AAAA");
        assert_eq!(refinement.status(), RefinementStatus::Converged);
        assert_eq!(refinement.score(), -3.0);
        assert_eq!(refinement.bandwidth(), 2);
        assert_eq!(refinement.rounds(), &[RoundSummary { candidates: 1, applied: 1, score: -3.0, bandwidth: 2 }]);
    }

    #[test]
    fn test_adaptive_bandwidth() {
        let quiver = aaaa_consensus(None);
        let refinement = quiver.refine(b"aata").unwrap();
        assert_eq!(refinement.template(), b"AAAA");
        assert!(refinement.converged());
        assert_eq!(refinement.score(), -3.0);
        // all lengths match, so the floor of 1 applies
        assert_eq!(refinement.bandwidth(), 1);
        assert_eq!(refinement.iterations(), 1);
    }

    #[test]
    fn test_fixed_point() {
        // refining an already optimal template changes nothing
        let quiver = aaaa_consensus(Some(2));
        let refinement = quiver.refine(b"AAAA").unwrap();
        assert_eq!(refinement.template(), b"AAAA");
        assert!(refinement.converged());
        assert_eq!(refinement.score(), -3.0);
        assert!(refinement.rounds().is_empty());
    }

    #[test]
    fn test_invalid_inputs() {
        let quiver = QuiverConsensus::default();
        assert!(quiver.refine(b"ACGT").is_err());
        assert!(quiver.consensus().is_err());

        let quiver = aaaa_consensus(None);
        assert!(quiver.refine(b"").is_err());
        assert!(quiver.refine(b"AANA").is_err());

        let config = QuiverConfigBuilder::default().log_p_ins(0.0).build().unwrap();
        assert!(QuiverConsensus::with_config(config).is_err());
    }

    #[test]
    fn test_bandwidth_too_small() {
        let config = QuiverConfigBuilder::default()
            .bandwidth(Some(3))
            .build().unwrap();
        let mut quiver = QuiverConsensus::with_config(config).unwrap();
        quiver.add_sequence(b"ACGT", &[30; 4]).unwrap();
        quiver.add_sequence(b"ACGTACGT", &[30; 8]).unwrap();

        // spread is 8 - 4, doubled
        let error = quiver.refine(b"ACGT").unwrap_err();
        assert_eq!(error.to_string(), "Minimum bandwidth is 8, but 3 was given");
    }

    /// Two separated errors against three perfect reads
    fn two_error_consensus(max_iters: usize, max_multi_iters: usize, min_dist: usize) -> (QuiverConsensus, Vec<u8>) {
        let truth = b"ACGTACGTACGTACGTACGTACGTAC";
        let config = QuiverConfigBuilder::default()
            .log_p_ins(-5.0)
            .log_p_del(-5.0)
            .max_iters(max_iters)
            .max_multi_iters(max_multi_iters)
            .min_dist(min_dist)
            .build().unwrap();
        let mut quiver = QuiverConsensus::with_config(config).unwrap();
        for _ in 0..3 {
            quiver.add_sequence(truth, &[30; 26]).unwrap();
        }

        let mut template = truth.to_vec();
        template[2] = b'T';
        template[20] = b'C';
        (quiver, template)
    }

    #[test]
    fn test_multiple_mutations_per_round() {
        let (quiver, template) = two_error_consensus(100, 50, 9);
        let refinement = quiver.refine(&template).unwrap();
        assert_eq!(refinement.template(), b"ACGTACGTACGTACGTACGTACGTAC");
        assert!(refinement.converged());
        assert_eq!(refinement.score(), 0.0);
        assert_eq!(refinement.rounds(), &[RoundSummary { candidates: 2, applied: 2, score: 0.0, bandwidth: 1 }]);
    }

    #[test]
    fn test_single_mutation_rounds() {
        // past max_multi_iters only the best mutation is taken
        let (quiver, template) = two_error_consensus(100, 0, 9);
        let refinement = quiver.refine(&template).unwrap();
        assert_eq!(refinement.template(), b"ACGTACGTACGTACGTACGTACGTAC");
        assert_eq!(refinement.rounds().len(), 2);
        assert!(refinement.rounds().iter().all(|r| r.applied() == 1));
        assert_eq!(refinement.rounds()[0].score(), -9.0);

        // the two errors are within min_dist of each other here
        let (quiver, template) = two_error_consensus(100, 50, 30);
        let refinement = quiver.refine(&template).unwrap();
        assert_eq!(refinement.template(), b"ACGTACGTACGTACGTACGTACGTAC");
        assert_eq!(refinement.rounds().len(), 2);
    }

    #[test]
    fn test_iteration_limit() {
        let (quiver, template) = two_error_consensus(0, 50, 9);
        let refinement = quiver.refine(&template).unwrap();
        assert_eq!(refinement.template(), template.as_slice());
        assert_eq!(refinement.status(), RefinementStatus::IterationLimit);
        assert_eq!(refinement.score(), -18.0);

        // equal scores, so the later position wins the only round
        let (quiver, template) = two_error_consensus(1, 0, 9);
        let refinement = quiver.refine(&template).unwrap();
        assert_eq!(refinement.template(), b"ACTTACGTACGTACGTACGTACGTAC");
        assert_eq!(refinement.status(), RefinementStatus::IterationLimit);
        assert_eq!(refinement.score(), -9.0);
    }

    #[test]
    fn test_thread_independence() {
        let example = generate_test(60, 6, 0.05, 3);
        let mut results = vec![];
        for num_threads in [1, 4] {
            let config = QuiverConfigBuilder::default()
                .num_threads(num_threads)
                .build().unwrap();
            let mut quiver = QuiverConsensus::with_config(config).unwrap();
            for (read, phred) in example.reads.iter().zip(example.phreds.iter()) {
                quiver.add_sequence(read, phred).unwrap();
            }
            results.push(quiver.consensus().unwrap());
        }
        assert_eq!(results[0], results[1]);
    }

    #[test_log::test]
    fn test_generated_recovery() {
        let mut recovered = 0;
        for seed in 0..5 {
            let example = generate_test(40, 8, 0.05, seed);
            let mut quiver = QuiverConsensus::default();
            for (read, phred) in example.reads.iter().zip(example.phreds.iter()) {
                quiver.add_sequence(read, phred).unwrap();
            }
            let refinement = quiver.consensus().unwrap();
            assert!(refinement.converged());
            if refinement.template() == example.consensus.as_slice() {
                recovered += 1;
            }
        }
        assert!(recovered >= 4, "only recovered {recovered} of 5");
    }

    #[derive(Debug, serde::Deserialize)]
    struct RefineRecord {
        kind: String,
        sequence: String,
        quality: String
    }

    /// Loads a refinement test from a csv file.
    /// Expected columns are "kind" (template, read, or expected), "sequence", and "quality" (phred+33, reads only).
    /// Returns a tuple of (template, reads, expected).
    fn load_refine_csv_test(filename: &std::path::Path) -> (Vec<u8>, Vec<QualifiedRead>, Vec<u8>) {
        let mut template = None;
        let mut reads = vec![];
        let mut expected = None;

        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(filename)
            .unwrap();
        for row in csv_reader.deserialize() {
            let record: RefineRecord = row.unwrap();
            let sequence = record.sequence.as_bytes().to_vec();
            match record.kind.as_str() {
                "template" => template = Some(sequence),
                "read" => reads.push(QualifiedRead::from_fastq_quality(&sequence, record.quality.as_bytes()).unwrap()),
                "expected" => expected = Some(sequence),
                other => panic!("unexpected row kind {other}")
            }
        }
        (template.unwrap(), reads, expected.unwrap())
    }

    /// Entry point for file-based tests.
    /// # Arguments
    /// * `filename` - the test file to load, will be a csv
    /// * `expected_score` - total score of the expected template
    fn run_test_file(filename: &str, expected_score: f64) {
        let (template, reads, expected) = load_refine_csv_test(&PathBuf::from(filename));
        let mut quiver = QuiverConsensus::default();
        for read in reads.into_iter() {
            quiver.add_read(read).unwrap();
        }

        let refinement = quiver.refine(&template).unwrap();
        assert_eq!(refinement.template(), expected.as_slice());
        assert!(refinement.converged());
        assert!((refinement.score() - expected_score).abs() < 1e-9);
    }

    #[test]
    fn test_csv_refine_001() {
        run_test_file("./tests/refine_001.csv", -72.5);
    }
}
