
use rand::distributions::Uniform;
use rand::{Rng, SeedableRng};

use crate::mutation::ALPHABET;

/// Phred range for bases copied correctly from the consensus
const GOOD_PHRED: (u8, u8) = (20, 40);
/// Phred range for bases introduced by an error
const BAD_PHRED: (u8, u8) = (5, 15);

/// Generates a uniformly random nucleotide sequence.
/// # Arguments
/// * `rng` - the random source
/// * `len` - the sequence length
pub fn random_sequence<R: Rng>(rng: &mut R, len: usize) -> Vec<u8> {
    let base_distribution = Uniform::new(0, ALPHABET.len());
    (0..len)
        .map(|_i| ALPHABET[rng.sample(base_distribution)])
        .collect()
}

/// A generated dataset: the true consensus and noisy reads with per-base phred qualities
pub struct ExampleReads {
    /// The sequence every read was sampled from
    pub consensus: Vec<u8>,
    /// The noisy reads
    pub reads: Vec<Vec<u8>>,
    /// Phred quality for each base of each read
    pub phreds: Vec<Vec<u8>>
}

/// Creates a test set we can verify is working.
/// Erroneous bases get low qualities and correct bases get high ones, so the quality carries real signal.
/// # Arguments
/// * `seq_len` - the length of the consensus
/// * `num_samples` - the number of reads to generate from the consensus
/// * `error_rate` - overall error rate, assumes mismatch, insertion, and deletion are equally likely sub-components of this error rate
/// * `seed` - seed for the random source, the same seed always gives the same data
pub fn generate_test(seq_len: usize, num_samples: usize, error_rate: f64, seed: u64) -> ExampleReads {
    assert!((0.0..=1.0).contains(&error_rate));

    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let base_distribution = Uniform::new(0, ALPHABET.len());
    let basem1_distribution = Uniform::new(1, ALPHABET.len());
    let error_distribution = Uniform::new(0.0, 1.0);
    let error_type_distribution = Uniform::new(0, 3);
    let good_phred = Uniform::new_inclusive(GOOD_PHRED.0, GOOD_PHRED.1);
    let bad_phred = Uniform::new_inclusive(BAD_PHRED.0, BAD_PHRED.1);

    let consensus: Vec<u8> = random_sequence(&mut rng, seq_len);

    let mut reads = Vec::with_capacity(num_samples);
    let mut phreds = Vec::with_capacity(num_samples);
    for _i in 0..num_samples {
        let mut seq = vec![];
        let mut quals = vec![];
        let mut con_index = 0;
        while con_index < consensus.len() {
            let c = consensus[con_index];
            let is_error = rng.sample(error_distribution) < error_rate;
            if is_error {
                let error_type = rng.sample(error_type_distribution);
                match error_type {
                    0 => {
                        // substitution
                        let c_index = ALPHABET.iter().position(|&b| b == c).unwrap_or_default();
                        let alt_index = (c_index + rng.sample(basem1_distribution)) % ALPHABET.len();
                        seq.push(ALPHABET[alt_index]);
                        quals.push(rng.sample(bad_phred));
                        con_index += 1;
                    },
                    1 => {
                        // deletion
                        con_index += 1;
                    },
                    2 => {
                        // insertion
                        seq.push(ALPHABET[rng.sample(base_distribution)]);
                        quals.push(rng.sample(bad_phred));
                    },
                    _ => panic!("no impl")
                }
            } else {
                seq.push(c);
                quals.push(rng.sample(good_phred));
                con_index += 1;
            }
        }
        reads.push(seq);
        phreds.push(quals);
    }

    ExampleReads {
        consensus,
        reads,
        phreds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_errors() {
        let example = generate_test(50, 4, 0.0, 0);
        assert_eq!(example.consensus.len(), 50);
        for (read, quals) in example.reads.iter().zip(example.phreds.iter()) {
            assert_eq!(read, &example.consensus);
            assert!(quals.iter().all(|&q| (GOOD_PHRED.0..=GOOD_PHRED.1).contains(&q)));
        }
    }

    #[test]
    fn test_deterministic() {
        let first = generate_test(100, 5, 0.1, 7);
        let second = generate_test(100, 5, 0.1, 7);
        assert_eq!(first.consensus, second.consensus);
        assert_eq!(first.reads, second.reads);
        assert_eq!(first.phreds, second.phreds);
        for (read, quals) in first.reads.iter().zip(first.phreds.iter()) {
            assert_eq!(read.len(), quals.len());
            assert!(read.iter().all(|b| ALPHABET.contains(b)));
        }
    }
}
