
use simple_error::bail;

use crate::mutation::ALPHABET;

/// Offset of FASTQ quality characters (phred+33)
const FASTQ_PHRED_OFFSET: u8 = 33;

/// Checks that a sequence only uses the nucleotide alphabet.
/// # Errors
/// * if any symbol is outside of `ACGT`
pub fn validate_sequence(sequence: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    if let Some((index, &symbol)) = sequence.iter().enumerate().find(|&(_i, &s)| !ALPHABET.contains(&s)) {
        bail!("Invalid symbol {:?} at position {}, only ACGT is supported", symbol as char, index);
    }
    Ok(())
}

/// Converts a phred quality to the substitution cost used in the alignment.
pub fn phred_to_log_error_prob(phred: u8) -> f64 {
    -(phred as f64) / 10.0
}

/// A read with a log error probability for every base
#[derive(Clone, Debug, PartialEq)]
pub struct QualifiedRead {
    /// The read bases, upper-case ACGT
    sequence: Vec<u8>,
    /// Substitution cost for each base
    log_error_probs: Vec<f64>
}

impl QualifiedRead {
    /// Creates a read from pre-computed log error probabilities.
    /// Lower-case bases are accepted and stored upper-case.
    /// # Arguments
    /// * `sequence` - the read bases
    /// * `log_error_probs` - one value per base
    /// # Errors
    /// * if the lengths differ or the sequence has non-ACGT symbols
    pub fn from_log_error_probs(sequence: &[u8], log_error_probs: Vec<f64>) -> Result<QualifiedRead, Box<dyn std::error::Error>> {
        if sequence.len() != log_error_probs.len() {
            bail!("Read has {} bases but {} quality values", sequence.len(), log_error_probs.len());
        }
        let sequence = sequence.to_ascii_uppercase();
        validate_sequence(&sequence)?;
        Ok(QualifiedRead {
            sequence,
            log_error_probs
        })
    }

    /// Creates a read from numeric phred qualities.
    /// # Errors
    /// * if the lengths differ or the sequence has non-ACGT symbols
    pub fn from_phred(sequence: &[u8], phred: &[u8]) -> Result<QualifiedRead, Box<dyn std::error::Error>> {
        let log_error_probs = phred.iter()
            .map(|&q| phred_to_log_error_prob(q))
            .collect();
        Self::from_log_error_probs(sequence, log_error_probs)
    }

    /// Creates a read from a FASTQ-style quality string (phred+33).
    /// # Errors
    /// * if a quality character is below the phred+33 range
    /// * if the lengths differ or the sequence has non-ACGT symbols
    pub fn from_fastq_quality(sequence: &[u8], quality: &[u8]) -> Result<QualifiedRead, Box<dyn std::error::Error>> {
        let mut phred = Vec::with_capacity(quality.len());
        for &q in quality.iter() {
            if q < FASTQ_PHRED_OFFSET {
                bail!("Quality character {:?} is not valid phred+33", q as char);
            }
            phred.push(q - FASTQ_PHRED_OFFSET);
        }
        Self::from_phred(sequence, &phred)
    }

    // Getters
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    pub fn log_error_probs(&self) -> &[f64] {
        &self.log_error_probs
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_phred() {
        let read = QualifiedRead::from_phred(b"ACGT", &[30, 20, 10, 0]).unwrap();
        assert_eq!(read.sequence(), b"ACGT");
        assert_eq!(read.log_error_probs(), &[-3.0, -2.0, -1.0, -0.0]);
        assert_eq!(read.len(), 4);
        assert!(!read.is_empty());
    }

    #[test]
    fn test_from_fastq_quality() {
        // '?' = 63 = phred 30, '5' = 53 = phred 20
        let read = QualifiedRead::from_fastq_quality(b"acgt", b"??55").unwrap();
        assert_eq!(read.sequence(), b"ACGT");
        assert_eq!(read.log_error_probs(), &[-3.0, -3.0, -2.0, -2.0]);
        assert!(QualifiedRead::from_fastq_quality(b"A", b" ").is_err());
    }

    #[test]
    fn test_invalid() {
        assert!(QualifiedRead::from_phred(b"ACGT", &[30, 30]).is_err());
        assert!(QualifiedRead::from_phred(b"ACNT", &[30; 4]).is_err());
        assert!(validate_sequence(b"ACGT").is_ok());
        assert!(validate_sequence(b"AC-T").is_err());

        // empty reads are fine
        assert!(QualifiedRead::from_phred(b"", &[]).unwrap().is_empty());
    }
}
