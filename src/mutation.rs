/*!
Single-base template mutations, their enumeration, and batch application.

# Example usage
```rust
use quiver_con::mutation::{apply_mutations, enumerate_mutations, Mutation, ScoredMutation};

let template = b"ACGT";
// 3 substitutions + 1 deletion + 4 insertions per position, plus 4 trailing insertions
assert_eq!(enumerate_mutations(template).count(), 4 * 8 + 4);

let batch = [
    ScoredMutation::new(Mutation::Insertion { position: 0, base: b'T' }, -1.0),
    // this position refers to the original template, it gets shifted after the insertion
    ScoredMutation::new(Mutation::Substitution { position: 3, base: b'A' }, -2.0)
];
assert_eq!(apply_mutations(template, &batch), b"TACGA".to_vec());
```
*/

/// The nucleotide alphabet, in the order candidates are enumerated
pub const ALPHABET: &[u8; 4] = b"ACGT";

/// A single-base edit to the template.
/// Positions always refer to the template the mutation was generated against.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Mutation {
    /// Replace the base at `position`
    Substitution { position: usize, base: u8 },
    /// Insert a base before `position`, `position` may equal the template length to append
    Insertion { position: usize, base: u8 },
    /// Remove the base at `position`
    Deletion { position: usize }
}

impl Mutation {
    pub fn position(&self) -> usize {
        match *self {
            Mutation::Substitution { position, .. } |
            Mutation::Insertion { position, .. } |
            Mutation::Deletion { position } => position
        }
    }

    /// Returns a copy of this mutation pointing at a new position.
    pub fn with_position(&self, position: usize) -> Mutation {
        match *self {
            Mutation::Substitution { base, .. } => Mutation::Substitution { position, base },
            Mutation::Insertion { base, .. } => Mutation::Insertion { position, base },
            Mutation::Deletion { .. } => Mutation::Deletion { position }
        }
    }

    /// How much this mutation moves the positions of everything after it.
    pub fn length_delta(&self) -> isize {
        match self {
            Mutation::Substitution { .. } => 0,
            Mutation::Insertion { .. } => 1,
            Mutation::Deletion { .. } => -1
        }
    }

    /// Applies this mutation to a template, returning the new template.
    /// # Panics
    /// * if the position is not valid for the template
    pub fn apply(&self, template: &[u8]) -> Vec<u8> {
        let mut result = Vec::with_capacity(template.len() + 1);
        match *self {
            Mutation::Substitution { position, base } => {
                assert!(position < template.len(), "substitution at {position} is past the template end");
                result.extend_from_slice(&template[..position]);
                result.push(base);
                result.extend_from_slice(&template[position + 1..]);
            },
            Mutation::Insertion { position, base } => {
                assert!(position <= template.len(), "insertion at {position} is past the template end");
                result.extend_from_slice(&template[..position]);
                result.push(base);
                result.extend_from_slice(&template[position..]);
            },
            Mutation::Deletion { position } => {
                assert!(position < template.len(), "deletion at {position} is past the template end");
                result.extend_from_slice(&template[..position]);
                result.extend_from_slice(&template[position + 1..]);
            }
        };
        result
    }
}

impl std::fmt::Display for Mutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Mutation::Substitution { position, base } => write!(f, "{position}:sub:{}", base as char),
            Mutation::Insertion { position, base } => write!(f, "{position}:ins:{}", base as char),
            Mutation::Deletion { position } => write!(f, "{position}:del")
        }
    }
}

/// A mutation paired with the total alignment score of the template after applying it
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredMutation {
    mutation: Mutation,
    score: f64
}

impl ScoredMutation {
    /// Constructor
    pub fn new(mutation: Mutation, score: f64) -> ScoredMutation {
        ScoredMutation {
            mutation,
            score
        }
    }

    // Getters
    pub fn mutation(&self) -> Mutation {
        self.mutation
    }

    pub fn score(&self) -> f64 {
        self.score
    }
}

/// Lazy, deterministic enumeration of every single-base mutation of a template.
/// For each position: substitutions to every other base, the deletion, then insertions of every base before it.
/// Insertions after the last base come at the very end.
#[derive(Clone, Debug)]
pub struct MutationIter<'a> {
    template: &'a [u8],
    position: usize,
    step: usize
}

impl Iterator for MutationIter<'_> {
    type Item = Mutation;

    fn next(&mut self) -> Option<Mutation> {
        let len = self.template.len();
        while self.position <= len {
            let (position, step) = (self.position, self.step);
            self.step += 1;

            if position == len {
                // trailing insertions only
                if step < ALPHABET.len() {
                    return Some(Mutation::Insertion { position, base: ALPHABET[step] });
                }
            } else {
                match step {
                    0..=3 => {
                        let base = ALPHABET[step];
                        if self.template[position] != base {
                            return Some(Mutation::Substitution { position, base });
                        }
                        continue;
                    },
                    4 => return Some(Mutation::Deletion { position }),
                    5..=8 => return Some(Mutation::Insertion { position, base: ALPHABET[step - 5] }),
                    _ => {}
                };
            }

            // this position is exhausted
            self.position += 1;
            self.step = 0;
        }
        None
    }
}

/// Enumerates all candidate mutations of `template`, see `MutationIter` for the order.
pub fn enumerate_mutations(template: &[u8]) -> MutationIter<'_> {
    MutationIter {
        template,
        position: 0,
        step: 0
    }
}

/// Resolves the positions of a batch of mutations as they will be applied in order.
/// Each entry is rewritten to the position it has in the template at the moment it gets applied.
/// Everything strictly after an applied insertion moves right by one, everything strictly after a deletion moves left by one.
/// # Arguments
/// * `batch` - mutations whose positions all refer to the same original template
pub fn resolve_positions(batch: &[Mutation]) -> Vec<Mutation> {
    let mut pending: Vec<Mutation> = batch.to_vec();
    for index in 0..pending.len() {
        let applied = pending[index];
        let delta = applied.length_delta();
        if delta == 0 {
            continue;
        }
        for later in pending[index + 1..].iter_mut() {
            if later.position() > applied.position() {
                let shifted = (later.position() as isize + delta) as usize;
                *later = later.with_position(shifted);
            }
        }
    }
    pending
}

/// Applies a batch of mutations to the template, in the given order.
/// # Arguments
/// * `template` - the template the mutations were scored against
/// * `mutations` - the batch, typically the output of candidate selection
pub fn apply_mutations(template: &[u8], mutations: &[ScoredMutation]) -> Vec<u8> {
    let batch: Vec<Mutation> = mutations.iter().map(|m| m.mutation()).collect();
    resolve_positions(&batch).iter()
        .fold(template.to_vec(), |current, mutation| mutation.apply(&current))
}
