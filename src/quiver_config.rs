/*!
Contains configuration information for the quiver refinement algorithm.
Typical usage is to the use the builder to construct the config, e.g.
```
use quiver_con::quiver_config::{QuiverConfig, QuiverConfigBuilder};
let config: QuiverConfig = QuiverConfigBuilder::default()
    .log_p_ins(-3.0)
    .log_p_del(-3.0)
    .bandwidth(Some(20))
    .build()
    .unwrap();
```
*/

use simple_error::bail;

/**
Contains configuration information for the quiver refinement algorithm.
Typical usage is to the use the builder to construct the config, e.g.
```
use quiver_con::quiver_config::{QuiverConfig, QuiverConfigBuilder};
let config: QuiverConfig = QuiverConfigBuilder::default()
    .min_dist(5)
    .max_iters(20)
    .build()
    .unwrap();
```
*/
#[derive(derive_builder::Builder, Clone, Debug)]
#[builder(default)]
pub struct QuiverConfig {
    /// Log-probability of an extra base in a read relative to the template, must be negative
    pub log_p_ins: f64,
    /// Log-probability of a template base missing from a read, must be negative
    pub log_p_del: f64,
    /// Fixed alignment bandwidth; if None, the bandwidth is derived from the length spread and re-derived every round
    pub bandwidth: Option<usize>,
    /// Minimum distance between two mutations accepted in the same round
    pub min_dist: usize,
    /// Maximum number of refinement rounds
    pub max_iters: usize,
    /// Rounds at or after this index accept only the single best mutation
    pub max_multi_iters: usize,
    /// Number of worker threads for alignment and scoring, 0 lets rayon decide
    pub num_threads: usize,
    /// If true, round progress is logged at info level instead of debug
    pub verbose: bool
}

impl Default for QuiverConfig {
    fn default() -> Self {
        Self {
            // equal gap penalties, a gap is as costly as a phred 20 substitution
            log_p_ins: -2.0,
            log_p_del: -2.0,
            // adaptive by default
            bandwidth: None,
            // far enough apart that accepted mutations do not interact through the band
            min_dist: 9,
            // in practice most inputs converge well before this
            max_iters: 100,
            // late rounds only take the best change so we do not oscillate
            max_multi_iters: 50,
            // whatever rayon picks
            num_threads: 0,
            verbose: false
        }
    }
}

impl QuiverConfig {
    /// Sanity checks the values that the builder cannot.
    /// # Errors
    /// * if either gap log-probability is not negative and finite
    /// * if a fixed bandwidth of 0 is requested
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if !(self.log_p_ins.is_finite() && self.log_p_ins < 0.0) {
            bail!("log_p_ins must be a finite negative value, but got {}", self.log_p_ins);
        }
        if !(self.log_p_del.is_finite() && self.log_p_del < 0.0) {
            bail!("log_p_del must be a finite negative value, but got {}", self.log_p_del);
        }
        if self.bandwidth == Some(0) {
            bail!("bandwidth must be at least 1");
        }
        Ok(())
    }
}
