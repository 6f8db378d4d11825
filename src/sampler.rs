//! Sampler
//!
//! Strategies for drawing the rows of a bagged root before growing a tree.
use crate::errors::SortForestError;
use crate::utils::validate_float_parameter;
use rand::rngs::StdRng;
use rand::Rng;

// A sampler can be used to subset the data prior to growing a new tree.
pub trait Sampler {
    /// Sample the data, returning a tuple, where the first item is the samples
    /// chosen for training, and the second are the samples excluded.
    fn sample(&mut self, rng: &mut StdRng, index: &[usize]) -> (Vec<usize>, Vec<usize>);
}

/// Keeps each row independently with probability `subsample`.
pub struct RandomSampler {
    subsample: f64,
}

impl RandomSampler {
    pub fn new(subsample: f64) -> Result<Self, SortForestError> {
        validate_float_parameter(subsample, 0.0, 1.0, "subsample")?;
        Ok(RandomSampler { subsample })
    }
}

impl Sampler for RandomSampler {
    fn sample(&mut self, rng: &mut StdRng, index: &[usize]) -> (Vec<usize>, Vec<usize>) {
        let subsample = self.subsample;
        let mut chosen = Vec::new();
        let mut excluded = Vec::new();
        for i in index {
            if rng.gen::<f64>() < subsample {
                chosen.push(*i);
            } else {
                excluded.push(*i)
            }
        }
        (chosen, excluded)
    }
}
