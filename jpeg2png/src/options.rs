// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::num::NonZeroUsize;

use crate::error::{Error, Result};

/// Default second-order weight for luma. Chroma defaults to 0.
pub const DEFAULT_LUMA_WEIGHT: f32 = 0.3;
/// Default probabilistic fidelity weight, for every channel.
pub const DEFAULT_PWEIGHT: f32 = 0.001;
/// Default number of solver steps, for every channel.
pub const DEFAULT_ITERATIONS: usize = 50;

/// Regularization settings of one channel. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelWeights {
    weight: f32,
    pweight: f32,
    iterations: usize,
}

impl ChannelWeights {
    /// `weight` scales the second-order term, `pweight` the probabilistic
    /// fidelity term. Both must be finite and non-negative.
    pub fn new(weight: f32, pweight: f32, iterations: usize) -> Result<ChannelWeights> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::InvalidWeight("second order", weight));
        }
        if !pweight.is_finite() || pweight < 0.0 {
            return Err(Error::InvalidWeight("probability", pweight));
        }
        Ok(ChannelWeights {
            weight,
            pweight,
            iterations,
        })
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn pweight(&self) -> f32 {
        self.pweight
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub const fn default_luma() -> ChannelWeights {
        ChannelWeights {
            weight: DEFAULT_LUMA_WEIGHT,
            pweight: DEFAULT_PWEIGHT,
            iterations: DEFAULT_ITERATIONS,
        }
    }

    pub const fn default_chroma() -> ChannelWeights {
        ChannelWeights {
            weight: 0.0,
            pweight: DEFAULT_PWEIGHT,
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// Configuration of a whole restoration, passed by reference to every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreOptions {
    /// Settings for Y, Cb and Cr, in that order. Grayscale images use the first.
    pub channels: [ChannelWeights; 3],
    /// Worker threads for solving channels concurrently. `None` uses one per CPU.
    pub threads: Option<NonZeroUsize>,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            channels: [
                ChannelWeights::default_luma(),
                ChannelWeights::default_chroma(),
                ChannelWeights::default_chroma(),
            ],
            threads: None,
        }
    }
}

impl RestoreOptions {
    /// Total number of solver steps over `num_channels` channels.
    pub fn total_iterations(&self, num_channels: usize) -> usize {
        self.channels
            .iter()
            .take(num_channels)
            .map(|c| c.iterations)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_defaults() {
        let options = RestoreOptions::default();
        assert_eq!(options.channels[0].weight(), 0.3);
        assert_eq!(options.channels[1].weight(), 0.0);
        assert_eq!(options.channels[2].weight(), 0.0);
        for channel in &options.channels {
            assert_eq!(channel.pweight(), 0.001);
            assert_eq!(channel.iterations(), 50);
        }
        assert_eq!(options.total_iterations(3), 150);
        assert_eq!(options.total_iterations(1), 50);
    }

    #[test]
    fn test_rejects_bad_weights() {
        assert!(matches!(
            ChannelWeights::new(-0.1, 0.0, 1),
            Err(Error::InvalidWeight(_, _))
        ));
        assert!(ChannelWeights::new(0.0, -1.0, 1).is_err());
        assert!(ChannelWeights::new(f32::NAN, 0.0, 1).is_err());
        assert!(ChannelWeights::new(0.0, f32::INFINITY, 1).is_err());
        assert!(ChannelWeights::new(0.0, 0.0, 0).is_ok());
    }
}
