// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::{fmt::Display, num::NonZeroUsize, path::PathBuf, str::FromStr};

use clap::{ArgAction, Parser};
use color_eyre::eyre::{Result, WrapErr, eyre};
use jpeg2png::{
    ChannelWeights, RestoreOptions,
    options::{DEFAULT_ITERATIONS, DEFAULT_LUMA_WEIGHT, DEFAULT_PWEIGHT},
};

/// One value for luma, optionally followed by values for Cb and Cr.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelList<T> {
    One(T),
    Three([T; 3]),
}

impl<T: FromStr> FromStr for ChannelList<T>
where
    T::Err: Display,
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|v| v.trim().parse().map_err(|e| format!("`{v}`: {e}")))
            .collect::<Result<Vec<T>, _>>()?;
        match <[T; 3]>::try_from(values) {
            Ok(values) => Ok(ChannelList::Three(values)),
            Err(mut values) if values.len() == 1 => Ok(ChannelList::One(values.remove(0))),
            Err(values) => Err(format!("expected 1 or 3 values, got {}", values.len())),
        }
    }
}

fn parse_list<T: FromStr>(s: &str) -> Result<ChannelList<T>, String>
where
    T::Err: Display,
{
    s.parse()
}

impl<T: Copy> ChannelList<T> {
    /// A single value applies to every channel.
    fn broadcast(&self) -> [T; 3] {
        match *self {
            ChannelList::One(v) => [v; 3],
            ChannelList::Three(values) => values,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "jpeg2png",
    about = "Smooths a JPEG image within its quantization constraints and saves it as PNG",
    disable_help_flag = true
)]
pub struct Opt {
    /// Input JPEG file
    pub input: PathBuf,

    /// Output PNG file
    pub output: PathBuf,

    /// Second order (TVG) weight; higher values give smoother transitions with less
    /// staircasing. 0 means plain total variation and is faster. Chroma defaults to 0
    #[arg(
        short = 'w',
        long = "second-order-weight",
        value_name = "weight[,weight_cb,weight_cr]",
        value_parser = parse_list::<f32>,
        allow_negative_numbers = true
    )]
    pub weight: Option<ChannelList<f32>>,

    /// DCT coefficient distance weight; higher values stay closer to the source
    /// JPEG. 0 ignores it and is faster. A single value applies to all channels
    #[arg(
        short = 'p',
        long = "probability-weight",
        value_name = "pweight[,pweight_cb,pweight_cr]",
        value_parser = parse_list::<f32>,
        allow_negative_numbers = true
    )]
    pub pweight: Option<ChannelList<f32>>,

    /// Number of optimization steps. A single value applies to all channels
    #[arg(
        short = 'i',
        long = "iterations",
        value_name = "iterations[,iterations_cb,iterations_cr]",
        value_parser = parse_list::<usize>,
        allow_negative_numbers = true
    )]
    pub iterations: Option<ChannelList<usize>>,

    /// Don't show the progress bar
    #[arg(short, long)]
    pub quiet: bool,

    /// Maximum number of worker threads [default: number of CPUs]
    #[arg(short, long, allow_negative_numbers = true)]
    pub threads: Option<i64>,

    /// Write the optimization log to this file as CSV
    #[arg(short = 'c', long = "csv-log", value_name = "csv_log")]
    pub csv_log: Option<PathBuf>,

    /// Print this help and exit
    #[arg(short = 'h', long = "help", short_alias = '?', action = ArgAction::SetTrue)]
    pub help: bool,
}

impl Opt {
    /// Checks the numeric options and collects them. Runs before any file is touched.
    pub fn restore_options(&self) -> Result<RestoreOptions> {
        let weights = match &self.weight {
            Some(ChannelList::One(w)) => [*w, 0.0, 0.0],
            Some(ChannelList::Three(w)) => *w,
            None => [DEFAULT_LUMA_WEIGHT, 0.0, 0.0],
        };
        let pweights = self
            .pweight
            .as_ref()
            .map_or([DEFAULT_PWEIGHT; 3], ChannelList::broadcast);
        let iterations = self
            .iterations
            .as_ref()
            .map_or([DEFAULT_ITERATIONS; 3], ChannelList::broadcast);

        let mut options = RestoreOptions::default();
        for c in 0..3 {
            options.channels[c] = ChannelWeights::new(weights[c], pweights[c], iterations[c])
                .wrap_err_with(|| format!("invalid settings for channel {c}"))?;
        }
        if let Some(threads) = self.threads {
            if !cfg!(feature = "parallel") {
                return Err(eyre!("this version is compiled without support for threads"));
            }
            let threads = usize::try_from(threads)
                .ok()
                .and_then(NonZeroUsize::new)
                .ok_or_else(|| eyre!("invalid number of threads: {threads}"))?;
            options.threads = Some(threads);
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> clap::error::Result<Opt> {
        Opt::try_parse_from(["jpeg2png", "in.jpg", "out.png"].iter().chain(args))
    }

    fn weights(args: &[&str]) -> Result<[f32; 3]> {
        let options = parse(args)?.restore_options()?;
        Ok(options.channels.map(|c| c.weight()))
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let opt = parse(&[])?;
        assert!(!opt.quiet && !opt.help);
        assert_eq!(opt.restore_options()?, RestoreOptions::default());
        Ok(())
    }

    #[test]
    fn test_single_weight_is_luma_only() -> Result<()> {
        assert_eq!(weights(&["-w", "0.5"])?, [0.5, 0.0, 0.0]);
        assert_eq!(weights(&["-w", "0.5,0.2,0.2"])?, [0.5, 0.2, 0.2]);
        assert_eq!(
            weights(&["--second-order-weight", "1,0,0.25"])?,
            [1.0, 0.0, 0.25]
        );
        Ok(())
    }

    #[test]
    fn test_wrong_value_count() {
        let err = parse(&["-w", "0.5,0.2"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(parse(&["-p", "1,2,3,4"]).is_err());
        assert!(parse(&["-i", ""]).is_err());
    }

    #[test]
    fn test_broadcast() -> Result<()> {
        let options = parse(&["-p", "0.25", "-i", "7"])?.restore_options()?;
        for channel in &options.channels {
            assert_eq!(channel.pweight(), 0.25);
            assert_eq!(channel.iterations(), 7);
        }
        let options = parse(&["-i", "1,2,3"])?.restore_options()?;
        assert_eq!(options.channels.map(|c| c.iterations()), [1, 2, 3]);
        assert_eq!(options.total_iterations(3), 6);
        Ok(())
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(parse(&["-w", "-1"]).unwrap().restore_options().is_err());
        assert!(parse(&["-p", "0.1,nan,0.1"]).unwrap().restore_options().is_err());
        assert!(parse(&["-i", "-3"]).is_err());
        assert!(parse(&["-w", "abc"]).is_err());
        assert!(parse(&["-t", "0"]).unwrap().restore_options().is_err());
        assert!(parse(&["-t", "-2"]).unwrap().restore_options().is_err());
    }

    #[test]
    #[cfg(feature = "parallel")]
    fn test_threads() -> Result<()> {
        let options = parse(&["-t", "3"])?.restore_options()?;
        assert_eq!(options.threads.map(NonZeroUsize::get), Some(3));
        Ok(())
    }

    #[test]
    #[cfg(not(feature = "parallel"))]
    fn test_threads_unsupported() {
        let err = parse(&["-t", "3"]).unwrap().restore_options().unwrap_err();
        assert!(err.to_string().contains("without support for threads"));
    }

    #[test]
    fn test_flags() -> Result<()> {
        let opt = parse(&["-q", "-c", "log.csv", "-?"])?;
        assert!(opt.quiet && opt.help);
        assert_eq!(opt.csv_log, Some(PathBuf::from("log.csv")));
        assert!(parse(&["--help"])?.help);
        assert!(Opt::try_parse_from(["jpeg2png", "in.jpg"]).is_err());
        assert!(Opt::try_parse_from(["jpeg2png", "a", "b", "c"]).is_err());
        Ok(())
    }
}
