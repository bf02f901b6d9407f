// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::process::ExitCode;

use clap::{CommandFactory, Parser, error::ErrorKind};
use jpeg2png_cli::{args::Opt, run};

fn usage() -> ExitCode {
    println!("{}", Opt::command().render_long_help());
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    #[cfg(feature = "tracing-subscriber")]
    {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(EnvFilter::from_default_env())
            .init();
    }
    if let Err(err) = color_eyre::install() {
        eprintln!("jpeg2png: {err:#}");
        return ExitCode::FAILURE;
    }

    let opt = match Opt::try_parse() {
        Ok(opt) if opt.help => return usage(),
        Ok(opt) => opt,
        Err(err) if matches!(err.kind(), ErrorKind::ValueValidation | ErrorKind::InvalidValue) => {
            let _ = err.print();
            return ExitCode::FAILURE;
        }
        Err(_) => return usage(),
    };

    match run(&opt) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("jpeg2png: {err:#}");
            ExitCode::FAILURE
        }
    }
}
