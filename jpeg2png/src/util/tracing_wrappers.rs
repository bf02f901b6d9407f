// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Logging macros that compile to nothing unless the `tracing` feature is enabled.
//!
//! Only the format-string form (`debug!("x = {x}")`) is supported, so that the
//! disabled variants can still type-check their arguments.

#[cfg(feature = "tracing")]
pub use tracing::{debug, info, instrument, trace, warn};

#[cfg(not(feature = "tracing"))]
macro_rules! noop_log {
    ($($arg:tt)+) => {{
        if false {
            let _ = ::std::format_args!($($arg)+);
        }
    }};
}

// Aliased: importing a `macro_rules! warn` by name is ambiguous with `#[warn]`.
#[cfg(not(feature = "tracing"))]
#[allow(unused_imports)]
pub(crate) use {
    noop_log as debug, noop_log as info, noop_log as trace, noop_log as warn,
};
