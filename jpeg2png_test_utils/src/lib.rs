// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

pub mod jpeg;

pub use jpeg::{JpegBuilder, ScanSpec, ZIGZAG_TO_NATURAL};

#[macro_export]
macro_rules! assert_almost_eq {
    ($left:expr, $right:expr, $max_error:expr $(,)?) => {
        match (&$left, &$right) {
            (left_val, right_val) => {
                let diff = if *left_val > *right_val {
                    *left_val - *right_val
                } else {
                    *right_val - *left_val
                };
                if !(diff <= $max_error) {
                    panic!(
                        "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n max_error: `{:?}`",
                        left_val, right_val, $max_error
                    );
                }
            }
        }
    };
}

/// Checks that every sample of `$values` lies in `[$lo, $hi]` (inclusive, with slack `$eps`).
#[macro_export]
macro_rules! assert_all_within {
    ($values:expr, $lo:expr, $hi:expr, $eps:expr $(,)?) => {
        for (index, value) in $values.iter().enumerate() {
            let (lo, hi) = ($lo[index], $hi[index]);
            if !(*value >= lo - $eps && *value <= hi + $eps) {
                panic!(
                    "assertion failed: value[{}] = `{:?}` outside `[{:?}, {:?}]` (eps `{:?}`)",
                    index, value, lo, hi, $eps
                );
            }
        }
    };
}
