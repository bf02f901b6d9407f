// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#![deny(unsafe_code)]
pub mod bit_reader;
pub mod box_transform;
pub mod coefficients;
pub mod color;
pub mod error;
pub mod image;
pub mod jpeg;
pub mod options;
pub mod restore;
pub mod solver;
pub mod telemetry;
pub mod upsample;
pub mod util;

pub use coefficients::CoefficientStore;
pub use error::{Error, Result};
pub use image::Plane;
pub use options::{ChannelWeights, RestoreOptions};
pub use restore::{RestoredImage, restore, restore_jpeg};
pub use telemetry::{IterationRecord, NoTelemetry, RecordingTelemetry, TelemetrySink};
pub use upsample::ChromaUpsampler;

/// Added to the luma plane after solving to move it back to the `[0, 255]` range.
pub const LUMA_OFFSET: f32 = 128.0;
