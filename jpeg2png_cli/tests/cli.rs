// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::{
    path::Path,
    process::{Command, Output},
};

use jpeg2png_test_utils::JpegBuilder;

fn jpeg2png(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_jpeg2png"))
        .args(args)
        .output()
        .unwrap()
}

fn write_gray_jpeg(path: &Path) {
    let builder = JpegBuilder::new(20, 12).component(1, 1, [4; 64]);
    let mut levels = builder.empty_levels();
    for (b, block) in levels[0].chunks_exact_mut(64).enumerate() {
        block[0] = (b as i16 * 7) % 40 - 20;
        block[1] = 3;
    }
    std::fs::write(path, builder.baseline(&levels)).unwrap();
}

fn write_color_jpeg(path: &Path) {
    let builder = JpegBuilder::new(24, 20)
        .component(2, 2, [3; 64])
        .component(1, 1, [5; 64])
        .component(1, 1, [5; 64]);
    let mut levels = builder.empty_levels();
    for component in levels.iter_mut() {
        for (b, block) in component.chunks_exact_mut(64).enumerate() {
            block[0] = (b as i16 * 5) % 30 - 15;
            block[8] = -2;
        }
    }
    std::fs::write(path, builder.progressive(&levels)).unwrap();
}

fn read_png(path: &Path) -> (png::OutputInfo, Vec<u8>) {
    let data = std::fs::read(path).unwrap();
    let decoder = png::Decoder::new(std::io::Cursor::new(data));
    let mut reader = decoder.read_info().unwrap();
    let (width, height) = reader.info().size();
    let mut buf = vec![0; width as usize * height as usize * 3 * 2];
    let info = reader.next_frame(&mut buf).unwrap();
    buf.truncate(info.buffer_size());
    (info, buf)
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn help_prints_usage_and_fails() {
    for flag in ["-h", "-?", "--help"] {
        let output = jpeg2png(&[flag]);
        assert!(!output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("--second-order-weight"), "{stdout}");
    }
}

#[test]
fn wrong_positional_count_fails() {
    assert!(!jpeg2png(&[]).status.success());
    assert!(!jpeg2png(&["only.jpg"]).status.success());
    assert!(!jpeg2png(&["a.jpg", "b.png", "c.png"]).status.success());
}

#[test]
fn restores_gray_image() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.jpg");
    let output = dir.path().join("out.png");
    write_gray_jpeg(&input);

    let result = jpeg2png(&[path_str(&input), path_str(&output), "-q", "-i", "5"]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));
    let (info, data) = read_png(&output);
    assert_eq!((info.width, info.height), (20, 12));
    assert_eq!(info.color_type, png::ColorType::Grayscale);
    assert_eq!(info.bit_depth, png::BitDepth::Sixteen);
    assert_eq!(data.len(), 20 * 12 * 2);
    // Only the output file is left in the directory.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn restores_color_image_with_log() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.jpg");
    let output = dir.path().join("out.png");
    let log = dir.path().join("log.csv");
    write_color_jpeg(&input);

    let result = jpeg2png(&[
        path_str(&input),
        path_str(&output),
        "--quiet",
        "-w",
        "0.5",
        "-p",
        "0.01,0,0",
        "-i",
        "4,2,3",
        "-c",
        path_str(&log),
    ]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));
    let (info, _) = read_png(&output);
    assert_eq!((info.width, info.height), (24, 20));
    assert_eq!(info.color_type, png::ColorType::Rgb);

    let text = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "channel,iteration,energy,residual,tv1,tv2,fidelity");
    assert_eq!(lines.len(), 1 + 4 + 2 + 3);
    for channel in 0..3 {
        let prefix = format!("{channel},");
        let steps = lines[1..].iter().filter(|l| l.starts_with(&prefix)).count();
        assert_eq!(steps, [4, 2, 3][channel]);
    }
}

#[test]
fn bad_weight_count_is_rejected_before_io() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.jpg");
    let output = dir.path().join("out.png");
    write_gray_jpeg(&input);

    let result = jpeg2png(&[path_str(&input), path_str(&output), "-w", "0.5,0.2"]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("expected 1 or 3 values"));
    assert!(!output.exists());

    let result = jpeg2png(&[path_str(&input), path_str(&output), "-p", "-1"]);
    assert!(!result.status.success());
    assert!(!output.exists());
}

#[test]
fn missing_input_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("missing.jpg");
    let output = dir.path().join("out.png");
    let result = jpeg2png(&[path_str(&input), path_str(&output)]);
    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("could not open input file"), "{stderr}");
    assert!(stderr.contains("missing.jpg"), "{stderr}");
    assert!(!output.exists());
}

#[test]
fn unwritable_output_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.jpg");
    let output = dir.path().join("no_such_dir").join("out.png");
    write_gray_jpeg(&input);
    let result = jpeg2png(&[path_str(&input), path_str(&output)]);
    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("could not open output file"), "{stderr}");
}

#[test]
fn corrupt_input_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.jpg");
    let output = dir.path().join("out.png");
    let log = dir.path().join("log.csv");
    std::fs::write(&input, b"not a jpeg").unwrap();
    let result = jpeg2png(&[
        path_str(&input),
        path_str(&output),
        "-q",
        "-c",
        path_str(&log),
    ]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("could not decode"));
    assert!(!output.exists());
    assert!(!log.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn zero_threads_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.jpg");
    let output = dir.path().join("out.png");
    write_gray_jpeg(&input);
    let result = jpeg2png(&[path_str(&input), path_str(&output), "-t", "0"]);
    assert!(!result.status.success());
    assert!(!output.exists());
}

#[cfg(feature = "tracing-subscriber")]
#[test]
fn failure_is_reported_once_with_logging() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.jpg");
    let output = dir.path().join("out.png");
    std::fs::write(&input, b"not a jpeg").unwrap();
    let result = Command::new(env!("CARGO_BIN_EXE_jpeg2png"))
        .args([path_str(&input), path_str(&output), "-q"])
        .env("RUST_LOG", "debug")
        .output()
        .unwrap();
    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(!stderr.contains("ERROR"), "{stderr}");
    assert_eq!(stderr.matches("could not decode").count(), 1, "{stderr}");
}
