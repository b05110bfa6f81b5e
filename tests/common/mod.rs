#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use chronicle_files::{ConventionMap, NamingConvention};
use time::Duration;

/// Monthly and daily folders holding ten-minute files.
pub fn ten_minute_convention() -> NamingConvention {
    NamingConvention::new(
        ["yyyy-MM", "yyyy-MM-dd"],
        "yyyy-MM-dd_HH-mm-ss'.dat'",
        Duration::minutes(10),
    )
}

/// Monthly folders holding one file per day.
pub fn daily_convention() -> NamingConvention {
    NamingConvention::new(["yyyy-MM"], "yyyy-MM-dd'.dat'", Duration::DAY)
}

pub fn streams(stream_id: &str, conventions: Vec<NamingConvention>) -> ConventionMap {
    let mut map = ConventionMap::new();
    map.insert(stream_id.to_string(), conventions);
    map
}

pub fn touch(root: &Path, relative: &str) -> PathBuf {
    write_bytes(root, relative, &[0u8; 8])
}

pub fn write_bytes(root: &Path, relative: &str, bytes: &[u8]) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("parent")).expect("create folders");
    fs::write(&path, bytes).expect("write file");
    path
}

/// Write little-endian f64 samples.
pub fn write_samples(root: &Path, relative: &str, values: &[f64]) -> PathBuf {
    let bytes: Vec<u8> = values.iter().flat_map(|value| value.to_le_bytes()).collect();
    write_bytes(root, relative, &bytes)
}

pub fn decode(data: &[u8]) -> Vec<f64> {
    data.chunks_exact(8)
        .map(|chunk| f64::from_le_bytes(chunk.try_into().expect("8 bytes")))
        .collect()
}

/// `count` samples counting up from `start`.
pub fn ramp(start: f64, count: usize) -> Vec<f64> {
    (0..count).map(|index| start + index as f64).collect()
}
