#![allow(dead_code)]

use parquetify::{Part, read_part};
use std::fs;
use std::path::{Path, PathBuf};

/// Monthly mean sunspot numbers, January 1749 to April 1751.
pub const SUNSPOTS: [f64; 28] = [
    58.0, 62.6, 70.0, 55.7, 85.0, 83.5, 94.8, 66.3, 75.9, 75.5, 158.6, 85.2, 73.3, 75.9, 89.2,
    88.3, 90.0, 100.0, 85.4, 103.0, 91.2, 65.7, 63.3, 75.4, 70.0, 43.5, 45.3, 56.4,
];

pub const SUNSPOTS_SUM: f64 = 2187.0;

pub fn sunspots_csv() -> String {
    let mut out = String::from("Month,Sunspots\n");
    for (i, value) in SUNSPOTS.iter().enumerate() {
        let year = 1749 + i / 12;
        let month = i % 12 + 1;
        out.push_str(&format!("{year}-{month:02},{value:.1}\n"));
    }
    out
}

pub fn write_file(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, contents)?;
    Ok(path)
}

pub fn write_sunspots(dir: &Path) -> anyhow::Result<PathBuf> {
    write_file(dir, "sunspots.csv", sunspots_csv())
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

/// Sum of `column` over every part, read back from disk.
pub fn sum_column(parts: &[Part], column: &str) -> anyhow::Result<f64> {
    let mut total = 0.0;
    for part in parts {
        let chunk = read_part(&part.path)?;
        total += chunk.f64_values(column)?.into_iter().flatten().sum::<f64>();
    }
    Ok(total)
}

pub fn rows_per_part(parts: &[Part]) -> Vec<usize> {
    parts.iter().map(|p| p.rows).collect()
}

/// File names currently in `dir`, sorted.
pub fn list_dir(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut names = Vec::new();
    if dir.exists() {
        for entry in fs::read_dir(dir)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
