use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn utc_compact_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("failed to open file for hashing: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];

    loop {
        let count = file
            .read(&mut buf)
            .with_context(|| format!("failed to read file for hashing: {}", path.display()))?;
        if count == 0 {
            break;
        }
        hasher.update(&buf[..count]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;

    let mut file = File::create(path)
        .with_context(|| format!("failed to create json file: {}", path.display()))?;
    file.write_all(&data)
        .with_context(|| format!("failed to write json file: {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("failed to finalize json file: {}", path.display()))?;

    Ok(())
}

pub fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_field_passes_plain_values_through() {
        assert_eq!(csv_field("img_001.png"), "img_001.png");
        assert_eq!(csv_field("87.5"), "87.5");
    }

    #[test]
    fn csv_field_quotes_delimiters_and_quotes() {
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn sanitize_file_stem_replaces_path_separators() {
        assert_eq!(
            sanitize_file_stem("llava-hf/llava-1.5-7b-hf"),
            "llava-hf-llava-1.5-7b-hf"
        );
        assert_eq!(sanitize_file_stem("model name"), "model-name");
    }

    #[test]
    fn sha256_file_matches_known_vector() {
        let path = std::env::temp_dir().join(format!("iqabench-sha-abc-{}", std::process::id()));
        fs::write(&path, b"abc").unwrap();

        let digest = sha256_file(&path).unwrap();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn sha256_file_is_stable_for_identical_bytes() {
        let base = std::env::temp_dir();
        let first = base.join(format!("iqabench-sha-a-{}", std::process::id()));
        let second = base.join(format!("iqabench-sha-b-{}", std::process::id()));
        let contents = br#"{"models": [], "datasets": []}"#;
        fs::write(&first, contents).unwrap();
        fs::write(&second, contents).unwrap();

        assert_eq!(sha256_file(&first).unwrap(), sha256_file(&second).unwrap());

        fs::write(&second, b"{}").unwrap();
        assert_ne!(sha256_file(&first).unwrap(), sha256_file(&second).unwrap());

        let _ = fs::remove_file(&first);
        let _ = fs::remove_file(&second);
    }
}
