//! Merge raw streaming-history exports into cleaned, size-bounded chunks.
//!
//! Reads every `*.json` file directly inside a directory, strips the
//! personally identifying columns, drops plays without a track URI and
//! writes the survivors back into the same directory as
//! `<stem>_1.json`, `<stem>_2.json`, ... with no chunk larger than the
//! configured byte limit (a single oversized record still gets its own
//! chunk).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::Serialize;
use serde_json::{Map, Value};
use walkdir::WalkDir;

/// Columns that identify the listener rather than the listening.
pub const DEFAULT_DROP_COLUMNS: &[&str] = &["ip_addr", "conn_country", "platform", "device_info", "offline_timestamp"];

/// Column whose absence makes a record useless.
const TRACK_URI_FIELD: &str = "spotify_track_uri";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleanOptions {
    pub drop_columns: Vec<String>,
    pub max_chunk_mb: u64,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            drop_columns: DEFAULT_DROP_COLUMNS.iter().map(|c| c.to_string()).collect(),
            max_chunk_mb: 65,
        }
    }
}

impl CleanOptions {
    fn max_chunk_bytes(&self) -> usize {
        (self.max_chunk_mb as usize).saturating_mul(1024 * 1024)
    }
}

#[derive(Debug, Default)]
pub struct CleanResult {
    pub files_read: usize,
    pub files_skipped: usize,
    pub records_kept: usize,
    pub records_dropped: usize,
    pub outputs: Vec<PathBuf>,
}

/// Clean every export in `input_dir` and write the chunks next to them.
pub fn clean_exports(input_dir: &Path, output_name: &str, opts: &CleanOptions) -> Result<CleanResult> {
    let stem = Path::new(output_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("cleaned")
        .to_string();
    let chunk_prefix = format!("{stem}_");

    let mut inputs: Vec<PathBuf> = WalkDir::new(input_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        // Output of an earlier run is not input
        .filter(|p| {
            !p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&chunk_prefix))
        })
        .collect();
    inputs.sort();

    let mut result = CleanResult::default();
    let mut kept: Vec<Map<String, Value>> = Vec::new();

    for path in &inputs {
        let records = match read_records(path) {
            Ok(records) => records,
            Err(e) => {
                log::warn!("Skipping {}: {:#}", path.display(), e);
                result.files_skipped += 1;
                continue;
            }
        };
        result.files_read += 1;

        for record in records {
            match clean_record(record, &opts.drop_columns) {
                Some(r) => kept.push(r),
                None => result.records_dropped += 1,
            }
        }
    }

    if result.files_read == 0 {
        log::warn!("No data files found in {}", input_dir.display());
        return Ok(result);
    }

    result.records_kept = kept.len();
    for (idx, chunk) in chunk_records(kept, opts.max_chunk_bytes())?.iter().enumerate() {
        let out = input_dir.join(format!("{stem}_{}.json", idx + 1));
        write_chunk(&out, chunk).with_context(|| format!("Failed to write {}", out.display()))?;
        log::info!("Written {} records to {}", chunk.len(), out.display());
        result.outputs.push(out);
    }

    Ok(result)
}

/// Records of one export file: a bare array, or `{"records": [...]}`.
fn read_records(path: &Path) -> Result<Vec<Value>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("records") {
            Some(Value::Array(items)) => Ok(items),
            _ => anyhow::bail!("{} has no record array", path.display()),
        },
        _ => anyhow::bail!("{} is not a record array", path.display()),
    }
}

/// Strip `drop_columns`; `None` if the record is not an object or has no
/// track URI.
fn clean_record(record: Value, drop_columns: &[String]) -> Option<Map<String, Value>> {
    let Value::Object(mut map) = record else {
        return None;
    };
    match map.get(TRACK_URI_FIELD) {
        Some(Value::String(uri)) if !uri.is_empty() => {}
        _ => return None,
    }
    for column in drop_columns {
        map.remove(column);
    }
    Some(map)
}

/// Split records into chunks whose serialized size stays under `max_bytes`.
fn chunk_records(records: Vec<Map<String, Value>>, max_bytes: usize) -> Result<Vec<Vec<Map<String, Value>>>> {
    let mut chunks = Vec::new();
    let mut chunk = Vec::new();
    let mut chunk_bytes = 0usize;

    for record in records {
        let bytes = serde_json::to_string(&record)?.len();
        if chunk_bytes + bytes > max_bytes && !chunk.is_empty() {
            chunks.push(std::mem::take(&mut chunk));
            chunk_bytes = 0;
        }
        chunk.push(record);
        chunk_bytes += bytes;
    }
    if !chunk.is_empty() {
        chunks.push(chunk);
    }

    Ok(chunks)
}

fn write_chunk(path: &Path, chunk: &[Map<String, Value>]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
    chunk.serialize(&mut ser)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn record(uri: Option<&str>, pad: usize) -> Value {
        json!({
            "ts": "2024-01-01T00:00:00Z",
            "ms_played": 1000,
            "spotify_track_uri": uri,
            "ip_addr": "10.0.0.1",
            "platform": "linux",
            "master_metadata_track_name": "x".repeat(pad),
        })
    }

    #[test]
    fn test_clean_record() {
        let cols: Vec<String> = DEFAULT_DROP_COLUMNS.iter().map(|c| c.to_string()).collect();
        let cleaned = clean_record(record(Some("spotify:track:a"), 1), &cols).unwrap();
        assert!(!cleaned.contains_key("ip_addr"));
        assert!(!cleaned.contains_key("platform"));
        assert!(cleaned.contains_key("ms_played"));

        assert!(clean_record(record(None, 1), &cols).is_none());
        assert!(clean_record(record(Some(""), 1), &cols).is_none());
        assert!(clean_record(json!("string"), &cols).is_none());
    }

    #[test]
    fn test_chunking_respects_limit() {
        let cols = Vec::new();
        let records: Vec<Map<String, Value>> = (0..10)
            .map(|_| clean_record(record(Some("u"), 100), &cols).unwrap())
            .collect();
        let one = serde_json::to_string(&records[0]).unwrap().len();

        let chunks = chunk_records(records.clone(), one * 3).unwrap();
        assert_eq!(chunks.iter().map(Vec::len).collect::<Vec<_>>(), vec![3, 3, 3, 1]);

        // A record bigger than the limit still gets written
        let chunks = chunk_records(records, 1).unwrap();
        assert_eq!(chunks.len(), 10);
    }

    #[test]
    fn test_clean_exports_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Streaming_History_Audio_2023.json"),
            serde_json::to_string(&json!([record(Some("spotify:track:a"), 1), record(None, 1)])).unwrap(),
        )
        .unwrap();
        fs::write(
            dir.path().join("Streaming_History_Audio_2024.json"),
            serde_json::to_string(&json!({ "records": [record(Some("spotify:track:b"), 1)] })).unwrap(),
        )
        .unwrap();
        fs::write(dir.path().join("broken.json"), "{").unwrap();
        // Leftover from an earlier run must not be re-read
        fs::write(dir.path().join("cleaned_1.json"), "[]").unwrap();

        let result = clean_exports(dir.path(), "cleaned.json", &CleanOptions::default()).unwrap();
        assert_eq!(result.files_read, 2);
        assert_eq!(result.files_skipped, 1);
        assert_eq!(result.records_kept, 2);
        assert_eq!(result.records_dropped, 1);
        assert_eq!(result.outputs, vec![dir.path().join("cleaned_1.json")]);

        let written: Vec<Value> =
            serde_json::from_str(&fs::read_to_string(&result.outputs[0]).unwrap()).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|r| r.get("ip_addr").is_none()));
        assert_eq!(written[1]["spotify_track_uri"], "spotify:track:b");

        // The cleaned output loads back as listening events
        let events = crate::records::normalize(Value::Array(written));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = clean_exports(dir.path(), "cleaned.json", &CleanOptions::default()).unwrap();
        assert_eq!(result.files_read, 0);
        assert!(result.outputs.is_empty());
    }
}
