//! Raw SAMSum-style dialogue records.
//!
//! A split lives either in a directory (`<root>/<split>/`) holding Arrow IPC
//! stream files as written by the Hugging Face `datasets` library, or JSON
//! Lines files, or in a single `<root>/<split>.jsonl` file.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use arrow_array::{Array, ArrayRef, LargeStringArray, RecordBatch, StringArray};
use arrow_ipc::reader::{FileReader, StreamReader};
use serde::{Deserialize, Serialize};

use crate::errors::{FormatError, Result, SummarizerError};

/// One raw dialogue/summary pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueRecord {
    /// Corpus identifier, or the row index when the corpus has none.
    pub id: String,
    /// The conversation transcript.
    pub dialogue: String,
    /// The reference summary.
    pub summary: String,
}

/// Column names to read records from.
#[derive(Debug, Clone, Copy)]
pub struct Columns<'a> {
    /// Dialogue column.
    pub text: &'a str,
    /// Summary column.
    pub summary: &'a str,
}

impl Default for Columns<'_> {
    fn default() -> Self {
        Self {
            text: "dialogue",
            summary: "summary",
        }
    }
}

#[derive(Debug, Deserialize)]
struct DatasetState {
    #[serde(rename = "_data_files", default)]
    data_files: Vec<DataFileEntry>,
}

#[derive(Debug, Deserialize)]
struct DataFileEntry {
    filename: String,
}

/// Loads every record of one split.
pub fn load_split(root: &Path, split: &str, columns: Columns<'_>) -> Result<Vec<DialogueRecord>> {
    let files = split_files(root, split)?;
    tracing::debug!(split, files = files.len(), "Loading raw split");

    let mut records = Vec::new();
    for file in files {
        let is_arrow = file.extension().is_some_and(|ext| ext == "arrow");
        let offset = records.len();
        let mut batch = if is_arrow {
            read_arrow(&file, columns, offset)?
        } else {
            read_jsonl(&file, columns, offset)?
        };
        records.append(&mut batch);
    }
    Ok(records)
}

/// Resolves the data files of a split, in read order.
fn split_files(root: &Path, split: &str) -> Result<Vec<PathBuf>> {
    let dir = root.join(split);
    if dir.is_dir() {
        let state_path = dir.join("state.json");
        if state_path.is_file() {
            let text = fs::read_to_string(&state_path)
                .map_err(|e| SummarizerError::io(&state_path, e))?;
            let state: DatasetState = serde_json::from_str(&text)
                .map_err(|e| FormatError::dataset(&state_path, e))?;
            if !state.data_files.is_empty() {
                return Ok(state
                    .data_files
                    .into_iter()
                    .map(|entry| dir.join(entry.filename))
                    .collect());
            }
        }

        let mut arrow = Vec::new();
        let mut jsonl = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| SummarizerError::io(&dir, e))? {
            let path = entry.map_err(|e| SummarizerError::io(&dir, e))?.path();
            match path.extension().and_then(|ext| ext.to_str()) {
                Some("arrow") => arrow.push(path),
                Some("jsonl") => jsonl.push(path),
                _ => {}
            }
        }
        let mut files = if arrow.is_empty() { jsonl } else { arrow };
        files.sort();
        if !files.is_empty() {
            return Ok(files);
        }
    }

    let flat = root.join(format!("{split}.jsonl"));
    if flat.is_file() {
        return Ok(vec![flat]);
    }

    Err(FormatError::MissingSplit {
        dir: root.to_path_buf(),
        split: split.to_string(),
    }
    .into())
}

fn read_arrow(path: &Path, columns: Columns<'_>, offset: usize) -> Result<Vec<DialogueRecord>> {
    let mut file = File::open(path).map_err(|e| SummarizerError::io(path, e))?;

    // IPC file format starts with a magic marker; `datasets` writes the stream format.
    let mut magic = [0u8; 6];
    let is_file_format = file.read_exact(&mut magic).is_ok() && &magic == b"ARROW1";
    file.seek(SeekFrom::Start(0))
        .map_err(|e| SummarizerError::io(path, e))?;

    let batches: Vec<RecordBatch> = if is_file_format {
        FileReader::try_new(file, None)
            .map_err(|e| FormatError::dataset(path, e))?
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| FormatError::dataset(path, e))?
    } else {
        StreamReader::try_new(BufReader::new(file), None)
            .map_err(|e| FormatError::dataset(path, e))?
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| FormatError::dataset(path, e))?
    };

    let mut records = Vec::new();
    for batch in &batches {
        let dialogue = column(batch, columns.text, path)?;
        let summary = column(batch, columns.summary, path)?;
        let ids = batch.column_by_name("id");

        for i in 0..batch.num_rows() {
            let row = offset + records.len();
            let id = match ids.and_then(|col| string_value(col, i)) {
                Some(id) => id.to_string(),
                None => row.to_string(),
            };
            records.push(DialogueRecord {
                id,
                dialogue: cell(dialogue, i, columns.text, path, row)?,
                summary: cell(summary, i, columns.summary, path, row)?,
            });
        }
    }
    Ok(records)
}

fn column<'b>(batch: &'b RecordBatch, name: &str, path: &Path) -> Result<&'b ArrayRef> {
    let col = batch
        .column_by_name(name)
        .ok_or_else(|| FormatError::dataset(path, format!("missing column '{name}'")))?;
    if col.as_any().downcast_ref::<StringArray>().is_none()
        && col.as_any().downcast_ref::<LargeStringArray>().is_none()
    {
        return Err(FormatError::dataset(
            path,
            format!("column '{name}' is {}, expected a string column", col.data_type()),
        )
        .into());
    }
    Ok(col)
}

fn string_value(col: &ArrayRef, i: usize) -> Option<&str> {
    if col.is_null(i) {
        return None;
    }
    if let Some(arr) = col.as_any().downcast_ref::<StringArray>() {
        return Some(arr.value(i));
    }
    col.as_any()
        .downcast_ref::<LargeStringArray>()
        .map(|arr| arr.value(i))
}

fn cell(col: &ArrayRef, i: usize, name: &str, path: &Path, row: usize) -> Result<String> {
    string_value(col, i)
        .map(ToString::to_string)
        .ok_or_else(|| FormatError::record(path, row, format!("null '{name}'")).into())
}

fn read_jsonl(path: &Path, columns: Columns<'_>, offset: usize) -> Result<Vec<DialogueRecord>> {
    let file = File::open(path).map_err(|e| SummarizerError::io(path, e))?;
    let mut records = Vec::new();

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| SummarizerError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value =
            serde_json::from_str(&line).map_err(|e| FormatError::record(path, line_no, e))?;
        let field = |name: &str| -> Result<String> {
            match value.get(name) {
                Some(serde_json::Value::String(s)) => Ok(s.clone()),
                Some(other) => Err(FormatError::record(
                    path,
                    line_no,
                    format!("'{name}' is not a string: {other}"),
                )
                .into()),
                None => Err(FormatError::record(path, line_no, format!("missing '{name}'")).into()),
            }
        };

        let id = match value.get("id") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => (offset + records.len()).to_string(),
        };
        records.push(DialogueRecord {
            id,
            dialogue: field(columns.text)?,
            summary: field(columns.summary)?,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_ipc::writer::StreamWriter;
    use arrow_schema::{DataType, Field, Schema};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn write_arrow(path: &Path, ids: &[&str], dialogues: &[&str], summaries: &[&str]) {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("dialogue", DataType::Utf8, false),
            Field::new("summary", DataType::Utf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(ids.to_vec())),
                Arc::new(StringArray::from(dialogues.to_vec())),
                Arc::new(StringArray::from(summaries.to_vec())),
            ],
        )
        .unwrap();
        let file = File::create(path).unwrap();
        let mut writer = StreamWriter::try_new(file, &schema).unwrap();
        writer.write(&batch).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_reads_arrow_split_in_state_order() {
        let dir = tempfile::tempdir().unwrap();
        let split = dir.path().join("train");
        fs::create_dir_all(&split).unwrap();
        write_arrow(&split.join("b.arrow"), &["2"], &["B: hi"], &["B greets."]);
        write_arrow(&split.join("a.arrow"), &["1"], &["A: yo"], &["A greets."]);
        fs::write(
            split.join("state.json"),
            r#"{"_data_files": [{"filename": "b.arrow"}, {"filename": "a.arrow"}]}"#,
        )
        .unwrap();

        let records = load_split(dir.path(), "train", Columns::default()).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
        assert_eq!(records[1].summary, "A greets.");
    }

    #[test]
    fn test_reads_flat_jsonl_split() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("test.jsonl"),
            "{\"id\": 7, \"dialogue\": \"Amanda: cookies?\", \"summary\": \"Amanda asks.\"}\n\n\
             {\"dialogue\": \"Tom: ok\", \"summary\": \"Tom agrees.\"}\n",
        )
        .unwrap();

        let records = load_split(dir.path(), "test", Columns::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "7");
        assert_eq!(records[1].id, "1");
        assert_eq!(records[1].dialogue, "Tom: ok");
    }

    #[test]
    fn test_missing_column_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("test.jsonl"), "{\"dialogue\": \"x\"}\n").unwrap();

        let err = load_split(dir.path(), "test", Columns::default()).unwrap_err();
        assert_eq!(err.kind(), "format");
        assert!(err.to_string().contains("missing 'summary'"));
    }

    #[test]
    fn test_non_string_cell_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("test.jsonl"),
            "{\"dialogue\": 3, \"summary\": \"s\"}\n",
        )
        .unwrap();

        let err = load_split(dir.path(), "test", Columns::default()).unwrap_err();
        assert!(matches!(
            err,
            SummarizerError::Format(FormatError::Record { row: 0, .. })
        ));
    }

    #[test]
    fn test_corrupt_arrow_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let split = dir.path().join("validation");
        fs::create_dir_all(&split).unwrap();
        fs::write(split.join("data.arrow"), b"definitely not arrow").unwrap();

        let err = load_split(dir.path(), "validation", Columns::default()).unwrap_err();
        assert_eq!(err.kind(), "format");
    }

    #[test]
    fn test_absent_split_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_split(dir.path(), "train", Columns::default()).unwrap_err();
        assert!(matches!(
            err,
            SummarizerError::Format(FormatError::MissingSplit { .. })
        ));
    }
}
