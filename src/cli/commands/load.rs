//! Load command implementation: parse a documents file and drive the
//! batch loader over it.
//!
//! Supported formats, detected by extension:
//! - `.json` — array of strings, array of `{text, ...}` objects, or an
//!   object with a `documents` array;
//! - `.csv` — header row with a required `text` column, remaining
//!   columns become metadata;
//! - `.txt` — documents separated by blank lines, or the
//!   `---` metadata-header / `===` separator format;
//! - `.md` — split on `## ` headers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use indicatif::ProgressBar;
use regex::Regex;

use crate::error::LoadError;
use crate::models::{BatchResult, Config, DocumentInput, LoadOptions, Metadata, OutputFormat};
use crate::services::{BatchLoader, Pipeline, StoreRegistry};

/// Arguments for the load command.
#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Path to the documents file (.json, .csv, .txt, .md)
    pub file: PathBuf,

    /// Documents inserted concurrently per group
    #[arg(long, short = 'b')]
    pub batch_size: Option<usize>,

    /// Validate without inserting
    #[arg(long, short = 'n')]
    pub dry_run: bool,

    /// Named store to load into
    #[arg(long, short = 'd')]
    pub db: Option<String>,
}

pub async fn handle_load(args: LoadArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let documents = read_documents(&args.file)
        .with_context(|| format!("failed to load {}", args.file.display()))?;

    if documents.is_empty() {
        println!("No documents found in input.");
        return Ok(());
    }

    if verbose || args.dry_run {
        eprintln!(
            "Loaded {} document(s) from {}",
            documents.len(),
            args.file.display()
        );
    }

    let stores = Arc::new(StoreRegistry::new(
        &config.store,
        config.embedding.dimension as usize,
    ));
    let pipeline = Arc::new(Pipeline::from_config(&config, stores)?);
    let loader = BatchLoader::new(pipeline);

    let options = LoadOptions {
        batch_size: args
            .batch_size
            .unwrap_or(config.loader.batch_size as usize),
        dry_run: args.dry_run,
        db_name: args.db.clone(),
        pacing: Duration::from_millis(config.loader.pacing_ms),
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("Loading {} document(s)...", documents.len()));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = loader.load(documents, &options).await;

    spinner.finish_and_clear();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print!("{}", format_summary(&result)),
    }

    Ok(())
}

fn format_summary(result: &BatchResult) -> String {
    use std::fmt::Write;

    let mut output = String::new();
    let _ = writeln!(output, "Batch Load Summary");
    let _ = writeln!(output, "------------------");
    let _ = writeln!(output, "Processed: {}", result.processed);
    let _ = writeln!(output, "Succeeded: {}", style(result.succeeded).green());
    if result.failed > 0 {
        let _ = writeln!(output, "Failed:    {}", style(result.failed).red());
        let _ = writeln!(output, "Failures:");
        for failure in &result.failures {
            let _ = writeln!(output, "  document {}: {}", failure.index, failure.error);
        }
    } else {
        let _ = writeln!(output, "Failed:    0");
    }
    output
}

/// Read and parse a documents file, detecting the format by extension.
pub fn read_documents(path: &Path) -> Result<Vec<DocumentInput>, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let content = std::fs::read_to_string(path)?;

    match ext.as_str() {
        "json" => parse_json(&content),
        "csv" => parse_csv(&content),
        "txt" => {
            if content.contains("---\n") && content.contains("\n===") {
                parse_text_with_metadata(&content)
            } else {
                Ok(parse_plain_text(&content, "\n\n"))
            }
        }
        "md" => Ok(parse_plain_text(&content, "\n## ")),
        other => Err(LoadError::UnsupportedFormat(other.to_string())),
    }
}

fn parse_json(content: &str) -> Result<Vec<DocumentInput>, LoadError> {
    let value: serde_json::Value = serde_json::from_str(content)?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut object) => match object.remove("documents") {
            Some(serde_json::Value::Array(items)) => items,
            _ => {
                return Err(LoadError::Parse(
                    "JSON must be an array or have a \"documents\" array field".to_string(),
                ));
            }
        },
        _ => {
            return Err(LoadError::Parse(
                "JSON must be an array or have a \"documents\" array field".to_string(),
            ));
        }
    };

    items.into_iter().map(json_item_to_document).collect()
}

fn json_item_to_document(item: serde_json::Value) -> Result<DocumentInput, LoadError> {
    match item {
        serde_json::Value::String(text) => Ok(DocumentInput::new(text)),
        serde_json::Value::Object(mut object) => {
            let text = match object.remove("text") {
                Some(serde_json::Value::String(text)) => text,
                _ => {
                    return Err(LoadError::Parse(
                        "each item must have a \"text\" field or be a string".to_string(),
                    ));
                }
            };
            let metadata = match object.remove("metadata") {
                Some(serde_json::Value::Object(map)) => Some(map),
                _ => fold_metadata(object),
            };
            Ok(DocumentInput { text, metadata })
        }
        _ => Err(LoadError::Parse(
            "each item must have a \"text\" field or be a string".to_string(),
        )),
    }
}

/// Fold leftover object fields into metadata, skipping identifiers.
fn fold_metadata(object: Metadata) -> Option<Metadata> {
    let metadata: Metadata = object
        .into_iter()
        .filter(|(key, value)| !matches!(key.as_str(), "doc_id" | "id") && !value.is_null())
        .collect();
    if metadata.is_empty() { None } else { Some(metadata) }
}

fn parse_csv(content: &str) -> Result<Vec<DocumentInput>, LoadError> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| LoadError::Parse("CSV file is empty".to_string()))?;
    let columns: Vec<String> = split_csv_line(header)
        .into_iter()
        .map(|c| c.trim().to_string())
        .collect();

    let text_column = columns
        .iter()
        .position(|c| c == "text")
        .ok_or_else(|| LoadError::Parse("CSV must have a \"text\" column".to_string()))?;

    let mut documents = Vec::new();
    for line in lines {
        let fields = split_csv_line(line);
        let text = fields
            .get(text_column)
            .map(|f| f.trim().to_string())
            .unwrap_or_default();

        let mut metadata = Metadata::new();
        for (i, column) in columns.iter().enumerate() {
            if i == text_column {
                continue;
            }
            let Some(raw) = fields.get(i).map(|f| f.trim()) else {
                continue;
            };
            if raw.is_empty() {
                continue;
            }
            // Columns holding JSON become structured values.
            let value = serde_json::from_str(raw)
                .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
            metadata.insert(column.clone(), value);
        }

        documents.push(DocumentInput {
            text,
            metadata: if metadata.is_empty() { None } else { Some(metadata) },
        });
    }

    Ok(documents)
}

/// Split one CSV line, honoring double quotes and `""` escapes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

fn parse_plain_text(content: &str, separator: &str) -> Vec<DocumentInput> {
    content
        .split(separator)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(DocumentInput::new)
        .collect()
}

/// Parse the metadata-header text format:
///
/// ```text
/// ---
/// title: Some Title
/// ---
/// Document text...
/// ===
/// ```
fn parse_text_with_metadata(content: &str) -> Result<Vec<DocumentInput>, LoadError> {
    let header_line =
        Regex::new(r"^(\w+):\s*(.*)$").map_err(|e| LoadError::Parse(e.to_string()))?;

    let mut documents = Vec::new();
    let mut metadata = Metadata::new();
    let mut text_lines: Vec<&str> = Vec::new();
    let mut in_metadata = false;

    let mut flush =
        |metadata: &mut Metadata, text_lines: &mut Vec<&str>| {
            let text = text_lines.join("\n").trim().to_string();
            text_lines.clear();
            let metadata = std::mem::take(metadata);
            if !text.is_empty() {
                documents.push(DocumentInput {
                    text,
                    metadata: if metadata.is_empty() { None } else { Some(metadata) },
                });
            }
        };

    for line in content.lines() {
        if line == "---" {
            in_metadata = !in_metadata;
        } else if line == "===" {
            flush(&mut metadata, &mut text_lines);
        } else if in_metadata {
            if let Some(captures) = header_line.captures(line) {
                let key = captures[1].to_string();
                let raw = captures[2].trim();
                let value = serde_json::from_str(raw)
                    .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
                metadata.insert(key, value);
            }
        } else {
            text_lines.push(line);
        }
    }
    flush(&mut metadata, &mut text_lines);

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_string_array() {
        let docs = parse_json(r#"["first", "second"]"#).expect("parse");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text, "first");
        assert!(docs[0].metadata.is_none());
    }

    #[test]
    fn test_parse_json_objects_with_explicit_metadata() {
        let docs = parse_json(
            r#"[{"text": "body", "metadata": {"category": "tech"}}]"#,
        )
        .expect("parse");
        assert_eq!(docs[0].text, "body");
        let metadata = docs[0].metadata.as_ref().expect("metadata");
        assert_eq!(metadata["category"], serde_json::json!("tech"));
    }

    #[test]
    fn test_parse_json_objects_fold_extra_fields() {
        let docs = parse_json(r#"[{"text": "body", "title": "T", "id": "skip-me"}]"#)
            .expect("parse");
        let metadata = docs[0].metadata.as_ref().expect("metadata");
        assert_eq!(metadata["title"], serde_json::json!("T"));
        assert!(!metadata.contains_key("id"));
    }

    #[test]
    fn test_parse_json_documents_field() {
        let docs = parse_json(r#"{"documents": [{"text": "one"}, {"text": "two"}]}"#)
            .expect("parse");
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn test_parse_json_rejects_bad_shapes() {
        assert!(parse_json(r#"{"nope": []}"#).is_err());
        assert!(parse_json(r#"[{"no_text": 1}]"#).is_err());
        assert!(parse_json(r#"42"#).is_err());
    }

    #[test]
    fn test_parse_csv_with_metadata_columns() {
        let docs = parse_csv("text,category,tags\nSome doc,tech,\"[\"\"ai\"\",\"\"ml\"\"]\"\n")
            .expect("parse");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "Some doc");
        let metadata = docs[0].metadata.as_ref().expect("metadata");
        assert_eq!(metadata["category"], serde_json::json!("tech"));
        assert_eq!(metadata["tags"], serde_json::json!(["ai", "ml"]));
    }

    #[test]
    fn test_parse_csv_requires_text_column() {
        assert!(parse_csv("title,body\na,b\n").is_err());
    }

    #[test]
    fn test_split_csv_line_quoting() {
        assert_eq!(
            split_csv_line(r#"plain,"has, comma","embedded ""quote""""#),
            vec!["plain", "has, comma", r#"embedded "quote""#]
        );
    }

    #[test]
    fn test_parse_plain_text_blank_line_separated() {
        let docs = parse_plain_text("first doc\n\nsecond doc\n\n\n", "\n\n");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].text, "second doc");
    }

    #[test]
    fn test_parse_text_with_metadata() {
        let content = "---\ntitle: First\ntags: [\"a\"]\n---\nBody one\nline two\n===\n---\ntitle: Second\n---\nBody two\n";
        let docs = parse_text_with_metadata(content).expect("parse");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text, "Body one\nline two");
        let metadata = docs[0].metadata.as_ref().expect("metadata");
        assert_eq!(metadata["title"], serde_json::json!("First"));
        assert_eq!(metadata["tags"], serde_json::json!(["a"]));
        assert_eq!(docs[1].text, "Body two");
    }

    #[test]
    fn test_read_documents_rejects_unknown_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("docs.xml");
        std::fs::write(&path, "<docs/>").expect("write");
        assert!(matches!(
            read_documents(&path),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_read_documents_markdown_split() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("docs.md");
        std::fs::write(&path, "## Intro\nhello\n## Next\nworld\n").expect("write");
        let docs = read_documents(&path).expect("read");
        assert_eq!(docs.len(), 2);
    }
}
