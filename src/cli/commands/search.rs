//! Search command implementation.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::models::{Config, OutputFormat, SearchResults};
use crate::services::{Pipeline, StoreRegistry};

/// Arguments for the search command.
#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(required = true, help = "Search query text")]
    pub query: String,

    /// Maximum number of results to return
    #[arg(long, short = 'k')]
    pub top_k: Option<u32>,

    /// Named store to search
    #[arg(long, short = 'd')]
    pub db: Option<String>,
}

pub async fn handle_search(args: SearchArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    if verbose {
        eprintln!("Query: \"{}\"", args.query);
        if let Some(top_k) = args.top_k {
            eprintln!("  Top k: {top_k}");
        }
    }

    let stores = Arc::new(StoreRegistry::new(
        &config.store,
        config.embedding.dimension as usize,
    ));
    let pipeline = Pipeline::from_config(&config, stores)?;

    let results = pipeline
        .find(&args.query, args.top_k, args.db.as_deref())
        .await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Text => print!("{}", format_results(&args.query, &results)),
    }
    Ok(())
}

fn format_results(query: &str, results: &SearchResults) -> String {
    use std::fmt::Write;

    if results.is_empty() {
        return format!("No results found for: {query}\n");
    }

    let mut output = String::new();
    let _ = writeln!(output, "Search results for: \"{query}\"");
    let _ = writeln!(output, "Found {} result(s)\n", results.len());

    for (i, hit) in results.results.iter().enumerate() {
        let _ = writeln!(output, "{}. [Score: {:.3}] doc {}", i + 1, hit.score, hit.doc_id);

        let preview: String = hit.text.chars().take(200).collect();
        let preview = if hit.text.chars().count() > 200 {
            format!("{preview}...")
        } else {
            preview
        };
        for line in preview.lines() {
            let _ = writeln!(output, "   {line}");
        }
        let _ = writeln!(output);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchHit;

    #[test]
    fn test_format_results_empty() {
        let results = SearchResults { results: vec![] };
        assert!(format_results("nothing", &results).contains("No results"));
    }

    #[test]
    fn test_format_results_lists_hits() {
        let results = SearchResults {
            results: vec![SearchHit {
                chunk_id: 1,
                doc_id: "01ARZ3NDEKTSV4RRFFQ69G5FAV".to_string(),
                text: "some stored text".to_string(),
                score: 0.987,
            }],
        };
        let output = format_results("query", &results);
        assert!(output.contains("0.987"));
        assert!(output.contains("01ARZ3NDEKTSV4RRFFQ69G5FAV"));
        assert!(output.contains("some stored text"));
    }
}
