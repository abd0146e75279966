//! Decoding of page batches, intermediate records, and prior outputs.
//!
//! List input may be a single JSON object, a JSON array of objects, or JSON
//! Lines. Every page is validated before it is handed to the extractor.

use serde::de::DeserializeOwned;
use serde_json::Value;

use pagegraph_documents::EmbeddingDocument;
use pagegraph_graph::Graph;
use pagegraph_shared::{PageGraphError, PageSemanticRecord, RawPage, Result};

/// Parse a batch of raw pages.
pub fn parse_pages(input: &str) -> Result<Vec<RawPage>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| page_from_value(item, &format!("item {}", i + 1)))
            .collect(),
        Ok(value) => Ok(vec![page_from_value(value, "input")?]),
        Err(_) if trimmed.starts_with('{') => parse_json_lines(trimmed),
        Err(e) => Err(PageGraphError::parse(format!("page input: {e}"))),
    }
}

fn parse_json_lines(input: &str) -> Result<Vec<RawPage>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let location = format!("line {}", i + 1);
            let value = serde_json::from_str(line)
                .map_err(|e| PageGraphError::parse(format!("{location}: {e}")))?;
            page_from_value(value, &location)
        })
        .collect()
}

fn page_from_value(value: Value, location: &str) -> Result<RawPage> {
    if !value.is_object() {
        return Err(PageGraphError::validation(format!(
            "{location}: page must be a JSON object"
        )));
    }
    let page: RawPage = serde_json::from_value(value)
        .map_err(|e| PageGraphError::validation(format!("{location}: {e}")))?;
    page.validate().map_err(|e| match e {
        PageGraphError::Validation { message } => {
            PageGraphError::validation(format!("{location}: {message}"))
        }
        other => other,
    })?;
    Ok(page)
}

/// Parse semantic records written by the extract step.
pub fn parse_records(input: &str) -> Result<Vec<PageSemanticRecord>> {
    parse_list(input, "records")
}

/// Parse documents written by the documents step.
pub fn parse_documents(input: &str) -> Result<Vec<EmbeddingDocument>> {
    parse_list(input, "documents")
}

fn parse_list<T: DeserializeOwned>(input: &str, what: &str) -> Result<Vec<T>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .map(|item| {
                serde_json::from_value(item).map_err(|e| PageGraphError::parse(format!("{what}: {e}")))
            })
            .collect(),
        Ok(value) => Ok(vec![
            serde_json::from_value(value).map_err(|e| PageGraphError::parse(format!("{what}: {e}")))?,
        ]),
        Err(_) => trimmed
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line)
                    .map_err(|e| PageGraphError::parse(format!("{what} line {}: {e}", i + 1)))
            })
            .collect(),
    }
}

/// Parse a previously written graph. Blank input is an empty graph.
pub fn parse_graph(input: &str) -> Result<Graph> {
    if input.trim().is_empty() {
        return Ok(Graph::default());
    }
    serde_json::from_str(input).map_err(|e| PageGraphError::parse(format!("prior graph: {e}")))
}
