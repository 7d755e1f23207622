use serde::de::DeserializeOwned;

#[derive(Debug, Clone)]
pub struct JsonlParseOutcome<T> {
    pub items: Vec<T>,
    pub skipped_lines: usize,
}

/// Parse a JSONL buffer, skipping blank and undecodable lines. The request
/// log is append-only and may carry torn trailing writes; a reader that gave
/// up on the first bad line would lose the whole history.
pub fn parse_jsonl_tolerant<T>(raw: &str) -> JsonlParseOutcome<T>
where
    T: DeserializeOwned,
{
    let mut items = Vec::new();
    let mut skipped_lines = 0usize;

    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(line) {
            Ok(value) => items.push(value),
            Err(_) => skipped_lines += 1,
        }
    }

    JsonlParseOutcome {
        items,
        skipped_lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_blank_and_invalid_lines() {
        let raw = "{\"a\":1}\n\nnot json\n{\"a\":2}\n";
        let outcome = parse_jsonl_tolerant::<serde_json::Value>(raw);
        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.skipped_lines, 1);
    }
}
