//! Response parsing for LLM outputs.
//!
//! The generation prompt asks for raw SQL, but models routinely wrap the
//! statement in markdown code fences anyway. This module extracts the
//! statement from either form and normalizes it.

/// Extracts a SQL statement from an LLM response.
///
/// Looks for ```sql fenced blocks first, then bare ``` blocks, then falls
/// back to the whole response. The extracted statement is whitespace
/// normalized and stripped of trailing semicolons. Returns `None` when
/// nothing usable remains.
pub fn extract_sql(response: &str) -> Option<String> {
    let candidate = extract_code_block(response, "sql")
        .or_else(|| extract_code_block(response, ""))
        .unwrap_or_else(|| response.to_string());

    let normalized = normalize_sql(&candidate);
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Normalizes a SQL statement: collapses whitespace runs to single spaces
/// and strips trailing semicolons.
pub fn normalize_sql(sql: &str) -> String {
    let collapsed = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .to_string()
}

/// Extracts content from a markdown code block with the specified language.
///
/// Pass an empty string for `lang` to match blocks without a language
/// specifier.
fn extract_code_block(text: &str, lang: &str) -> Option<String> {
    let start_pattern = if lang.is_empty() {
        "```".to_string()
    } else {
        format!("```{}", lang)
    };

    let start_idx = text.find(&start_pattern)?;

    // Find the newline after the opening fence
    let content_start = text[start_idx + start_pattern.len()..]
        .find('\n')
        .map(|i| start_idx + start_pattern.len() + i + 1)?;

    // For generic blocks, make sure it's not actually a language-specific block
    if lang.is_empty() {
        let after_fence = &text[start_idx + 3..content_start - 1];
        if !after_fence.trim().is_empty() {
            return None;
        }
    }

    let end_idx = text[content_start..].find("```")?;

    Some(text[content_start..content_start + end_idx].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_from_sql_fence() {
        let response = "Here you go:\n\n```sql\nSELECT * FROM data;\n```\n";
        assert_eq!(extract_sql(response).as_deref(), Some("SELECT * FROM data"));
    }

    #[test]
    fn test_extract_from_generic_fence() {
        let response = "```\nSELECT COUNT(*) FROM data;\n```";
        assert_eq!(
            extract_sql(response).as_deref(),
            Some("SELECT COUNT(*) FROM data")
        );
    }

    #[test]
    fn test_bare_response_used_as_is() {
        assert_eq!(
            extract_sql("SELECT status FROM data").as_deref(),
            Some("SELECT status FROM data")
        );
    }

    #[test]
    fn test_whitespace_normalized() {
        let response = "SELECT  status,\n       AVG(amount)\nFROM data\nGROUP BY status ;;\n";
        assert_eq!(
            extract_sql(response).as_deref(),
            Some("SELECT status, AVG(amount) FROM data GROUP BY status")
        );
    }

    #[test]
    fn test_empty_response() {
        assert_eq!(extract_sql(""), None);
        assert_eq!(extract_sql("   \n\t  "), None);
        assert_eq!(extract_sql(";;;"), None);
    }

    #[test]
    fn test_sql_fence_preferred_over_generic() {
        let response = "```\nnot the query\n```\n\n```sql\nSELECT 1;\n```";
        assert_eq!(extract_sql(response).as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn test_other_language_fence_falls_back_to_full_text() {
        // A python fence is not a SQL block; the full text comes back and
        // the validator downstream rejects it as malformed.
        let response = "```python\nprint('hi')\n```";
        let extracted = extract_sql(response).unwrap();
        assert!(extracted.contains("print"));
    }

    #[test]
    fn test_multiple_sql_fences_uses_first() {
        let response = "```sql\nSELECT 1;\n```\nor\n```sql\nSELECT 2;\n```";
        assert_eq!(extract_sql(response).as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn test_normalize_strips_only_trailing_semicolons() {
        assert_eq!(
            normalize_sql("SELECT 1; SELECT 2;"),
            "SELECT 1; SELECT 2"
        );
    }
}
