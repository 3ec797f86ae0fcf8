//! Lenient JSON extraction from model responses.
//!
//! Models wrap JSON in markdown fences, add prose around it, or emit smart
//! quotes and trailing commas. These helpers recover the object before serde
//! sees it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

/// Strip markdown code fences from a response
pub(crate) fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        trimmed
    };
    let clean = clean.strip_suffix("```").unwrap_or(clean);
    clean.trim()
}

/// Extract a JSON fragment between matching delimiters
pub(crate) fn extract_json_fragment(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if start <= end {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Try to fix common JSON issues from LLM responses
pub(crate) fn fix_json_issues(json: &str) -> String {
    let mut fixed = json.to_string();

    // Trailing commas before ] or }
    fixed = fixed.replace(",]", "]");
    fixed = fixed.replace(",}", "}");

    fixed = fixed.replace('\u{201C}', "\"");
    fixed = fixed.replace('\u{201D}', "\"");
    fixed = fixed.replace('\u{2018}', "'");
    fixed = fixed.replace('\u{2019}', "'");

    fixed
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Field deserializer that reads an explicit `null` as `T::default()`.
///
/// Pair with `#[serde(default)]` so a missing key behaves the same way.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse the first JSON object in a model response.
pub(crate) fn parse_json_object<T: DeserializeOwned>(response: &str) -> anyhow::Result<T> {
    let clean = strip_markdown_fences(response);
    let fragment = extract_json_fragment(clean, '{', '}')
        .ok_or_else(|| anyhow::anyhow!("response contained no JSON object"))?;

    match serde_json::from_str(fragment) {
        Ok(value) => Ok(value),
        Err(first_err) => serde_json::from_str(&fix_json_issues(fragment)).map_err(|_| {
            anyhow::anyhow!(
                "response was not valid JSON ({}): {}",
                first_err,
                crate::util::truncate(fragment, 200)
            )
        }),
    }
}
