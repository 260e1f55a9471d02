use once_cell::sync::Lazy;
use regex::Regex;

static THINK_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<think>[\s\S]*?</think>|<think\s*/>").unwrap());

static REASONING_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<reasoning>[\s\S]*?</reasoning>").unwrap());

static MULTIPLE_NEWLINES_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static FENCED_BLOCK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*(?:robot(?:framework)?|text|txt)?[ \t]*\r?\n(.*?)```").unwrap()
});

/// Removes reasoning blocks some local models emit before the answer.
pub fn clean_llm_response(response: &str) -> String {
    let mut cleaned = THINK_TAG_PATTERN.replace_all(response, "").to_string();
    cleaned = REASONING_TAG_PATTERN.replace_all(&cleaned, "").to_string();
    cleaned = cleaned.trim().to_string();

    MULTIPLE_NEWLINES_PATTERN
        .replace_all(&cleaned, "\n\n")
        .to_string()
}

/// Cleaned model output reduced to the script body.
///
/// Models are told to return only code but often wrap it in a fenced block with prose around
/// it. The first fenced block wins; unfenced output is returned as-is.
pub fn extract_script(response: &str) -> String {
    let cleaned = clean_llm_response(response);
    let script = match FENCED_BLOCK_PATTERN.captures(&cleaned) {
        Some(captures) => captures
            .get(1)
            .map(|body| body.as_str().to_string())
            .unwrap_or_default(),
        None => cleaned,
    };

    let trimmed = script.trim_matches('\n').trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}\n", trimmed)
    }
}
