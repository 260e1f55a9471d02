//! Best-effort parsing of free-text review answers.

use once_cell::sync::Lazy;
use regex::Regex;

static SCORE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bscore\b\**\s*(?:(?P<sep>[:=])\s*\**\s*)?(?P<value>\d+(?:\.\d+)?)\s*\**\s*(?:(?:/|out\s+of)\s*(?P<scale>\d+))?",
    )
    .unwrap()
});

static BULLET_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+(.+)$").unwrap());

/// Last `Score: N` or `score N/10` mention, rounded. A bare "score N" in prose is not a
/// score. Other scales, out-of-range values and missing scores give `None`.
pub fn parse_score(text: &str) -> Option<u8> {
    let captures = SCORE_PATTERN
        .captures_iter(text)
        .filter(|c| c.name("sep").is_some() || c.name("scale").is_some())
        .last()?;
    if let Some(scale) = captures.name("scale") {
        if scale.as_str().parse::<u32>().ok()? != 10 {
            return None;
        }
    }
    let raw = captures.name("value")?.as_str().parse::<f64>().ok()?;
    let rounded = raw.round();
    if (0.0..=10.0).contains(&rounded) {
        Some(rounded as u8)
    } else {
        None
    }
}

/// Bullet and numbered list items, in order.
pub fn extract_suggestions(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| BULLET_PATTERN.captures(line))
        .filter_map(|captures| captures.get(1))
        .map(|item| item.as_str().trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
