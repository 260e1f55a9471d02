//! Framework documentation in Markdown, turned into automation context for generation prompts.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static SECTION_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,3}\s+(.+)$").unwrap());

static CODE_BLOCK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(\w+)?\r?\n(.*?)```").unwrap());

static LIST_ITEM_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*[-*]\s+(.+)$").unwrap());

const INTRODUCTION: &str = "Introduction";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkdownSection {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeywordDoc {
    pub name: String,
    pub documentation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMarkdown {
    pub sections: Vec<MarkdownSection>,
    pub prompts: Vec<MarkdownSection>,
    pub libraries: Vec<String>,
    pub resources: Vec<String>,
    pub keywords: Vec<KeywordDoc>,
    pub code_blocks: Vec<CodeBlock>,
}

/// Splits on `#`..`###` headers. Text before the first header lands in "Introduction".
fn split_sections(content: &str) -> Vec<MarkdownSection> {
    let mut sections = Vec::new();
    let mut current_name = INTRODUCTION.to_string();
    let mut current: Vec<&str> = Vec::new();

    for line in content.lines() {
        if let Some(captures) = SECTION_PATTERN.captures(line) {
            if !current.is_empty() {
                sections.push(MarkdownSection {
                    name: current_name.clone(),
                    content: current.join("\n"),
                });
            }
            current_name = captures[1].trim().to_string();
            current.clear();
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        sections.push(MarkdownSection {
            name: current_name,
            content: current.join("\n"),
        });
    }
    sections
}

fn list_items(content: &str) -> Vec<String> {
    LIST_ITEM_PATTERN
        .captures_iter(content)
        .map(|captures| captures[1].trim().to_string())
        .collect()
}

fn code_blocks(content: &str) -> Vec<CodeBlock> {
    CODE_BLOCK_PATTERN
        .captures_iter(content)
        .map(|captures| CodeBlock {
            language: captures
                .get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            code: captures[2].trim().to_string(),
        })
        .collect()
}

/// Unindented lines inside robot blocks are keyword names; `[Documentation]` lines document them.
fn keywords(content: &str) -> Vec<KeywordDoc> {
    let mut keywords = Vec::new();
    for block in code_blocks(content) {
        if !matches!(block.language.as_str(), "robot" | "robotframework" | "") {
            continue;
        }
        let mut current: Option<KeywordDoc> = None;
        for line in block.code.lines() {
            if !line.is_empty() && !line.starts_with(' ') && !line.starts_with('\t') {
                if line.starts_with("***") {
                    continue;
                }
                if let Some(done) = current.take() {
                    keywords.push(done);
                }
                current = Some(KeywordDoc {
                    name: line.trim().to_string(),
                    documentation: String::new(),
                });
            } else if let Some((_, doc)) = line.trim().split_once("[Documentation]") {
                if let Some(keyword) = current.as_mut() {
                    if !keyword.documentation.is_empty() {
                        keyword.documentation.push('\n');
                    }
                    keyword.documentation.push_str(doc.trim());
                }
            }
        }
        if let Some(done) = current {
            keywords.push(done);
        }
    }
    keywords
}

pub fn parse_markdown(content: &str) -> ParsedMarkdown {
    let sections = split_sections(content);
    let mut parsed = ParsedMarkdown {
        code_blocks: code_blocks(content),
        ..Default::default()
    };

    for section in &sections {
        let lower = section.name.to_lowercase();
        if lower.contains("prompt") {
            parsed.prompts.push(MarkdownSection {
                name: section.name.clone(),
                content: section.content.trim().to_string(),
            });
        } else if lower.contains("librar") {
            parsed.libraries.extend(list_items(&section.content));
        } else if lower.contains("resource") {
            parsed.resources.extend(list_items(&section.content));
        } else if lower.contains("keyword") {
            parsed.keywords.extend(keywords(&section.content));
        }
    }

    parsed.sections = sections;
    parsed
}

impl ParsedMarkdown {
    /// Text handed to the generation prompt as automation context. Empty when nothing useful
    /// was found.
    pub fn to_automation_context(&self) -> String {
        let mut parts = Vec::new();

        for prompt in &self.prompts {
            if !prompt.content.is_empty() {
                parts.push(format!("## {}\n{}", prompt.name, prompt.content));
            }
        }
        if !self.libraries.is_empty() {
            parts.push(format!("Libraries:\n- {}", self.libraries.join("\n- ")));
        }
        if !self.resources.is_empty() {
            parts.push(format!("Resources:\n- {}", self.resources.join("\n- ")));
        }
        if !self.keywords.is_empty() {
            let lines: Vec<String> = self
                .keywords
                .iter()
                .map(|keyword| {
                    if keyword.documentation.is_empty() {
                        format!("- {}", keyword.name)
                    } else {
                        format!("- {}: {}", keyword.name, keyword.documentation)
                    }
                })
                .collect();
            parts.push(format!("Available keywords:\n{}", lines.join("\n")));
        }

        parts.join("\n\n")
    }
}
