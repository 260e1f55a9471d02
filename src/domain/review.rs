use crate::domain::llm_config::ModelSelector;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ReviewResult {
    pub feedback: String,
    pub suggestions: Vec<String>,
    /// Advisory 0..=10 score; `None` when the model gave no parseable score.
    pub score: Option<u8>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct DryRunResult {
    pub success: bool,
    pub output: String,
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl DryRunResult {
    pub fn invocation_failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            output: format!("Validation error: {}", message),
            errors: vec![message],
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    #[validate(length(min = 1, message = "Script content is required."))]
    pub script_content: String,
    #[serde(default)]
    pub test_case_id: String,
    #[serde(default)]
    pub model: ModelSelector,
    #[serde(default)]
    pub focus_areas: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ImprovementRequest {
    #[validate(length(min = 1, message = "Script content is required."))]
    pub script_content: String,
    #[serde(default)]
    pub test_case_id: String,
    #[serde(default)]
    pub model: ModelSelector,
    #[validate(length(min = 1, message = "Describe the improvement you want."))]
    pub improvement_request: String,
}
