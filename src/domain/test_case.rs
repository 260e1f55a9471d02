use crate::domain::llm_config::ModelSelector;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Test-case fields pulled from the test-management system. Any field may be empty.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct TestCaseSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub feature: String,
    #[serde(default)]
    pub precondition: String,
    #[serde(default)]
    pub steps: String,
    #[serde(default)]
    pub expected: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub test_case_id: String,
    pub spec: Option<TestCaseSpec>,
    pub automation_context: Option<String>,
    pub model: ModelSelector,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[validate(length(min = 1, message = "At least one test case id is required."))]
    pub test_case_ids: Vec<String>,
    #[serde(default)]
    pub automation_context: Option<String>,
    #[serde(default)]
    pub model: ModelSelector,
    #[validate(length(min = 1, message = "Destination folder is required."))]
    pub destination_root: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Success,
    Error,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub test_case_id: String,
    pub status: GenerationStatus,
    pub script_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_path: Option<String>,
    /// Set when generation succeeded but the write did not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_error: Option<String>,
}

impl GenerationResult {
    pub fn failed(test_case_id: &str, message: impl Into<String>) -> Self {
        Self {
            test_case_id: test_case_id.to_string(),
            status: GenerationStatus::Error,
            script_content: String::new(),
            error_message: Some(message.into()),
            saved: false,
            saved_path: None,
            save_error: None,
        }
    }

    pub fn generated(test_case_id: &str, script_content: String) -> Self {
        Self {
            test_case_id: test_case_id.to_string(),
            status: GenerationStatus::Success,
            script_content,
            error_message: None,
            saved: false,
            saved_path: None,
            save_error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == GenerationStatus::Success
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GenerationPhase {
    Fetching,
    Generating,
    Saving,
    Completed,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationProgress {
    pub completed_count: usize,
    pub total_count: usize,
    pub current_id: String,
    pub phase: GenerationPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GenerationResult>,
}
