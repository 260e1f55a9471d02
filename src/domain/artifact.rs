use serde::{Deserialize, Serialize};
use validator::Validate;

pub const SCRIPT_EXTENSION: &str = ".robot";

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveArtifactRequest {
    #[validate(length(min = 1, message = "Destination folder is required."))]
    pub destination_root: String,
    #[validate(length(min = 1, message = "Filename is required."))]
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SavedArtifact {
    pub file_path: String,
    pub message: String,
}
