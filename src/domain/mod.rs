pub mod artifact;
pub mod conversation;
pub mod error;
pub mod llm_config;
pub mod review;
pub mod test_case;
