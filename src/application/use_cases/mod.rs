pub mod chat;
pub mod generation;
pub mod model_provider;
pub mod prompt_builder;
pub mod review;
pub mod review_output;
pub mod session_store;
