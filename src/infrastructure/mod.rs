pub mod artifact_store;
pub mod bootstrap;
pub mod codebeamer;
pub mod config;
pub mod llm_clients;
pub mod markdown;
pub mod response;
pub mod syntax_checker;
