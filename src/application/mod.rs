pub mod use_cases;

pub use use_cases::chat::ChatUseCase;
pub use use_cases::generation::GenerationUseCase;
pub use use_cases::model_provider::ModelProvider;
pub use use_cases::review::ReviewUseCase;
pub use use_cases::session_store::SessionStore;
