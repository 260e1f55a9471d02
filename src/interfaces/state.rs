use crate::application::{ChatUseCase, GenerationUseCase, ModelProvider, ReviewUseCase, SessionStore};
use crate::infrastructure::artifact_store::ArtifactStore;
use crate::infrastructure::codebeamer::{CodeBeamerConnection, TestCaseFetcher};
use crate::infrastructure::config::Settings;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::syntax_checker::SyntaxChecker;
use std::sync::Arc;

/// Everything the HTTP handlers share.
pub struct AppState {
    pub settings: Settings,
    pub provider: Arc<ModelProvider>,
    pub chat: ChatUseCase,
    pub generation: GenerationUseCase,
    pub review: ReviewUseCase,
    pub fetcher: Arc<dyn TestCaseFetcher + Send + Sync>,
    pub codebeamer: Arc<CodeBeamerConnection>,
    pub artifacts: Arc<dyn ArtifactStore + Send + Sync>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        llm_client: Arc<dyn LLMClient + Send + Sync>,
        fetcher: Arc<dyn TestCaseFetcher + Send + Sync>,
        codebeamer: Arc<CodeBeamerConnection>,
        checker: Arc<dyn SyntaxChecker + Send + Sync>,
        artifacts: Arc<dyn ArtifactStore + Send + Sync>,
    ) -> Self {
        let provider = Arc::new(ModelProvider::new(llm_client, settings.llm.clone()));
        let sessions = Arc::new(SessionStore::new());

        Self {
            chat: ChatUseCase::new(
                provider.clone(),
                sessions,
                settings.chat.max_history_turns,
            ),
            generation: GenerationUseCase::new(provider.clone(), fetcher.clone(), artifacts.clone()),
            review: ReviewUseCase::new(provider.clone(), checker),
            provider,
            fetcher,
            codebeamer,
            artifacts,
            settings,
        }
    }
}
