use std::sync::Arc;

use tracing::{info, warn};

use crate::infrastructure::artifact_store::FsArtifactStore;
use crate::infrastructure::codebeamer::{CodeBeamerClient, CodeBeamerConnection, TestCaseFetcher};
use crate::infrastructure::config::Settings;
use crate::infrastructure::llm_clients::{LLMClient, RouterClient};
use crate::infrastructure::syntax_checker::checker_from_settings;
use crate::interfaces::state::AppState;

/// Wires the production collaborators. A broken CodeBeamer configuration only disables lookups.
pub fn build_state(settings: Settings) -> AppState {
    let llm_client: Arc<dyn LLMClient + Send + Sync> = Arc::new(RouterClient::new());

    let codebeamer = if settings.codebeamer.is_configured() {
        match CodeBeamerClient::new(&settings.codebeamer) {
            Ok(client) => {
                info!(url = %settings.codebeamer.url, "CodeBeamer lookups enabled");
                Some(Arc::new(client))
            }
            Err(err) => {
                warn!(error = %err, "CodeBeamer client unavailable, lookups disabled");
                None
            }
        }
    } else {
        info!("CodeBeamer not configured, generation will use bare test case ids");
        None
    };

    let codebeamer = Arc::new(CodeBeamerConnection::new(codebeamer));
    let fetcher: Arc<dyn TestCaseFetcher + Send + Sync> = codebeamer.clone();

    let checker = checker_from_settings(&settings.syntax_checker);
    info!(
        provider = %settings.llm.provider,
        checker = ?settings.syntax_checker.mode,
        "Application state ready"
    );

    AppState::new(
        settings,
        llm_client,
        fetcher,
        codebeamer,
        checker,
        Arc::new(FsArtifactStore::new()),
    )
}
