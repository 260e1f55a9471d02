use crate::application::use_cases::model_provider::ModelProvider;
use crate::application::use_cases::prompt_builder::build_generation_prompt;
use crate::domain::artifact::SCRIPT_EXTENSION;
use crate::domain::error::{AppError, Result};
use crate::domain::test_case::{
    BatchRequest, GenerationPhase, GenerationProgress, GenerationRequest, GenerationResult,
    TestCaseSpec,
};
use crate::infrastructure::artifact_store::ArtifactStore;
use crate::infrastructure::codebeamer::TestCaseFetcher;
use crate::infrastructure::response::extract_script;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

const MAX_NAME_CHARS: usize = 60;

pub struct GenerationUseCase {
    provider: Arc<ModelProvider>,
    fetcher: Arc<dyn TestCaseFetcher + Send + Sync>,
    store: Arc<dyn ArtifactStore + Send + Sync>,
}

/// `<id>.robot`, or `<id>_<name>.robot` when the spec carries a name distinct from the id.
pub fn script_filename(test_case_id: &str, spec: Option<&TestCaseSpec>) -> String {
    let id = test_case_id.trim();
    let slug = spec
        .map(|spec| spec.name.trim())
        .filter(|name| !name.is_empty() && *name != id)
        .map(slugify)
        .unwrap_or_default();

    if slug.is_empty() {
        format!("{}{}", id, SCRIPT_EXTENSION)
    } else {
        format!("{}_{}{}", id, slug, SCRIPT_EXTENSION)
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::new();
    for c in name.chars() {
        if c.is_alphanumeric() || c == '-' {
            slug.push(c);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_')
        .chars()
        .take(MAX_NAME_CHARS)
        .collect::<String>()
        .trim_end_matches('_')
        .to_string()
}

impl GenerationUseCase {
    pub fn new(
        provider: Arc<ModelProvider>,
        fetcher: Arc<dyn TestCaseFetcher + Send + Sync>,
        store: Arc<dyn ArtifactStore + Send + Sync>,
    ) -> Self {
        Self {
            provider,
            fetcher,
            store,
        }
    }

    /// Script text for one test case; empty when the model produced nothing usable.
    pub async fn generate_script(&self, item: &GenerationRequest) -> Result<String> {
        let messages = build_generation_prompt(
            item.spec.as_ref(),
            item.automation_context.as_deref(),
            &item.test_case_id,
        );
        let text = self.provider.complete(item.model, &messages).await?;
        Ok(extract_script(&text))
    }

    /// Rejects empty id lists, blank ids and a blank destination before any work starts.
    pub fn check_request(request: &BatchRequest) -> Result<()> {
        request
            .validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;
        if request.destination_root.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Destination folder is required.".to_string(),
            ));
        }
        if request.test_case_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(AppError::ValidationError(
                "Test case ids must not be blank.".to_string(),
            ));
        }
        Ok(())
    }

    /// Processes ids sequentially in input order. Item failures become error results; only a
    /// malformed request fails the whole batch.
    pub async fn generate_batch<F>(
        &self,
        request: &BatchRequest,
        mut progress: F,
    ) -> Result<Vec<GenerationResult>>
    where
        F: FnMut(GenerationProgress) + Send,
    {
        Self::check_request(request)?;

        let total = request.test_case_ids.len();
        let root = Path::new(request.destination_root.trim());
        let mut results = Vec::with_capacity(total);
        info!(total, model = %request.model, root = %root.display(), "Starting batch generation");

        for (index, raw_id) in request.test_case_ids.iter().enumerate() {
            let id = raw_id.trim();
            let mut emit = |phase: GenerationPhase, result: Option<GenerationResult>| {
                progress(GenerationProgress {
                    completed_count: if phase == GenerationPhase::Completed {
                        index + 1
                    } else {
                        index
                    },
                    total_count: total,
                    current_id: id.to_string(),
                    phase,
                    result,
                })
            };

            emit(GenerationPhase::Fetching, None);
            let spec = self.fetcher.fetch(id).await;

            emit(GenerationPhase::Generating, None);
            let item = GenerationRequest {
                test_case_id: id.to_string(),
                spec,
                automation_context: request.automation_context.clone(),
                model: request.model,
            };
            let result = match self.generate_script(&item).await {
                Err(e) => {
                    warn!(test_case_id = %id, error = %e, "Generation failed");
                    GenerationResult::failed(id, e.to_string())
                }
                Ok(script) => {
                    if script.is_empty() {
                        warn!(test_case_id = %id, "Model returned an empty script");
                        GenerationResult::failed(id, "Model returned an empty script")
                    } else {
                        emit(GenerationPhase::Saving, None);
                        let filename = script_filename(id, item.spec.as_ref());
                        let mut result = GenerationResult::generated(id, script);
                        match self.store.save(root, &filename, &result.script_content).await {
                            Ok(path) => {
                                result.saved = true;
                                result.saved_path = Some(path.display().to_string());
                            }
                            Err(e) => {
                                warn!(test_case_id = %id, error = %e, "Generated script not saved");
                                result.save_error = Some(e.to_string());
                            }
                        }
                        result
                    }
                }
            };

            emit(GenerationPhase::Completed, Some(result.clone()));
            results.push(result);
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        info!(total, succeeded, "Batch generation finished");
        Ok(results)
    }
}
