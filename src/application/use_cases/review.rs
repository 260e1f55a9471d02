use crate::application::use_cases::model_provider::ModelProvider;
use crate::application::use_cases::prompt_builder::{build_improvement_prompt, build_review_prompt};
use crate::application::use_cases::review_output::{extract_suggestions, parse_score};
use crate::domain::error::{AppError, Result};
use crate::domain::review::{DryRunResult, ImprovementRequest, ReviewRequest, ReviewResult};
use crate::infrastructure::response::extract_script;
use crate::infrastructure::syntax_checker::SyntaxChecker;
use std::sync::Arc;
use tracing::warn;
use validator::Validate;

/// Stateless review, dry-run and improvement of scripts.
pub struct ReviewUseCase {
    provider: Arc<ModelProvider>,
    checker: Arc<dyn SyntaxChecker + Send + Sync>,
}

impl ReviewUseCase {
    pub fn new(provider: Arc<ModelProvider>, checker: Arc<dyn SyntaxChecker + Send + Sync>) -> Self {
        Self { provider, checker }
    }

    pub async fn review(&self, request: &ReviewRequest) -> Result<ReviewResult> {
        request
            .validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;

        let messages = build_review_prompt(
            &request.script_content,
            &request.test_case_id,
            &request.focus_areas,
        );
        let feedback = self.provider.complete(request.model, &messages).await?;

        Ok(ReviewResult {
            score: parse_score(&feedback),
            suggestions: extract_suggestions(&feedback),
            feedback,
        })
    }

    /// Never fails: a checker that cannot run is reported as an unsuccessful result.
    pub async fn dry_run(&self, script: &str) -> DryRunResult {
        match self.checker.check(script).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Syntax checker could not run");
                match e {
                    AppError::CheckerInvocation(message) => DryRunResult::invocation_failed(message),
                    other => DryRunResult::invocation_failed(other.to_string()),
                }
            }
        }
    }

    /// Returns the improved script; the caller decides whether to apply it.
    pub async fn improve(&self, request: &ImprovementRequest) -> Result<String> {
        request
            .validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;

        let messages =
            build_improvement_prompt(&request.script_content, &request.improvement_request);
        let text = self.provider.complete(request.model, &messages).await?;
        let script = extract_script(&text);
        if script.is_empty() {
            return Err(AppError::LLMError("Model returned an empty script".to_string()));
        }
        Ok(script)
    }
}
