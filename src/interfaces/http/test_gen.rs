use super::error_response;
use crate::application::GenerationUseCase;
use crate::domain::artifact::{SaveArtifactRequest, SavedArtifact};
use crate::domain::error::AppError;
use crate::domain::review::{ImprovementRequest, ReviewRequest};
use crate::domain::test_case::{BatchRequest, GenerationProgress, GenerationResult};
use crate::infrastructure::artifact_store::ArtifactStore;
use crate::infrastructure::codebeamer::TestCaseFetcher;
use crate::infrastructure::markdown::parse_markdown;
use crate::interfaces::state::AppState;
use actix_web::{get, post, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::info;
use validator::Validate;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunRequest {
    #[serde(default)]
    pub script_content: String,
}

#[derive(Deserialize)]
pub struct MarkdownRequest {
    pub content: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// One NDJSON line of the generate-batch stream.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum BatchEvent {
    Progress(GenerationProgress),
    Done { results: Vec<GenerationResult> },
    Error { detail: String },
}

fn ndjson_line(event: &BatchEvent) -> Result<web::Bytes, serde_json::Error> {
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');
    Ok(web::Bytes::from(line))
}

/// Streams progress events while the batch runs, then the full result list.
#[post("/test/generate-batch")]
async fn generate_batch(data: web::Data<AppState>, req: web::Json<BatchRequest>) -> HttpResponse {
    let request = req.into_inner();
    if let Err(e) = GenerationUseCase::check_request(&request) {
        return error_response(e);
    }
    info!(
        count = request.test_case_ids.len(),
        model = %request.model,
        "Batch generation requested"
    );

    let (tx, rx) = mpsc::unbounded_channel::<BatchEvent>();
    let state = data.clone();
    actix_web::rt::spawn(async move {
        let progress_tx = tx.clone();
        let outcome = state
            .generation
            .generate_batch(&request, move |progress| {
                // A closed channel means the client went away; the batch still finishes.
                let _ = progress_tx.send(BatchEvent::Progress(progress));
            })
            .await;
        let last = match outcome {
            Ok(results) => BatchEvent::Done { results },
            Err(e) => BatchEvent::Error {
                detail: e.to_string(),
            },
        };
        let _ = tx.send(last);
    });

    let body = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((ndjson_line(&event), rx))
    });

    HttpResponse::Ok()
        .content_type("application/x-ndjson")
        .streaming(body)
}

#[post("/test/review")]
async fn review(data: web::Data<AppState>, req: web::Json<ReviewRequest>) -> impl Responder {
    match data.review.review(&req).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => error_response(e),
    }
}

#[post("/test/dry-run")]
async fn dry_run(data: web::Data<AppState>, req: web::Json<DryRunRequest>) -> impl Responder {
    HttpResponse::Ok().json(data.review.dry_run(&req.script_content).await)
}

#[post("/test/improve")]
async fn improve(data: web::Data<AppState>, req: web::Json<ImprovementRequest>) -> impl Responder {
    match data.review.improve(&req).await {
        Ok(script) => HttpResponse::Ok().json(json!({ "improvedScript": script })),
        Err(e) => error_response(e),
    }
}

#[post("/test/save-file")]
async fn save_file(data: web::Data<AppState>, req: web::Json<SaveArtifactRequest>) -> impl Responder {
    if let Err(e) = req.validate() {
        return error_response(AppError::ValidationError(e.to_string()));
    }
    let root = Path::new(req.destination_root.trim());
    match data.artifacts.save(root, &req.filename, &req.content).await {
        Ok(path) => {
            let file_path = path.display().to_string();
            info!(path = %file_path, "Script saved");
            HttpResponse::Ok().json(SavedArtifact {
                message: format!("Saved to {}", file_path),
                file_path,
            })
        }
        Err(e) => error_response(e),
    }
}

#[get("/test/codebeamer/testcase/{test_case_id}")]
async fn get_test_case(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let test_case_id = path.into_inner();
    match data.fetcher.fetch(&test_case_id).await {
        Some(spec) => HttpResponse::Ok().json(spec),
        None => error_response(AppError::NotFound(format!(
            "Test case {} is not available",
            test_case_id
        ))),
    }
}

#[get("/test/codebeamer/test-cases/{tracker_id}")]
async fn list_tracker_test_cases(data: web::Data<AppState>, path: web::Path<u64>) -> impl Responder {
    let tracker_id = path.into_inner();
    let client = match data.codebeamer.require() {
        Ok(client) => client,
        Err(e) => return error_response(e),
    };
    match client.tracker_items(tracker_id).await {
        Ok(items) => HttpResponse::Ok().json(json!({ "trackerId": tracker_id, "testCases": items })),
        Err(e) => error_response(e),
    }
}

#[get("/test/codebeamer/item/{item_id}")]
async fn get_item(data: web::Data<AppState>, path: web::Path<u64>) -> impl Responder {
    let client = match data.codebeamer.require() {
        Ok(client) => client,
        Err(e) => return error_response(e),
    };
    match client.get_item(path.into_inner()).await {
        Ok(item) => HttpResponse::Ok().json(item),
        Err(e) => error_response(e),
    }
}

#[post("/test/parse-markdown")]
async fn parse_markdown_doc(req: web::Json<MarkdownRequest>) -> impl Responder {
    let parsed = parse_markdown(&req.content);
    HttpResponse::Ok().json(json!({
        "filename": req.filename.clone().unwrap_or_else(|| "inline".to_string()),
        "prompts": parsed.prompts,
        "libraries": parsed.libraries,
        "resources": parsed.resources,
        "keywords": parsed.keywords,
        "codeBlocks": parsed.code_blocks.len(),
        "automationContext": parsed.to_automation_context(),
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(generate_batch)
        .service(review)
        .service(dry_run)
        .service(improve)
        .service(save_file)
        .service(get_test_case)
        .service(list_tracker_test_cases)
        .service(get_item)
        .service(parse_markdown_doc);
}

#[cfg(test)]
mod tests {
    use super::super::test_app;
    use super::*;
    use crate::domain::review::DryRunResult;
    use crate::test_support::{serve_json, spec, StubFetcher, StubLlm};
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn batch_streams_progress_then_results() {
        let dir = tempfile::tempdir().unwrap();
        let llm = StubLlm::always("*** Test Cases ***\nWakeup\n    Log    ok");
        let state = web::Data::new(test_app::state(llm, StubFetcher::with(vec![spec("TC-1", "Wakeup")])));
        let app = test::init_service(App::new().app_data(state).configure(super::super::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/test/generate-batch")
            .set_json(json!({
                "testCaseIds": ["TC-1", "TC-2"],
                "destinationRoot": dir.path().display().to_string(),
            }))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        let lines: Vec<serde_json::Value> = std::str::from_utf8(&body)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        let last = lines.last().unwrap();
        assert_eq!(last["type"], "done");
        assert_eq!(last["results"].as_array().unwrap().len(), 2);
        assert_eq!(last["results"][0]["testCaseId"], "TC-1");
        assert_eq!(last["results"][0]["saved"], true);
        assert!(lines.iter().any(|l| l["type"] == "progress" && l["phase"] == "saving"));
        assert!(dir.path().join("TC-1_Wakeup.robot").exists());
        assert!(dir.path().join("TC-2.robot").exists());
    }

    #[actix_web::test]
    async fn batch_without_ids_is_rejected_before_streaming() {
        let state = web::Data::new(test_app::state(StubLlm::always("x"), StubFetcher::default()));
        let app = test::init_service(App::new().app_data(state).configure(super::super::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/test/generate-batch")
            .set_json(json!({ "testCaseIds": [], "destinationRoot": "/tmp/out" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn dry_run_reports_checker_errors() {
        let checker = Ok(DryRunResult {
            success: false,
            output: String::new(),
            errors: vec!["missing keyword X".to_string()],
            warnings: Vec::new(),
        });
        let state = web::Data::new(test_app::state_with_checker(StubLlm::always("x"), checker));
        let app = test::init_service(App::new().app_data(state).configure(super::super::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/test/dry-run")
            .set_json(json!({ "scriptContent": "*** Test Cases ***\n" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["errors"], json!(["missing keyword X"]));
    }

    #[actix_web::test]
    async fn review_returns_score() {
        let state = web::Data::new(test_app::state(
            StubLlm::always("Score: 7/10\nGood coverage"),
            StubFetcher::default(),
        ));
        let app = test::init_service(App::new().app_data(state).configure(super::super::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/test/review")
            .set_json(json!({ "scriptContent": "*** Test Cases ***\n", "testCaseId": "TC-1" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["score"], 7);
        assert_eq!(body["suggestions"], json!([]));
    }

    #[actix_web::test]
    async fn save_file_writes_robot_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = web::Data::new(test_app::state(StubLlm::always("x"), StubFetcher::default()));
        let app = test::init_service(App::new().app_data(state).configure(super::super::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/test/save-file")
            .set_json(json!({
                "destinationRoot": dir.path().display().to_string(),
                "filename": "TC-9",
                "content": "*** Test Cases ***\n",
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["filePath"].as_str().unwrap().ends_with("TC-9.robot"));
        assert!(dir.path().join("TC-9.robot").exists());
    }

    #[actix_web::test]
    async fn missing_test_case_is_not_found() {
        let state = web::Data::new(test_app::state(StubLlm::always("x"), StubFetcher::default()));
        let app = test::init_service(App::new().app_data(state).configure(super::super::configure)).await;

        let req = test::TestRequest::get()
            .uri("/api/test/codebeamer/testcase/TC-404")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn markdown_becomes_automation_context() {
        let state = web::Data::new(test_app::state(StubLlm::always("x"), StubFetcher::default()));
        let app = test::init_service(App::new().app_data(state).configure(super::super::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/test/parse-markdown")
            .set_json(json!({ "content": "# Libraries\n- CanLibrary\n" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["libraries"], json!(["CanLibrary"]));
        assert_eq!(body["automationContext"], "Libraries:\n- CanLibrary");
    }

    #[actix_web::test]
    async fn tracker_browsing_needs_codebeamer() {
        let state = web::Data::new(test_app::state(StubLlm::always("x"), StubFetcher::default()));
        let app = test::init_service(App::new().app_data(state).configure(super::super::configure)).await;

        let req = test::TestRequest::get()
            .uri("/api/test/codebeamer/test-cases/12")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/test/codebeamer/item/5").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn tracker_test_cases_are_listed() {
        let base = serve_json(r#"{"items":[{"id":101,"name":"TC-1 CAN wakeup"},{"id":102,"name":"TC-2"}]}"#).await;
        let state = test_app::state(StubLlm::always("x"), StubFetcher::default());
        let mut settings = state.settings.codebeamer.clone();
        settings.url = base;
        settings.username = "qa".to_string();
        settings.password = "secret".to_string();
        state.codebeamer.configure(&settings).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(super::super::configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/test/codebeamer/test-cases/12")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["trackerId"], 12);
        assert_eq!(body["testCases"][0]["name"], "TC-1 CAN wakeup");
        assert_eq!(body["testCases"].as_array().unwrap().len(), 2);
    }
}
