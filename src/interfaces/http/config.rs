use super::error_response;
use crate::domain::llm_config::{LLMProvider, LlmSettingsUpdate};
use crate::interfaces::state::AppState;
use actix_web::{get, post, put, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
pub struct TestLlmRequest {
    #[serde(default)]
    pub provider: Option<LLMProvider>,
}

fn default_ssl_verify() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBeamerConfigRequest {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_ssl_verify")]
    pub ssl_verify: bool,
}

/// Current configuration with every secret replaced by a presence flag.
#[get("/config")]
async fn current_config(data: web::Data<AppState>) -> impl Responder {
    let llm = match data.provider.view() {
        Ok(view) => view,
        Err(e) => return error_response(e),
    };
    let settings = &data.settings;
    let codebeamer = match data.codebeamer.current() {
        Some(client) => json!({
            "configured": true,
            "url": client.url(),
            "username": client.username(),
            "sslVerify": client.ssl_verify(),
        }),
        None => json!({
            "configured": false,
            "url": settings.codebeamer.url,
            "username": settings.codebeamer.username,
            "sslVerify": settings.codebeamer.ssl_verify,
        }),
    };
    HttpResponse::Ok().json(json!({
        "appName": settings.app_name,
        "llm": llm,
        "codebeamer": codebeamer,
        "chat": { "maxHistoryTurns": settings.chat.max_history_turns },
        "syntaxChecker": settings.syntax_checker.mode,
    }))
}

#[put("/config/llm")]
async fn update_llm(data: web::Data<AppState>, req: web::Json<LlmSettingsUpdate>) -> impl Responder {
    match data.provider.update(req.into_inner()) {
        Ok(view) => HttpResponse::Ok().json(view),
        Err(e) => error_response(e),
    }
}

#[post("/config/test-llm")]
async fn test_llm(data: web::Data<AppState>, req: web::Json<TestLlmRequest>) -> impl Responder {
    let provider = match req.provider {
        Some(provider) => provider,
        None => match data.provider.view() {
            Ok(view) => view.provider,
            Err(e) => return error_response(e),
        },
    };
    HttpResponse::Ok().json(data.provider.test_connection(provider).await)
}

/// An unreachable Ollama yields an empty list rather than an error.
#[get("/config/ollama/models")]
async fn ollama_models(data: web::Data<AppState>) -> impl Responder {
    let models = data
        .provider
        .list_available_models(LLMProvider::Ollama)
        .await
        .unwrap_or_default();
    HttpResponse::Ok().json(json!({ "models": models }))
}

/// Replaces the CodeBeamer client. Rate limit, cache TTL and timeout keep their startup values.
#[post("/config/codebeamer")]
async fn configure_codebeamer(
    data: web::Data<AppState>,
    req: web::Json<CodeBeamerConfigRequest>,
) -> impl Responder {
    let req = req.into_inner();
    let mut settings = data.settings.codebeamer.clone();
    settings.url = req.url.trim().to_string();
    settings.username = req.username.trim().to_string();
    settings.password = req.password;
    settings.ssl_verify = req.ssl_verify;

    match data.codebeamer.configure(&settings) {
        Ok(_) => HttpResponse::Ok().json(json!({
            "success": true,
            "message": "CodeBeamer configured successfully",
        })),
        Err(e) => error_response(e),
    }
}

#[get("/config/codebeamer/stats")]
async fn codebeamer_stats(data: web::Data<AppState>) -> impl Responder {
    match data.codebeamer.require() {
        Ok(client) => HttpResponse::Ok().json(client.stats()),
        Err(e) => error_response(e),
    }
}

#[post("/config/codebeamer/test")]
async fn codebeamer_test(data: web::Data<AppState>) -> impl Responder {
    let Some(client) = data.codebeamer.current() else {
        return HttpResponse::Ok().json(json!({
            "success": false,
            "message": "CodeBeamer is not configured",
        }));
    };
    match client.test_connection().await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "success": true,
            "message": format!("Connected to {}", client.url()),
        })),
        Err(e) => HttpResponse::Ok().json(json!({
            "success": false,
            "message": e.to_string(),
        })),
    }
}

#[post("/config/codebeamer/clear-cache")]
async fn codebeamer_clear_cache(data: web::Data<AppState>) -> impl Responder {
    if let Some(client) = data.codebeamer.current() {
        client.clear_cache();
    }
    HttpResponse::Ok().json(json!({ "status": "cleared" }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(current_config)
        .service(update_llm)
        .service(test_llm)
        .service(ollama_models)
        .service(configure_codebeamer)
        .service(codebeamer_stats)
        .service(codebeamer_test)
        .service(codebeamer_clear_cache);
}

#[cfg(test)]
mod tests {
    use super::super::test_app;
    use super::*;
    use crate::domain::error::AppError;
    use crate::test_support::{StubFetcher, StubLlm};
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn config_never_exposes_the_api_key() {
        let state = web::Data::new(test_app::state(StubLlm::always("ok"), StubFetcher::default()));
        let app = test::init_service(App::new().app_data(state).configure(super::super::configure)).await;

        let req = test::TestRequest::put()
            .uri("/api/config/llm")
            .set_json(json!({ "provider": "exacode", "apiKey": "sk-secret" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/api/config").to_request();
        let body = test::call_and_read_body(&app, req).await;
        let text = std::str::from_utf8(&body).unwrap();
        assert!(!text.contains("sk-secret"));
        let json: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(json["llm"]["exacodeApiKeySet"], true);
        assert_eq!(json["llm"]["provider"], "exacode");
        assert_eq!(json["codebeamer"]["configured"], false);
    }

    #[actix_web::test]
    async fn test_llm_lists_models() {
        let state = web::Data::new(test_app::state(StubLlm::always("ok"), StubFetcher::default()));
        let app = test::init_service(App::new().app_data(state).configure(super::super::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/config/test-llm")
            .set_json(json!({ "provider": "ollama" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["models"], json!(["llama3:8b", "qwen3:8b"]));
    }

    #[actix_web::test]
    async fn unreachable_ollama_lists_nothing() {
        let llm = StubLlm::failing(AppError::Unavailable("refused".to_string()));
        let state = web::Data::new(test_app::state(llm, StubFetcher::default()));
        let app = test::init_service(App::new().app_data(state).configure(super::super::configure)).await;

        let req = test::TestRequest::get().uri("/api/config/ollama/models").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["models"], json!([]));
    }

    #[actix_web::test]
    async fn codebeamer_can_be_configured_at_runtime() {
        let state = web::Data::new(test_app::state(StubLlm::always("ok"), StubFetcher::default()));
        let app = test::init_service(App::new().app_data(state).configure(super::super::configure)).await;

        let req = test::TestRequest::get().uri("/api/config/codebeamer/stats").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/config/codebeamer")
            .set_json(json!({ "url": "http://127.0.0.1:9", "username": "qa", "password": "" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/config/codebeamer")
            .set_json(json!({
                "url": "http://127.0.0.1:9",
                "username": "qa",
                "password": "top-secret",
                "sslVerify": false,
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);

        let req = test::TestRequest::get().uri("/api/config").to_request();
        let body = test::call_and_read_body(&app, req).await;
        let text = std::str::from_utf8(&body).unwrap();
        assert!(!text.contains("top-secret"));
        let json: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(json["codebeamer"]["configured"], true);
        assert_eq!(json["codebeamer"]["url"], "http://127.0.0.1:9");
        assert_eq!(json["codebeamer"]["sslVerify"], false);

        let req = test::TestRequest::get().uri("/api/config/codebeamer/stats").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["apiCalls"], 0);
    }
}
