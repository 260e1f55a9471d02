use super::error_response;
use crate::domain::conversation::ChatRequest;
use crate::interfaces::state::AppState;
use actix_web::{delete, get, post, web, HttpResponse, Responder};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::info;

enum StreamEvent {
    Chunk(String),
    Done,
    Failed(String),
}

/// One server-sent event: `{"chunk": ...}` per piece, `[DONE]` at the end, `{"error": ...}` on failure.
fn sse_frame(event: &StreamEvent) -> Result<web::Bytes, serde_json::Error> {
    let data = match event {
        StreamEvent::Chunk(chunk) => serde_json::to_string(&json!({ "chunk": chunk }))?,
        StreamEvent::Done => "[DONE]".to_string(),
        StreamEvent::Failed(detail) => serde_json::to_string(&json!({ "error": detail }))?,
    };
    Ok(web::Bytes::from(format!("data: {}\n\n", data)))
}

#[post("/chat/send")]
async fn send_message(data: web::Data<AppState>, req: web::Json<ChatRequest>) -> impl Responder {
    info!(session_id = %req.session_id, model = %req.model, "Chat message received");
    match data.chat.send(&req).await {
        Ok(reply) => HttpResponse::Ok().json(reply),
        Err(e) => error_response(e),
    }
}

/// Request problems are answered with a status before the stream opens; model failures
/// arrive as an error event.
#[post("/chat/stream")]
async fn stream_message(data: web::Data<AppState>, req: web::Json<ChatRequest>) -> HttpResponse {
    let request = req.into_inner();
    if let Err(e) = data.chat.check(&request) {
        return error_response(e);
    }
    info!(session_id = %request.session_id, model = %request.model, "Chat stream requested");

    let (tx, rx) = mpsc::unbounded_channel::<StreamEvent>();
    let state = data.clone();
    actix_web::rt::spawn(async move {
        let chunk_tx = tx.clone();
        let outcome = state
            .chat
            .stream(&request, move |chunk| {
                let _ = chunk_tx.send(StreamEvent::Chunk(chunk));
            })
            .await;
        let last = match outcome {
            Ok(_) => StreamEvent::Done,
            Err(e) => StreamEvent::Failed(e.to_string()),
        };
        let _ = tx.send(last);
    });

    let body = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((sse_frame(&event), rx))
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(body)
}

#[get("/chat/history/{session_id}")]
async fn get_history(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let session_id = path.into_inner();
    let turns = data.chat.history(&session_id).await;
    HttpResponse::Ok().json(json!({ "sessionId": session_id, "turns": turns }))
}

#[delete("/chat/history/{session_id}")]
async fn clear_history(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let session_id = path.into_inner();
    data.chat.clear(&session_id).await;
    HttpResponse::Ok().json(json!({ "status": "cleared", "sessionId": session_id }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(send_message)
        .service(stream_message)
        .service(get_history)
        .service(clear_history);
}

#[cfg(test)]
mod tests {
    use super::super::test_app;
    use super::*;
    use crate::domain::error::AppError;
    use crate::test_support::{StubFetcher, StubLlm};
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn send_then_read_history() {
        let state = web::Data::new(test_app::state(StubLlm::always("Hi there"), StubFetcher::default()));
        let app = test::init_service(App::new().app_data(state).configure(super::super::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/chat/send")
            .set_json(json!({ "message": "hello", "sessionId": "s1" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["response"], "Hi there");
        assert_eq!(body["sessionId"], "s1");

        let req = test::TestRequest::get().uri("/api/chat/history/s1").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["turns"].as_array().unwrap().len(), 2);
        assert_eq!(body["turns"][0]["role"], "user");

        let req = test::TestRequest::delete().uri("/api/chat/history/s1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/api/chat/history/s1").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["turns"].as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn unknown_model_is_a_bad_request() {
        let state = web::Data::new(test_app::state(StubLlm::always("ok"), StubFetcher::default()));
        let app = test::init_service(App::new().app_data(state).configure(super::super::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/chat/send")
            .set_json(json!({ "message": "hello", "model": "gpt-x" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn exacode_without_key_is_unauthorized() {
        let state = web::Data::new(test_app::state(StubLlm::always("ok"), StubFetcher::default()));
        let app = test::init_service(App::new().app_data(state).configure(super::super::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/chat/send")
            .set_json(json!({ "message": "hello", "model": "exacode" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn backend_down_is_service_unavailable() {
        let llm = StubLlm::failing(AppError::Unavailable("connection refused".to_string()));
        let state = web::Data::new(test_app::state(llm, StubFetcher::default()));
        let app = test::init_service(App::new().app_data(state).configure(super::super::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/chat/send")
            .set_json(json!({ "message": "hello" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn stream_sends_chunks_then_done() {
        let state = web::Data::new(test_app::state(StubLlm::always("Hi there"), StubFetcher::default()));
        let app = test::init_service(App::new().app_data(state).configure(super::super::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/chat/stream")
            .set_json(json!({ "message": "hello", "sessionId": "s2" }))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        let text = std::str::from_utf8(&body).unwrap();
        assert_eq!(
            text,
            "data: {\"chunk\":\"Hi \"}\n\ndata: {\"chunk\":\"there\"}\n\ndata: [DONE]\n\n"
        );

        let req = test::TestRequest::get().uri("/api/chat/history/s2").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["turns"][1]["content"], "Hi there");
    }

    #[actix_web::test]
    async fn stream_failure_is_an_error_event() {
        let llm = StubLlm::failing(AppError::Unavailable("connection refused".to_string()));
        let state = web::Data::new(test_app::state(llm, StubFetcher::default()));
        let app = test::init_service(App::new().app_data(state).configure(super::super::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/chat/stream")
            .set_json(json!({ "message": "hello", "sessionId": "s3" }))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.starts_with("data: {\"error\":"));
        assert!(!text.contains("[DONE]"));
    }

    #[actix_web::test]
    async fn stream_without_exacode_key_is_unauthorized() {
        let state = web::Data::new(test_app::state(StubLlm::always("ok"), StubFetcher::default()));
        let app = test::init_service(App::new().app_data(state).configure(super::super::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/chat/stream")
            .set_json(json!({ "message": "hello", "model": "exacode" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
