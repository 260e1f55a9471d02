mod chat;
mod config;
mod test_gen;

use crate::domain::error::AppError;
use crate::interfaces::state::AppState;
use actix_cors::Cors;
use actix_web::http::StatusCode;
use actix_web::{dev::Server, get, web, App, HttpResponse, HttpServer, Responder};
use serde_json::json;
use tracing::{error, warn};

pub fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::ValidationError(_) | AppError::UnknownModel(_) => StatusCode::BAD_REQUEST,
        AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
        AppError::PersistenceError(_) if err.is_permission_denied() => StatusCode::FORBIDDEN,
        AppError::ModelNotFound(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(err: AppError) -> HttpResponse {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(error = %err, status = status.as_u16(), "Request failed");
    } else {
        warn!(error = %err, status = status.as_u16(), "Request rejected");
    }
    HttpResponse::build(status).json(json!({ "detail": err.to_string() }))
}

/// Malformed JSON bodies get the same 400 shape as validation failures.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        actix_web::error::InternalError::from_response(
            err,
            error_response(AppError::ValidationError(message)),
        )
        .into()
    })
}

#[get("/health")]
async fn health(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "app": data.settings.app_name,
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config()).service(health).service(
        web::scope("/api")
            .configure(chat::configure)
            .configure(test_gen::configure)
            .configure(config::configure),
    );
}

pub fn start_server(state: AppState) -> std::io::Result<Server> {
    let host = state.settings.server.host.clone();
    let port = state.settings.server.port;
    let state = web::Data::new(state);

    let server = HttpServer::new(move || {
        let cors = Cors::permissive(); // Local tool, any origin

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((host.as_str(), port))?
    .run();

    Ok(server)
}
