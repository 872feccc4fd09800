use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use triggergate_application::{CallHandler, CallRequest, CallResponder};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct SuccessBody {
    result: Option<Value>,
}

/// Collects the single capability the call handler invokes and turns
/// it into an HTTP response afterwards.
#[derive(Default)]
struct HttpCallResponder {
    response: Option<Response>,
}

impl CallResponder for HttpCallResponder {
    fn bad_request(&mut self, info: String) {
        self.response =
            Some((StatusCode::BAD_REQUEST, Json(ErrorBody { error: info })).into_response());
    }

    fn no_group_permission(&mut self) {
        self.response = Some(
            (
                StatusCode::FORBIDDEN,
                Json(ErrorBody {
                    error: "no group permission for this call".to_owned(),
                }),
            )
                .into_response(),
        );
    }

    fn error(&mut self, info: String) {
        self.response = Some(
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody { error: info }),
            )
                .into_response(),
        );
    }

    fn success(&mut self, result: Option<Value>) {
        self.response = Some((StatusCode::OK, Json(SuccessBody { result })).into_response());
    }
}

pub async fn call_handler(
    State(handler): State<Arc<CallHandler>>,
    Json(request): Json<CallRequest>,
) -> Response {
    let mut responder = HttpCallResponder::default();
    handler.call(&request, &mut responder).await;

    responder.response.unwrap_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: "call produced no response".to_owned(),
            }),
        )
            .into_response()
    })
}
