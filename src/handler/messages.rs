//! Message board handlers
//!
//! Each handler receives its collaborators explicitly (storage, clock,
//! board policy, request) and returns a complete JSON response.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::BoardError;
use super::request::BoardRequest;
use crate::clock::Clock;
use crate::config::BoardConfig;
use crate::http::{error_response, json_response};
use crate::logger;
use crate::storage::{Message, MessageStore, SharedStore, StorageError, StorageResult};

/// `GET /messages` envelope
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageListBody<'a> {
    success: bool,
    data: &'a [Message],
    message_verification_enabled: bool,
    reactions_enabled: bool,
}

/// `POST /messages` success envelope
#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    success: bool,
    data: SubmittedMessage<'a>,
}

#[derive(Debug, Serialize)]
struct SubmittedMessage<'a> {
    content: &'a str,
    author: &'a str,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct VerifyBody {
    valid: bool,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: &'static str,
}

/// Submission payload; any client-sent timestamp is ignored
#[derive(Debug, Deserialize)]
struct SubmitRequest {
    content: String,
    #[serde(default)]
    username: Option<String>,
}

/// Serve the full message list
pub async fn serve_messages(storage: &SharedStore, board: &BoardConfig) -> Response<Full<Bytes>> {
    let store = Arc::clone(storage);
    match run_blocking(move || store.get_messages()).await {
        Ok(messages) => json_response(
            StatusCode::OK,
            &MessageListBody {
                success: true,
                data: &messages,
                message_verification_enabled: board.message_verification_enabled,
                reactions_enabled: board.reactions_enabled,
            },
        ),
        Err(e) => failure_response(&BoardError::storage("Failed to load messages", e)),
    }
}

/// Store a new message stamped with the server's current time
pub async fn submit_message(
    storage: &SharedStore,
    clock: &dyn Clock,
    board: &BoardConfig,
    request: &BoardRequest,
) -> Response<Full<Bytes>> {
    match submit(storage, clock, board, request).await {
        Ok(message) => {
            logger::log_debug(&format!(
                "Saved message from '{}' (verified: {})",
                message.author, message.verified
            ));
            json_response(
                StatusCode::OK,
                &SubmitBody {
                    success: true,
                    data: SubmittedMessage {
                        content: &message.content,
                        author: &message.author,
                        timestamp: message.timestamp_string(),
                    },
                },
            )
        }
        Err(e) => failure_response(&e),
    }
}

/// `{"valid": bool}` for the `username` query parameter
pub fn verify_username(storage: &SharedStore, request: &BoardRequest) -> Response<Full<Bytes>> {
    let username = request.query_param("username").unwrap_or_default();
    json_response(
        StatusCode::OK,
        &VerifyBody {
            valid: storage.verify_username(&username),
        },
    )
}

/// Liveness probe
pub fn serve_status_page() -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &StatusBody { status: "running" })
}

async fn submit(
    storage: &SharedStore,
    clock: &dyn Clock,
    board: &BoardConfig,
    request: &BoardRequest,
) -> Result<Message, BoardError> {
    let payload = parse_submission(&request.body)?;

    let username = resolve_username(
        payload.username.as_deref(),
        request.session_username.as_deref(),
    )
    .ok_or_else(|| BoardError::MalformedRequest("Username is required".to_string()))?;

    let content = payload.content.trim();
    if content.is_empty() {
        return Err(BoardError::ValidationFailure(
            "Message content cannot be empty".to_string(),
        ));
    }
    if content.chars().count() > board.max_message_length {
        return Err(BoardError::ValidationFailure(format!(
            "Message exceeds {} characters",
            board.max_message_length
        )));
    }
    if board.message_verification_enabled && !storage.verify_username(&username) {
        return Err(BoardError::ValidationFailure(format!(
            "Username '{username}' failed verification"
        )));
    }

    let timestamp = clock.now();
    let content = content.to_string();
    let store = Arc::clone(storage);
    run_blocking(move || store.save_message(&username, &content, timestamp))
        .await
        .map_err(|e| BoardError::storage("Failed to save message", e))
}

/// The body must be a JSON object; serde would otherwise accept an array by position
fn parse_submission(body: &[u8]) -> Result<SubmitRequest, BoardError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| BoardError::MalformedRequest(format!("Invalid JSON body: {e}")))?;
    if !value.is_object() {
        return Err(BoardError::MalformedRequest(
            "Request body must be a JSON object".to_string(),
        ));
    }
    serde_json::from_value(value)
        .map_err(|e| BoardError::MalformedRequest(format!("Invalid message body: {e}")))
}

/// Body username wins; the session cookie is the fallback. Resolved once.
fn resolve_username(body: Option<&str>, session: Option<&str>) -> Option<String> {
    [body, session]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(ToString::to_string)
}

/// Run a blocking storage call off the async workers
async fn run_blocking<T, F>(op: F) -> StorageResult<T>
where
    F: FnOnce() -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| StorageError::Unavailable(e.to_string()))?
}

fn failure_response(err: &BoardError) -> Response<Full<Bytes>> {
    match err {
        BoardError::StorageFailure { .. } => logger::log_error(&err.to_string()),
        _ => logger::log_warning(&format!("Rejected submission: {err}")),
    }
    error_response(err.status(), err.public_message())
}
