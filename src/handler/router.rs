//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: route matching, method checks,
//! body limits, dispatch to the message handlers and access logging.

use crate::config::AppState;
use crate::handler::messages;
use crate::handler::request::BoardRequest;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, SERVER};
use hyper::{Method, Request, Response, StatusCode, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Known endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Messages,
    VerifyUsername,
    Status,
}

impl Route {
    fn from_path(path: &str) -> Option<Self> {
        match path {
            "/messages" => Some(Self::Messages),
            "/verify_username" => Some(Self::VerifyUsername),
            "/status" => Some(Self::Status),
            _ => None,
        }
    }

    /// Value for the `Allow` header
    const fn allow(self) -> &'static str {
        match self {
            Self::Messages => "GET, POST, OPTIONS",
            Self::VerifyUsername | Self::Status => "GET, OPTIONS",
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let mut entry = state
        .config
        .logging
        .access_log
        .then(|| access_entry(&req, peer_addr));

    let mut response = route_request(req, &state).await;
    finalize_headers(&mut response, &state);

    if let Some(entry) = entry.as_mut() {
        entry.status = response.status().as_u16();
        entry.body_bytes = usize::try_from(response.body().size_hint().lower()).unwrap_or(0);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

async fn route_request<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let Some(route) = Route::from_path(req.uri().path()) else {
        return http::build_404_response();
    };

    match (req.method().clone(), route) {
        (Method::OPTIONS, _) => {
            http::build_options_response(route.allow(), state.config.http.enable_cors)
        }
        (Method::GET, Route::Messages) => {
            messages::serve_messages(&state.storage, &state.config.board).await
        }
        (Method::POST, Route::Messages) => {
            let request = match read_request(req, state.config.http.max_body_size).await {
                Ok(request) => request,
                Err(resp) => return resp,
            };
            messages::submit_message(
                &state.storage,
                state.clock.as_ref(),
                &state.config.board,
                &request,
            )
            .await
        }
        (Method::GET, Route::VerifyUsername) => {
            let (parts, _) = req.into_parts();
            let request = BoardRequest::from_parts(&parts, Bytes::new());
            messages::verify_username(&state.storage, &request)
        }
        (Method::GET, Route::Status) => messages::serve_status_page(),
        (method, _) => {
            logger::log_warning(&format!("Method not allowed: {method} {}", req.uri().path()));
            http::build_405_response(route.allow())
        }
    }
}

/// Collect the body within `max_body_size` and build the handler request
async fn read_request<B>(
    req: Request<B>,
    max_body_size: u64,
) -> Result<BoardRequest, Response<Full<Bytes>>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if let Some(resp) = check_body_size(&req, max_body_size) {
        return Err(resp);
    }

    let (parts, body) = req.into_parts();
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(BoardRequest::from_parts(&parts, collected.to_bytes())),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            logger::log_warning(&format!("Request body exceeded {max_body_size} bytes"));
            Err(http::build_413_response(max_body_size))
        }
        Err(e) => {
            logger::log_warning(&format!("Failed to read request body: {e}"));
            Err(http::error_response(
                StatusCode::BAD_REQUEST,
                "Failed to read request body",
            ))
        }
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_warning(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response(max_body_size))
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', relying on streamed limit"
                ));
                None
            }
            _ => None,
        },
    )
}

/// Headers every response carries
fn finalize_headers(response: &mut Response<Full<Bytes>>, state: &AppState) {
    let headers = response.headers_mut();
    if let Ok(server) = HeaderValue::from_str(&state.config.http.server_name) {
        headers.insert(SERVER, server);
    }
    if state.config.http.enable_cors {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    }
}

fn access_entry<B>(req: &Request<B>, peer_addr: SocketAddr) -> AccessLogEntry {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = match req.version() {
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        _ => "1.1",
    }
    .to_string();
    entry.referer = header("referer");
    entry.user_agent = header("user-agent");
    entry
}
