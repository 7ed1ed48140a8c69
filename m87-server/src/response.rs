use axum::{
    http::header::CONTENT_TYPE,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, IntoResponseParts, Response, ResponseParts},
};
use serde::Serialize;
use std::fmt::Display;
use tracing::error;

#[derive(Debug)]
pub struct ServerResponse<T: Serialize> {
    pub body: Option<T>,
    pub headers: HeaderMap,
    pub status_code: StatusCode,
    pub pagination: Option<ResponsePagination>,
}

#[derive(Debug)]
pub struct ResponsePagination {
    pub count: u64,
    pub offset: u64,
    pub limit: u32,
}

impl IntoResponseParts for ResponsePagination {
    type Error = (StatusCode, String);

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        res.headers_mut()
            .insert("x-pagination-count", self.count.into());
        res.headers_mut()
            .insert("x-pagination-offset", self.offset.into());
        res.headers_mut()
            .insert("x-pagination-limit", self.limit.into());
        Ok(res)
    }
}

#[derive(Debug)]
pub struct ServerResponseBuilder<T: Serialize> {
    pub body: Option<T>,
    pub headers: Option<HeaderMap>,
    pub status_code: Option<StatusCode>,
    pub pagination: Option<ResponsePagination>,
}

impl<T> ServerResponseBuilder<T>
where
    T: Serialize,
{
    pub fn body(mut self, body: T) -> Self {
        self.body = Some(body);
        self
    }

    pub fn status_code(mut self, status_code: StatusCode) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn ok(mut self) -> Self {
        self.status_code = Some(StatusCode::OK);
        self
    }

    pub fn not_found(mut self) -> Self {
        self.status_code = Some(StatusCode::NOT_FOUND);
        self
    }

    pub fn build(self) -> ServerResponse<T> {
        ServerResponse {
            body: self.body,
            headers: self.headers.unwrap_or_default(),
            status_code: self.status_code.unwrap_or(StatusCode::OK),
            pagination: self.pagination,
        }
    }

    pub fn new() -> Self {
        Self {
            body: None,
            headers: None,
            status_code: None,
            pagination: None,
        }
    }
}

impl<T: Serialize> ServerResponse<T> {
    pub fn builder() -> ServerResponseBuilder<T> {
        ServerResponseBuilder::new()
    }
}

impl<T: Serialize> IntoResponse for ServerResponse<T>
where
    axum::Json<T>: IntoResponse,
{
    fn into_response(self) -> Response {
        let body = match self.body {
            Some(body) => body,
            None => return self.status_code.into_response(),
        };

        let bytes = match serde_json::to_vec(&body) {
            Ok(b) => b,
            Err(err) => {
                tracing::error!("error serializing response body: {:?}", err);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let mut headers = self.headers.clone();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        match self.pagination {
            Some(p) => (self.status_code, p, headers, bytes).into_response(),
            None => (self.status_code, headers, bytes).into_response(),
        }
    }
}

/// Error taxonomy for the router core (see spec §7).
///
/// `InternalError` covers invariant violations (programming errors, e.g. the
/// weighted primitive returning an out-of-range index). `BadRequest` covers
/// configuration errors (no targets configured, all targets disabled).
/// Availability errors are not a variant here: the spec requires they
/// surface as an empty-result sentinel (`""`/`None`), not an exception.
#[derive(Debug)]
pub enum ServerError {
    InternalError(String),
    BadRequest(String),
    NotFound(String),
}

impl Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::InternalError(message) => write!(f, "internal error: {}", message),
            ServerError::BadRequest(message) => write!(f, "bad request: {}", message),
            ServerError::NotFound(message) => write!(f, "not found: {}", message),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::InternalError(err.to_string())
    }
}

impl ServerError {
    pub fn internal_error(message: &str) -> Self {
        ServerError::InternalError(message.to_string())
    }

    pub fn bad_request(message: &str) -> Self {
        ServerError::BadRequest(message.to_string())
    }

    pub fn not_found(message: &str) -> Self {
        ServerError::NotFound(message.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            message: String,
        }

        let (status, message) = match &self {
            ServerError::InternalError(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
            ServerError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ServerError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        };

        error!("returning error response {} {}", status, message);

        (
            status,
            ServerResponse::<ErrorResponse>::builder()
                .body(ErrorResponse {
                    message: message.to_owned(),
                })
                .status_code(status)
                .build(),
        )
            .into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
pub type ServerAppResult<T> = Result<ServerResponse<T>, ServerError>;
