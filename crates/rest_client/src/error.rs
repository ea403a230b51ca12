use engine::RemoteError;
use reqwest::{Response, StatusCode};
use serde::Deserialize;

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
}

pub(crate) fn transport(err: reqwest::Error) -> RemoteError {
    RemoteError::Transport(err.to_string())
}

pub(crate) fn from_status(status: StatusCode, body: String) -> RemoteError {
    match status.as_u16() {
        401 => RemoteError::Unauthorized,
        403 => RemoteError::Forbidden(body),
        404 => RemoteError::NotFound(body),
        409 => RemoteError::Conflict(body),
        400 | 422 => RemoteError::Validation(body),
        _ => RemoteError::Server(body),
    }
}

/// Pass successful responses through; turn the rest into a [`RemoteError`].
pub(crate) async fn check(res: Response) -> Result<Response, RemoteError> {
    if res.status().is_success() {
        return Ok(res);
    }

    let status = res.status();
    let body = res
        .json::<ErrorResponse>()
        .await
        .map(|err| err.message)
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(from_status(status, body))
}
