use std::error::Error;

use fetchcoord_service::caching::{ErrorInfo, ErrorKind};
use reqwest::StatusCode;
use url::Url;

/// Maps an unsuccessful response status to an [`ErrorInfo`].
///
/// This uses the HTTP status code only and does not consider the response body.
pub fn status_error(url: &Url, status: StatusCode) -> ErrorInfo {
    debug_assert!(!status.is_success());

    if matches!(status, StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED) {
        tracing::debug!("Insufficient permissions to fetch `{url}`: {status}");
        ErrorInfo::permission(status.to_string())
    } else if status.is_client_error() {
        // If it's a client error, chances are it's a 404.
        tracing::debug!("Unexpected client error status code from `{url}`: {status}");
        ErrorInfo::not_found(status.to_string())
    } else if status.is_server_error() {
        tracing::debug!("Unexpected server error status code from `{url}`: {status}");
        ErrorInfo::network(status.to_string())
    } else {
        tracing::debug!("Unexpected status code from `{url}`: {status}");
        ErrorInfo::unknown(status.to_string())
    }
}

/// Maps a failed request to an [`ErrorInfo`].
///
/// Connection problems, timeouts and failures to read the body are [`ErrorKind::Network`]
/// errors. The innermost source of `error` becomes the cause.
pub fn transport_error(error: reqwest::Error) -> ErrorInfo {
    if let (Some(status), Some(url)) = (error.status(), error.url()) {
        return status_error(url, status);
    }

    let kind = if error.is_connect() || error.is_timeout() || error.is_body() || error.is_request()
    {
        ErrorKind::Network
    } else {
        ErrorKind::Unknown
    };

    let cause = innermost_cause(&error);
    let mut info = ErrorInfo::new(kind, error.without_url().to_string());
    info.cause = cause;
    info
}

fn innermost_cause(mut error: &dyn Error) -> Option<String> {
    error.source()?;
    while let Some(src) = error.source() {
        error = src;
    }

    let mut cause = error.to_string();

    // Special-case a few error strings
    if cause.contains("certificate verify failed") {
        cause = "certificate verify failed".to_string();
    }

    if cause.contains("SSL routines") {
        cause = "SSL error".to_string();
    }

    Some(cause)
}
