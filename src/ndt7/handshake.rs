use std::time::Duration;

use bytes::BytesMut;
use http::{HeaderValue, StatusCode, header};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_tungstenite::tungstenite::handshake::server::{
    Callback, ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{WebSocketStream, accept_hdr_async_with_config};

use crate::error::{HandshakeError, ValidationError};

use super::params::parse_duration_query;
use super::replay::ReplayStream;
use super::{DEFAULT_TIMEOUT, DOWNLOAD_URL_PATH, SEC_WEBSOCKET_PROTOCOL};

/// Parameters of an accepted download request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadRequest {
    pub duration: Duration,
}

/// Checks the path, the `duration` query parameter and the negotiated
/// subprotocol, in that order.
///
/// # Errors
///
/// Returns the first validation failure; the caller answers it without
/// upgrading the connection.
pub fn negotiate(request: &Request) -> Result<DownloadRequest, ValidationError> {
    let path = request.uri().path();
    if path != DOWNLOAD_URL_PATH {
        return Err(ValidationError::UnknownPath {
            path: path.to_owned(),
        });
    }

    let duration = parse_duration_query(request.uri().query())?;

    let protocol = request
        .headers()
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|value| value.to_str().ok())
        .map(str::trim);
    if protocol != Some(SEC_WEBSOCKET_PROTOCOL) {
        return Err(ValidationError::MissingSubprotocol {
            expected: SEC_WEBSOCKET_PROTOCOL,
        });
    }

    Ok(DownloadRequest { duration })
}

/// Builds the client-error response for a rejected request. The connection
/// is marked non-persistent.
#[must_use]
pub fn rejection_response(err: &ValidationError) -> ErrorResponse {
    let status = if matches!(err, ValidationError::UnknownPath { .. }) {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::BAD_REQUEST
    };
    let mut response = ErrorResponse::new(None);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("Close"));
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
    response
}

fn accept_response(mut response: Response) -> Response {
    response.headers_mut().insert(
        header::SEC_WEBSOCKET_PROTOCOL,
        HeaderValue::from_static(SEC_WEBSOCKET_PROTOCOL),
    );
    response
}

#[must_use]
pub fn websocket_config(max_message_size: usize) -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(max_message_size);
    config.max_frame_size = Some(max_message_size);
    config
}

/// Longest wait for a complete request head.
const REQUEST_HEAD_TIMEOUT: Duration = DEFAULT_TIMEOUT;

/// Largest request head read before the upgrade.
const MAX_REQUEST_HEAD_SIZE: usize = 16 * 1024;

const MAX_REQUEST_HEADERS: usize = 64;

/// Bytes read off the connection up to the end of the request head, and the
/// request they parse to.
struct RequestHead {
    bytes: BytesMut,
    request: Result<Request, ValidationError>,
}

/// Parses a request head. `Ok(None)` means more bytes are needed.
fn parse_request_head(buf: &[u8]) -> Result<Option<Request>, ValidationError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_REQUEST_HEADERS];
    let mut parsed = httparse::Request::new(&mut headers);
    let status = parsed
        .parse(buf)
        .map_err(|err| ValidationError::MalformedRequest {
            reason: err.to_string(),
        })?;
    if status.is_partial() {
        return Ok(None);
    }

    let mut builder = http::Request::builder()
        .method(parsed.method.unwrap_or_default())
        .uri(parsed.path.unwrap_or_default());
    for field in parsed.headers.iter() {
        builder = builder.header(field.name, field.value);
    }
    builder
        .body(())
        .map(Some)
        .map_err(|err| ValidationError::MalformedRequest {
            reason: err.to_string(),
        })
}

async fn read_request_head<S>(stream: &mut S) -> Result<RequestHead, HandshakeError>
where
    S: AsyncRead + Unpin,
{
    let mut bytes = BytesMut::with_capacity(1024);
    loop {
        if stream.read_buf(&mut bytes).await? == 0 {
            return Err(HandshakeError::Incomplete);
        }
        let request = match parse_request_head(&bytes) {
            Ok(Some(request)) => Ok(request),
            Ok(None) if bytes.len() < MAX_REQUEST_HEAD_SIZE => continue,
            Ok(None) => Err(ValidationError::MalformedRequest {
                reason: format!("request head exceeds {} bytes", MAX_REQUEST_HEAD_SIZE),
            }),
            Err(err) => Err(err),
        };
        return Ok(RequestHead { bytes, request });
    }
}

/// Writes the client-error response for `err` and closes the write side.
async fn send_rejection<S>(stream: &mut S, err: &ValidationError) -> Result<(), HandshakeError>
where
    S: AsyncWrite + Unpin,
{
    let response = rejection_response(err);
    let status = response.status();
    let mut encoded = format!(
        "HTTP/1.1 {} {}\r\n",
        status.as_str(),
        status.canonical_reason().unwrap_or_default()
    )
    .into_bytes();
    for (name, value) in response.headers() {
        encoded.extend_from_slice(name.as_str().as_bytes());
        encoded.extend_from_slice(b": ");
        encoded.extend_from_slice(value.as_bytes());
        encoded.extend_from_slice(b"\r\n");
    }
    encoded.extend_from_slice(b"\r\n");

    stream.write_all(&encoded).await?;
    stream.shutdown().await?;
    Ok(())
}

struct EchoSubprotocol;

impl Callback for EchoSubprotocol {
    fn on_request(self, _request: &Request, response: Response) -> Result<Response, ErrorResponse> {
        Ok(accept_response(response))
    }
}

/// Validates a download request and upgrades it to a websocket.
///
/// The request head is read and checked before any upgrade is attempted, so
/// a request with a bad path, `duration` or subprotocol is answered with a
/// client error even when it carries no upgrade headers at all.
///
/// # Errors
///
/// Returns [`HandshakeError::Rejected`] when the request failed validation
/// (the client already received the error response),
/// [`HandshakeError::Upgrade`] when the upgrade itself failed, and an I/O,
/// timeout or incomplete-request error when no request head was read.
pub async fn upgrade<S>(
    mut stream: S,
    max_message_size: usize,
) -> Result<(WebSocketStream<ReplayStream<S>>, DownloadRequest), HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let head = tokio::time::timeout(REQUEST_HEAD_TIMEOUT, read_request_head(&mut stream))
        .await
        .map_err(|source| HandshakeError::RequestTimeout {
            timeout: REQUEST_HEAD_TIMEOUT,
            source,
        })??;

    let download = match head.request.and_then(|request| negotiate(&request)) {
        Ok(download) => download,
        Err(source) => {
            send_rejection(&mut stream, &source).await?;
            return Err(HandshakeError::Rejected { source });
        }
    };

    let websocket = accept_hdr_async_with_config(
        ReplayStream::new(head.bytes.freeze(), stream),
        EchoSubprotocol,
        Some(websocket_config(max_message_size)),
    )
    .await
    .map_err(|err| HandshakeError::Upgrade {
        source: Box::new(err),
    })?;
    Ok((websocket, download))
}
