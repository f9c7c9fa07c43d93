//! WebSocket upgrade with identity capture.
//!
//! The upgrade request is inspected inside the tungstenite accept callback.
//! That is the only point where the HTTP headers are visible.  The callback:
//!
//! 1. reads the device [`ID`] from the device-name header (required),
//! 2. reads the optional [`Convey`] header,
//! 3. runs the configured key function,
//! 4. echoes the first client-offered subprotocol the gateway accepts.
//!
//! Any failure in 1 or 3 answers `400 Bad Request` and the upgrade never
//! completes.  The whole exchange is bounded by `handshake_timeout`.
//!
//! The raw stream is wrapped in a `BufReader` of `read_buffer_size` bytes, so
//! socket reads happen in chunks of that size.  Frames and messages larger
//! than the codec's limit are refused by tungstenite before they are buffered.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{header::SEC_WEBSOCKET_PROTOCOL, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{accept_hdr_async_with_config, WebSocketStream};
use thiserror::Error;
use tracing::debug;
use wrp_core::CodecConfig;

use crate::domain::{Convey, DeviceOptions, Key, RegistryError, ID};

/// Why a connection never became an open session.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("websocket handshake did not complete within {0:?}")]
    Timeout(Duration),

    #[error("websocket upgrade failed: {0}")]
    Upgrade(#[from] tokio_tungstenite::tungstenite::Error),

    /// The request was answered with `400 Bad Request`.
    #[error("upgrade request rejected: {0}")]
    Rejected(String),

    #[error("session could not be registered: {0}")]
    Registry(#[from] RegistryError),
}

/// A completed upgrade and the identity captured from its request.
pub struct Handshake<S> {
    pub stream: WebSocketStream<BufReader<S>>,
    pub id: ID,
    pub key: Key,
    pub convey: Convey,
}

#[derive(Debug)]
struct Identity {
    id: ID,
    key: Key,
    convey: Convey,
}

/// Runs the server side of the upgrade on `stream`.
pub async fn accept<S>(
    stream: S,
    options: &DeviceOptions,
    codec: &CodecConfig,
) -> Result<Handshake<S>, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let stream = BufReader::with_capacity(options.read_buffer_size, stream);
    let config = transport_config(options, codec);

    let mut captured: Option<Result<Identity, String>> = None;
    let callback = |request: &Request, response: Response| {
        let outcome = inspect(request, response, options);
        match outcome {
            Ok((identity, response)) => {
                captured = Some(Ok(identity));
                Ok(response)
            }
            Err(reason) => {
                let mut rejection = ErrorResponse::new(Some(reason.clone()));
                *rejection.status_mut() = StatusCode::BAD_REQUEST;
                captured = Some(Err(reason));
                Err(rejection)
            }
        }
    };

    let upgrade = timeout(
        options.handshake_timeout,
        accept_hdr_async_with_config(stream, callback, Some(config)),
    )
    .await
    .map_err(|_| HandshakeError::Timeout(options.handshake_timeout))?;

    match (upgrade, captured) {
        (Ok(stream), Some(Ok(identity))) => Ok(Handshake {
            stream,
            id: identity.id,
            key: identity.key,
            convey: identity.convey,
        }),
        (Err(_), Some(Err(reason))) => {
            debug!(%reason, "rejected websocket upgrade");
            Err(HandshakeError::Rejected(reason))
        }
        (Err(e), _) => Err(HandshakeError::Upgrade(e)),
        // The callback always runs before a successful upgrade returns.
        (Ok(_), _) => Err(HandshakeError::Rejected(
            "upgrade completed without inspecting the request".to_string(),
        )),
    }
}

fn transport_config(options: &DeviceOptions, codec: &CodecConfig) -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.write_buffer_size = options.write_buffer_size;
    config.max_message_size = Some(codec.max_message_size);
    config.max_frame_size = Some(codec.max_message_size);
    config
}

fn inspect(
    request: &Request,
    mut response: Response,
    options: &DeviceOptions,
) -> Result<(Identity, Response), String> {
    let headers = request.headers();

    let id = headers
        .get(options.device_name_header.as_str())
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ID::new)
        .ok_or_else(|| format!("missing device name header {}", options.device_name_header))?;

    let convey = match headers.get(options.convey_header.as_str()) {
        Some(value) => Convey::new(
            value
                .to_str()
                .map_err(|_| format!("{} is not valid text", options.convey_header))?,
        ),
        None => Convey::none(),
    };

    let key = (options.key_func)(&id, &convey, request)
        .map_err(|e| format!("could not derive a key for {id}: {e:#}"))?;

    if let Some(protocol) = negotiate_subprotocol(request, &options.subprotocols) {
        if let Ok(value) = HeaderValue::from_str(protocol) {
            response.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
        }
    }

    Ok((Identity { id, key, convey }, response))
}

/// First protocol the client offered that is also in `accepted`.
fn negotiate_subprotocol<'a>(request: &Request, accepted: &'a [String]) -> Option<&'a str> {
    if accepted.is_empty() {
        return None;
    }
    request
        .headers()
        .get_all(SEC_WEBSOCKET_PROTOCOL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .find_map(|offered| accepted.iter().find(|a| a.as_str() == offered))
        .map(String::as_str)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
