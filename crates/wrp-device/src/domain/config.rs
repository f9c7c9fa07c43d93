//! Device session configuration.
//!
//! [`DeviceOptions`] is the single source of truth for every session setting.
//! Every field has a concrete value from the moment the struct exists:
//! `Default` fills in the documented defaults, and callers override fields
//! with struct-update syntax.  Nothing downstream ever asks "was this set?".
//!
//! The options also carry the observer lists.  They are combined into one
//! dispatch callback per event kind when the manager is built, not per event.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_tungstenite::tungstenite::http::Request;
use uuid::Uuid;

use crate::domain::device::{ConnectListener, DisconnectListener, MessageListener, PongListener};
use crate::domain::error::OptionsError;
use crate::domain::identity::{Convey, Key, ID};

pub const DEFAULT_DEVICE_NAME_HEADER: &str = "X-Webpa-Device-Name";
pub const DEFAULT_CONVEY_HEADER: &str = "X-Webpa-Convey";
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_INITIAL_CAPACITY: usize = 10_000;
pub const DEFAULT_IDLE_PERIOD: Duration = Duration::from_secs(135);
pub const DEFAULT_PING_PERIOD: Duration = Duration::from_secs(45);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 4096;
pub const DEFAULT_MESSAGE_QUEUE_SIZE: usize = 100;

/// Derives a session's routing key from its identity and upgrade request.
///
/// An error rejects the handshake with `400 Bad Request`.
pub type KeyFunc = Arc<dyn Fn(&ID, &Convey, &Request<()>) -> anyhow::Result<Key> + Send + Sync>;

/// The default key function: a fresh random key per session.
pub fn random_key_func() -> KeyFunc {
    Arc::new(|_id: &ID, _convey: &Convey, _request: &Request<()>| {
        Ok::<_, anyhow::Error>(Key::new(Uuid::new_v4().simple().to_string()))
    })
}

/// All runtime configuration for device sessions.
///
/// Build it once at startup, then hand it to the manager, which wraps it in an
/// `Arc` and shares it across every session task.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use wrp_device::domain::DeviceOptions;
///
/// let options = DeviceOptions {
///     idle_period: Duration::from_secs(30),
///     ..DeviceOptions::default()
/// };
/// assert_eq!(options.message_queue_size, 100);
/// ```
#[derive(Clone)]
pub struct DeviceOptions {
    /// Header carrying the device [`ID`].  Required on every upgrade.
    pub device_name_header: String,

    /// Header carrying the opaque [`Convey`] value.  Optional on upgrade.
    pub convey_header: String,

    /// Upper bound on the WebSocket upgrade.
    pub handshake_timeout: Duration,

    /// Capacity hint for the registry indices.
    pub initial_capacity: usize,

    /// A session with no inbound traffic (pongs included) for this long is
    /// presumed dead and closed.
    pub idle_period: Duration,

    /// How often the keepalive task pings the device and checks idleness.
    pub ping_period: Duration,

    /// Upper bound on any single frame write.
    pub write_timeout: Duration,

    pub read_buffer_size: usize,

    pub write_buffer_size: usize,

    /// Subprotocols this gateway will accept, in preference order of the
    /// client's offer.  Empty means no subprotocol is negotiated.
    pub subprotocols: Vec<String>,

    /// Capacity of each session's outbound queue.
    pub message_queue_size: usize,

    pub key_func: KeyFunc,

    /// Parent span for every session span.
    pub span: tracing::Span,

    pub message_listeners: Vec<MessageListener>,
    pub connect_listeners: Vec<ConnectListener>,
    pub disconnect_listeners: Vec<DisconnectListener>,
    pub pong_listeners: Vec<PongListener>,
}

impl Default for DeviceOptions {
    /// | Field                 | Default                 |
    /// |-----------------------|-------------------------|
    /// | device_name_header    | `X-Webpa-Device-Name`   |
    /// | convey_header         | `X-Webpa-Convey`        |
    /// | handshake_timeout     | 10 seconds              |
    /// | initial_capacity      | 10 000                  |
    /// | idle_period           | 135 seconds             |
    /// | ping_period           | 45 seconds              |
    /// | write_timeout         | 60 seconds              |
    /// | read/write buffers    | 4096 bytes              |
    /// | subprotocols          | none                    |
    /// | message_queue_size    | 100                     |
    /// | key_func              | random UUID             |
    /// | listeners             | none                    |
    fn default() -> Self {
        Self {
            device_name_header: DEFAULT_DEVICE_NAME_HEADER.to_string(),
            convey_header: DEFAULT_CONVEY_HEADER.to_string(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            idle_period: DEFAULT_IDLE_PERIOD,
            ping_period: DEFAULT_PING_PERIOD,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            subprotocols: Vec::new(),
            message_queue_size: DEFAULT_MESSAGE_QUEUE_SIZE,
            key_func: random_key_func(),
            span: tracing::info_span!("wrp_device"),
            message_listeners: Vec::new(),
            connect_listeners: Vec::new(),
            disconnect_listeners: Vec::new(),
            pong_listeners: Vec::new(),
        }
    }
}

impl DeviceOptions {
    /// Checks the settings the session tasks depend on.
    ///
    /// Every period, timeout, buffer and queue size must be non-zero, and the
    /// ping period must be shorter than the idle period so an idle device is
    /// noticed within its window.
    ///
    /// # Errors
    ///
    /// The first [`OptionsError`] found.
    pub fn validate(&self) -> Result<(), OptionsError> {
        let durations = [
            ("handshake_timeout", self.handshake_timeout),
            ("idle_period", self.idle_period),
            ("ping_period", self.ping_period),
            ("write_timeout", self.write_timeout),
        ];
        if let Some((field, _)) = durations.into_iter().find(|(_, value)| value.is_zero()) {
            return Err(OptionsError::Zero(field));
        }

        let sizes = [
            ("read_buffer_size", self.read_buffer_size),
            ("write_buffer_size", self.write_buffer_size),
            ("message_queue_size", self.message_queue_size),
        ];
        if let Some((field, _)) = sizes.into_iter().find(|(_, value)| *value == 0) {
            return Err(OptionsError::Zero(field));
        }

        if self.ping_period >= self.idle_period {
            return Err(OptionsError::PingNotBelowIdle {
                ping: self.ping_period,
                idle: self.idle_period,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for DeviceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceOptions")
            .field("device_name_header", &self.device_name_header)
            .field("convey_header", &self.convey_header)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("initial_capacity", &self.initial_capacity)
            .field("idle_period", &self.idle_period)
            .field("ping_period", &self.ping_period)
            .field("write_timeout", &self.write_timeout)
            .field("read_buffer_size", &self.read_buffer_size)
            .field("write_buffer_size", &self.write_buffer_size)
            .field("subprotocols", &self.subprotocols)
            .field("message_queue_size", &self.message_queue_size)
            .field("message_listeners", &self.message_listeners.len())
            .field("connect_listeners", &self.connect_listeners.len())
            .field("disconnect_listeners", &self.disconnect_listeners.len())
            .field("pong_listeners", &self.pong_listeners.len())
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn upgrade_request() -> Request<()> {
        Request::builder()
            .uri("/api/v2/device")
            .body(())
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let o = DeviceOptions::default();
        assert_eq!(o.device_name_header, DEFAULT_DEVICE_NAME_HEADER);
        assert_eq!(o.convey_header, DEFAULT_CONVEY_HEADER);
        assert_eq!(o.handshake_timeout, DEFAULT_HANDSHAKE_TIMEOUT);
        assert_eq!(o.initial_capacity, DEFAULT_INITIAL_CAPACITY);
        assert_eq!(o.idle_period, DEFAULT_IDLE_PERIOD);
        assert_eq!(o.ping_period, DEFAULT_PING_PERIOD);
        assert_eq!(o.write_timeout, DEFAULT_WRITE_TIMEOUT);
        assert_eq!(o.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
        assert_eq!(o.write_buffer_size, DEFAULT_WRITE_BUFFER_SIZE);
        assert!(o.subprotocols.is_empty());
        assert_eq!(o.message_queue_size, DEFAULT_MESSAGE_QUEUE_SIZE);
        assert!(o.message_listeners.is_empty());
        assert!(o.connect_listeners.is_empty());
        assert!(o.disconnect_listeners.is_empty());
        assert!(o.pong_listeners.is_empty());
    }

    #[test]
    fn test_ping_period_is_shorter_than_idle_period_by_default() {
        // Otherwise a healthy device could be declared idle between pings.
        let o = DeviceOptions::default();
        assert!(o.ping_period < o.idle_period);
    }

    #[test]
    fn test_default_key_func_produces_distinct_keys() {
        let o = DeviceOptions::default();
        let id = ID::from("mac:112233445566");
        let request = upgrade_request();
        let a = (o.key_func)(&id, &Convey::none(), &request).unwrap();
        let b = (o.key_func)(&id, &Convey::none(), &request).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn test_overrides_are_preserved() {
        let expected_key = Key::from("TestOptions key");
        let key = expected_key.clone();
        let o = DeviceOptions {
            device_name_header: "X-TestOptions-Device-Name".to_string(),
            convey_header: "X-TestOptions-Convey".to_string(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT + Duration::from_secs(17),
            initial_capacity: DEFAULT_INITIAL_CAPACITY + 4719,
            idle_period: DEFAULT_IDLE_PERIOD + Duration::from_secs(3472 * 60),
            ping_period: DEFAULT_PING_PERIOD + Duration::from_millis(384),
            write_timeout: DEFAULT_WRITE_TIMEOUT + Duration::from_secs(9),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE + 48729,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE + 926,
            subprotocols: vec!["foobar".to_string()],
            message_queue_size: DEFAULT_MESSAGE_QUEUE_SIZE + 287,
            key_func: Arc::new(move |_: &ID, _: &Convey, _: &Request<()>| {
                Ok::<_, anyhow::Error>(key.clone())
            }),
            ..DeviceOptions::default()
        };

        assert_eq!(o.device_name_header, "X-TestOptions-Device-Name");
        assert_eq!(o.convey_header, "X-TestOptions-Convey");
        assert_eq!(o.handshake_timeout, Duration::from_secs(27));
        assert_eq!(o.initial_capacity, 14_719);
        assert_eq!(o.ping_period, Duration::from_millis(45_384));
        assert_eq!(o.write_timeout, Duration::from_secs(69));
        assert_eq!(o.read_buffer_size, 52_825);
        assert_eq!(o.write_buffer_size, 5_022);
        assert_eq!(o.subprotocols, vec!["foobar".to_string()]);
        assert_eq!(o.message_queue_size, 387);

        let actual = (o.key_func)(&ID::from(""), &Convey::none(), &upgrade_request()).unwrap();
        assert_eq!(actual, expected_key);
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert_eq!(DeviceOptions::default().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_zero_periods_and_sizes() {
        let cases: [(&str, DeviceOptions); 5] = [
            ("ping_period", DeviceOptions { ping_period: Duration::ZERO, ..DeviceOptions::default() }),
            ("idle_period", DeviceOptions { idle_period: Duration::ZERO, ..DeviceOptions::default() }),
            ("write_timeout", DeviceOptions { write_timeout: Duration::ZERO, ..DeviceOptions::default() }),
            ("handshake_timeout", DeviceOptions { handshake_timeout: Duration::ZERO, ..DeviceOptions::default() }),
            ("message_queue_size", DeviceOptions { message_queue_size: 0, ..DeviceOptions::default() }),
        ];
        for (field, options) in cases {
            assert_eq!(options.validate(), Err(OptionsError::Zero(field)), "{field}");
        }
    }

    #[test]
    fn test_validate_requires_ping_shorter_than_idle() {
        let o = DeviceOptions {
            ping_period: Duration::from_secs(60),
            idle_period: Duration::from_secs(60),
            ..DeviceOptions::default()
        };
        assert_eq!(
            o.validate(),
            Err(OptionsError::PingNotBelowIdle {
                ping: Duration::from_secs(60),
                idle: Duration::from_secs(60),
            })
        );
    }

    #[test]
    fn test_debug_does_not_require_debug_listeners() {
        let rendered = format!("{:?}", DeviceOptions::default());
        assert!(rendered.contains("X-Webpa-Device-Name"));
        assert!(rendered.contains("message_listeners: 0"));
    }
}
