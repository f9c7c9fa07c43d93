//! The device manager: the entry point that turns raw connections into
//! registered sessions and lets application code reach them by ID.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use wrp_core::{Codec, Message};

use crate::application::{Listeners, Registry, Session};
use crate::domain::{Device, DeviceError, DeviceOptions, OptionsError, ID};
use crate::infrastructure::connection;
use crate::infrastructure::handshake::{self, HandshakeError};

/// State shared by the manager and every session task.
pub(crate) struct Shared {
    pub(crate) options: DeviceOptions,
    pub(crate) codec: Codec,
    pub(crate) listeners: Listeners,
    pub(crate) registry: Registry,
}

/// Owns the registry and the combined listeners.  Cheap to clone.
#[derive(Clone)]
pub struct Manager {
    shared: Arc<Shared>,
}

impl Manager {
    /// # Errors
    ///
    /// [`OptionsError`] if `options` fail [`DeviceOptions::validate`].
    pub fn new(options: DeviceOptions, codec: Codec) -> Result<Self, OptionsError> {
        options.validate()?;
        let listeners = Listeners::from_options(&options);
        let registry = Registry::with_capacity(options.initial_capacity);
        Ok(Self {
            shared: Arc::new(Shared {
                options,
                codec,
                listeners,
                registry,
            }),
        })
    }

    pub fn options(&self) -> &DeviceOptions {
        &self.shared.options
    }

    pub fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    /// Upgrades `stream`, registers the new session, fires the connect
    /// listeners and starts the session tasks.
    ///
    /// # Errors
    ///
    /// Any [`HandshakeError`].  On error nothing is registered and no
    /// listener has run.
    pub async fn connect<S>(&self, stream: S) -> Result<Arc<Session>, HandshakeError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let options = &self.shared.options;
        let handshake = handshake::accept(stream, options, self.shared.codec.config()).await?;
        let mut transport = handshake.stream;

        let (session, queue) = Session::new(
            handshake.id,
            handshake.key,
            handshake.convey,
            options.message_queue_size,
        );
        session.mark_open();

        if let Err(e) = self.shared.registry.add(Arc::clone(&session)) {
            warn!(id = %session.id(), key = %session.key(), "refusing session: {e}");
            if timeout(options.write_timeout, transport.close(None)).await.is_err() {
                debug!("close after refused registration timed out");
            }
            session.mark_closed();
            return Err(e.into());
        }

        info!(id = %session.id(), key = %session.key(), "device connected");
        self.shared.listeners.on_connect(session.as_ref());

        connection::spawn(Arc::clone(&session), queue, transport, Arc::clone(&self.shared));
        Ok(session)
    }

    /// Requests close on every session with `id`.  Returns how many.
    pub fn disconnect(&self, id: &ID) -> usize {
        let sessions = self.shared.registry.get_by_id(id);
        for session in &sessions {
            session.request_close();
        }
        sessions.len()
    }

    /// Requests close on every session whose ID matches `predicate`.
    pub fn disconnect_if<P>(&self, predicate: P) -> usize
    where
        P: Fn(&ID) -> bool,
    {
        let mut count = 0;
        self.shared.registry.visit(|session| {
            if predicate(session.id()) {
                session.request_close();
                count += 1;
            }
        });
        count
    }

    /// Calls `visitor` for every session whose ID matches `predicate`.
    pub fn visit_if<P, V>(&self, predicate: P, mut visitor: V) -> usize
    where
        P: Fn(&ID) -> bool,
        V: FnMut(&dyn Device),
    {
        let mut count = 0;
        self.shared.registry.visit(|session| {
            if predicate(session.id()) {
                visitor(session.as_ref());
                count += 1;
            }
        });
        count
    }

    /// Queues `message` on every session with `id`.
    ///
    /// Returns how many sessions accepted it.
    ///
    /// # Errors
    ///
    /// [`DeviceError::NotFound`] if no session has the ID, otherwise the
    /// first enqueue error when no session accepted the message.
    pub fn send(&self, id: &ID, message: Message) -> Result<usize, DeviceError> {
        let sessions = self.shared.registry.get_by_id(id);
        if sessions.is_empty() {
            return Err(DeviceError::NotFound(id.clone()));
        }

        let mut delivered = 0;
        let mut first_error = None;
        for session in &sessions {
            match session.send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(key = %session.key(), "send failed: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        match (delivered, first_error) {
            (0, Some(e)) => Err(e),
            _ => Ok(delivered),
        }
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("options", &self.shared.options)
            .field("registry", &self.shared.registry)
            .finish()
    }
}
