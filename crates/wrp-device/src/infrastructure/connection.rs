//! Per-session tasks.
//!
//! Every open session runs three tasks plus a supervisor:
//!
//! - **reader**: inbound frames → codec → message/pong listeners
//! - **writer**: outbound queue → codec → binary frames
//! - **keepalive**: idle check and ping every `ping_period`
//! - **supervisor**: waits for all three, then closes the transport,
//!   unregisters the session, marks it `Closed`, and fires disconnect
//!
//! Each task watches the session's close signal and holds a [`CloseOnExit`]
//! guard, so the first task to stop, by returning or by panicking, brings the
//! others down with it.
//! The sink is shared by the writer and keepalive tasks through an async
//! mutex; only the reader touches the stream half.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn, Instrument};
use wrp_core::{describe, Message};

use crate::application::Session;
use crate::domain::Device;
use crate::infrastructure::manager::Shared;

type SharedSink<S> = Arc<Mutex<SplitSink<WebSocketStream<S>, WsMessage>>>;

/// Requests close when dropped, including during a panic unwind.
struct CloseOnExit(Arc<Session>);

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        self.0.request_close();
    }
}

/// Starts the tasks for an open, registered session.  The returned handle
/// completes after the disconnect listeners have run.
pub(crate) fn spawn<S>(
    session: Arc<Session>,
    queue: mpsc::Receiver<Message>,
    stream: WebSocketStream<S>,
    shared: Arc<Shared>,
) -> JoinHandle<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let span = tracing::info_span!(
        parent: &shared.options.span,
        "session",
        id = %session.id(),
        key = %session.key()
    );

    let (sink, source) = stream.split();
    let sink: SharedSink<S> = Arc::new(Mutex::new(sink));

    let reader = tokio::spawn(
        read_loop(Arc::clone(&session), source, Arc::clone(&shared)).instrument(span.clone()),
    );
    let writer = tokio::spawn(
        write_loop(Arc::clone(&session), queue, Arc::clone(&sink), Arc::clone(&shared))
            .instrument(span.clone()),
    );
    let keepalive = tokio::spawn(
        keepalive_loop(Arc::clone(&session), Arc::clone(&sink), Arc::clone(&shared))
            .instrument(span.clone()),
    );

    tokio::spawn(
        async move {
            let (r, w, k) = tokio::join!(reader, writer, keepalive);
            for (task, result) in [("reader", r), ("writer", w), ("keepalive", k)] {
                if let Err(e) = result {
                    warn!(task, "session task ended abnormally: {e}");
                }
            }

            let write_timeout = shared.options.write_timeout;
            let close = async {
                let mut sink = sink.lock().await;
                sink.close().await
            };
            match timeout(write_timeout, close).await {
                Ok(Ok(())) => debug!("transport closed"),
                Ok(Err(e)) => debug!("transport close failed: {e}"),
                Err(_) => debug!("transport close timed out after {write_timeout:?}"),
            }

            shared.registry.remove(&session);
            if session.mark_closed() {
                info!("device disconnected");
                shared.listeners.on_disconnect(session.as_ref());
            }
        }
        .instrument(span),
    )
}

async fn read_loop<S>(
    session: Arc<Session>,
    mut source: SplitStream<WebSocketStream<S>>,
    shared: Arc<Shared>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let _close = CloseOnExit(Arc::clone(&session));
    let mut closing = session.closing_signal();

    loop {
        let frame = tokio::select! {
            _ = closing.wait_for(|closing| *closing) => break,
            frame = source.next() => frame,
        };

        let frame = match frame {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                debug!("read failed: {e}");
                break;
            }
            None => {
                debug!("device stream ended");
                break;
            }
        };

        session.touch();

        match frame {
            WsMessage::Binary(data) => match shared.codec.decode(&data) {
                Ok(message) => {
                    debug!(message = %describe(Some(&message)), "message received");
                    shared.listeners.on_message(session.as_ref(), &message);
                }
                Err(e) => {
                    // One bad frame does not end the session.
                    warn!("skipping undecodable frame ({} bytes): {e}", data.len());
                }
            },
            WsMessage::Pong(data) => {
                debug!("pong received ({} bytes)", data.len());
                shared.listeners.on_pong(session.as_ref(), &data);
            }
            WsMessage::Text(_) => {
                warn!("unexpected text frame (ignored)");
            }
            WsMessage::Close(frame) => {
                debug!(?frame, "close frame received");
                break;
            }
            WsMessage::Ping(_) | WsMessage::Frame(_) => {}
        }
    }
}

async fn write_loop<S>(
    session: Arc<Session>,
    mut queue: mpsc::Receiver<Message>,
    sink: SharedSink<S>,
    shared: Arc<Shared>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let _close = CloseOnExit(Arc::clone(&session));
    let mut closing = session.closing_signal();
    let write_timeout = shared.options.write_timeout;

    loop {
        let message = tokio::select! {
            biased;
            _ = closing.wait_for(|closing| *closing) => break,
            message = queue.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let bytes = match shared.codec.encode(&message) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(message = %message, "dropping unencodable message: {e}");
                continue;
            }
        };

        if let Err(e) = write_frame(&sink, WsMessage::Binary(bytes), write_timeout).await {
            debug!("write failed: {e:#}");
            break;
        }
    }

    queue.close();
    let mut discarded = 0usize;
    while queue.try_recv().is_ok() {
        discarded += 1;
    }
    if discarded > 0 {
        debug!(discarded, "discarded queued messages on close");
    }
}

async fn keepalive_loop<S>(session: Arc<Session>, sink: SharedSink<S>, shared: Arc<Shared>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let _close = CloseOnExit(Arc::clone(&session));
    let mut closing = session.closing_signal();
    let options = &shared.options;

    let mut ticker = interval(options.ping_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick resolves immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = closing.wait_for(|closing| *closing) => break,
            _ = ticker.tick() => {}
        }

        let idle = session.idle_for();
        if idle > options.idle_period {
            info!(?idle, "device idle past the liveness window; closing");
            break;
        }

        let ping = WsMessage::Ping(session.key().as_bytes().to_vec());
        if let Err(e) = write_frame(&sink, ping, options.write_timeout).await {
            debug!("keepalive ping failed: {e:#}");
            break;
        }
    }
}

/// Sends one frame, bounded by `limit`.
async fn write_frame<S>(sink: &SharedSink<S>, frame: WsMessage, limit: Duration) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    timeout(limit, async {
        let mut sink = sink.lock().await;
        sink.send(frame).await
    })
    .await
    .map_err(|_| anyhow!("write timed out after {limit:?}"))?
    .context("websocket send failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Convey, Key, SessionState, ID};

    fn open_session() -> Arc<Session> {
        let (session, _rx) = Session::new(ID::from("mac:1"), Key::from("k"), Convey::none(), 1);
        assert!(session.mark_open());
        session
    }

    #[tokio::test]
    async fn test_panicking_task_still_requests_close() {
        let session = open_session();
        let mut closing = session.closing_signal();

        let task = tokio::spawn({
            let session = Arc::clone(&session);
            async move {
                let _close = CloseOnExit(session);
                panic!("task failure");
            }
        });

        assert!(task.await.unwrap_err().is_panic());
        assert_eq!(session.state(), SessionState::Closing);
        assert!(*closing.borrow_and_update());
    }

    #[tokio::test]
    async fn test_returning_task_requests_close() {
        let session = open_session();

        tokio::spawn({
            let session = Arc::clone(&session);
            async move {
                let _close = CloseOnExit(session);
            }
        })
        .await
        .unwrap();

        assert_eq!(session.state(), SessionState::Closing);
    }
}
