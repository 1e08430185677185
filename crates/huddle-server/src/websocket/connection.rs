//! Per-socket read/write loops.
//!
//! The writer task drains the session's outbound queue onto the socket and
//! sends heartbeat pings. The reader loop feeds text frames to the
//! [`ConnectionHandler`]. Whichever side stops first fires the shared close
//! signal, which ends the other.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use huddle_core::errors::RelayError;
use metrics::{counter, histogram};
use tokio::sync::mpsc;
use tokio::time::{self, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::handler::ConnectionHandler;
use super::session::Outbound;
use crate::metrics::{WS_CONNECTIONS_TOTAL, WS_CONNECTION_DURATION_SECONDS, WS_DISCONNECTIONS_TOTAL};
use crate::relay::Relay;

/// Drive one upgraded socket until either side closes or `shutdown` fires.
pub async fn run_connection(socket: WebSocket, relay: Arc<Relay>, shutdown: CancellationToken) {
    let started = Instant::now();
    counter!(WS_CONNECTIONS_TOTAL).increment(1);

    let settings = relay.settings();
    let (outbound, rx) = Outbound::channel(settings.outbound_buffer);
    let send_timeout = Duration::from_millis(settings.send_timeout_ms);
    let heartbeat = (settings.heartbeat_interval_secs > 0)
        .then(|| Duration::from_secs(settings.heartbeat_interval_secs));

    let mut handler = ConnectionHandler::new(Arc::clone(&relay), outbound);
    let closed = handler.close_signal();
    info!(session_id = %handler.id(), "client connected");

    let (sink, mut stream) = socket.split();
    let writer = tokio::spawn(write_loop(sink, rx, closed.clone(), send_timeout, heartbeat));

    let reason = loop {
        tokio::select! {
            () = closed.cancelled() => break "closed by relay",
            () = shutdown.cancelled() => break "server shutting down",
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => handler.handle_frame(text.as_str()),
                Some(Ok(Message::Close(_))) | None => break "closed by client",
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(session_id = %handler.id(), error = %e, "socket read failed");
                    break "read error";
                }
            },
        }
    };

    closed.cancel();
    handler.disconnect();
    let _ = writer.await;

    let lifetime = started.elapsed().as_secs_f64();
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(lifetime);
    info!(session_id = %handler.id(), reason, lifetime_secs = lifetime, "client disconnected");
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Arc<str>>,
    closed: CancellationToken,
    send_timeout: Duration,
    heartbeat: Option<Duration>,
) {
    let mut ping = heartbeat.map(|period| {
        let mut interval = time::interval_at(time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    let result = loop {
        let next = tokio::select! {
            () = closed.cancelled() => break Ok(()),
            frame = rx.recv() => match frame {
                Some(frame) => Message::Text(frame.as_ref().into()),
                None => break Ok(()),
            },
            () = next_ping(&mut ping) => {
                trace!("sending ping");
                Message::Ping(Vec::new().into())
            }
        };
        if let Err(e) = write(&mut sink, next, send_timeout).await {
            break Err(e);
        }
    };

    match result {
        Ok(()) => {
            let _ = write(&mut sink, Message::Close(None), send_timeout).await;
        }
        Err(e) => debug!(error = %e, "socket write failed"),
    }
    let _ = sink.close().await;
    closed.cancel();
}

async fn write(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: Message,
    send_timeout: Duration,
) -> Result<(), RelayError> {
    match time::timeout(send_timeout, sink.send(msg)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(RelayError::ConnectionLost {
            reason: e.to_string(),
        }),
        Err(_) => Err(RelayError::ConnectionLost {
            reason: format!("write timed out after {send_timeout:?}"),
        }),
    }
}

/// Resolves on the next heartbeat tick, or never when pings are disabled.
async fn next_ping(ping: &mut Option<Interval>) {
    match ping {
        Some(interval) => {
            let _ = interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn next_ping_ticks_on_period() {
        let period = Duration::from_secs(30);
        let mut ping = Some(time::interval_at(time::Instant::now() + period, period));
        let start = time::Instant::now();
        next_ping(&mut ping).await;
        assert_eq!(start.elapsed(), period);
    }

    #[tokio::test(start_paused = true)]
    async fn next_ping_disabled_never_fires() {
        let mut ping = None;
        let fired = time::timeout(Duration::from_secs(3600), next_ping(&mut ping)).await;
        assert!(fired.is_err());
    }
}
