//! WebSocket connection handler
//!
//! One task per connection reads frames and hands each decoded message to the
//! session, strictly one at a time. Everything the session queued for that
//! message is then encoded in the framing of the frame that caused it and
//! forwarded to a writer task, so pushes never reorder across events.

use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::accept_async_with_config;

use super::protocol::{protocol_error, Codec, ServerMessage};
use super::server::{SessionInfo, SessionTable};
use crate::component::ComponentLibrary;
use crate::session::Session;
use crate::store::Store;

/// What every connection of a server shares.
pub(crate) struct ConnectionContext {
    pub(crate) library: Arc<ComponentLibrary>,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) max_message_size: usize,
    pub(crate) sessions: SessionTable,
}

/// Handle a single WebSocket connection
pub(crate) async fn handle_connection(stream: TcpStream, peer: SocketAddr, ctx: Arc<ConnectionContext>) {
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(ctx.max_message_size);
    ws_config.max_frame_size = Some(ctx.max_message_size);

    let ws_stream = match accept_async_with_config(stream, Some(ws_config)).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!("WebSocket handshake with {} failed: {}", peer, e);
            return;
        }
    };

    let (mut sink, mut frames) = ws_stream.split();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            if let Err(e) = sink.send(frame).await {
                tracing::debug!("write to {} failed: {}", peer, e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    let (mut session, mut outbound) = Session::channel(Arc::clone(&ctx.library), Arc::clone(&ctx.store));
    let session_id = session.id();
    ctx.sessions.insert(session_id, SessionInfo::new(peer));
    tracing::info!(session = session_id, %peer, "session opened");

    let mut codec = Codec::default();
    while let Some(frame) = frames.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(session = session_id, "read from {} failed: {}", peer, e);
                break;
            }
        };
        if frame.is_close() {
            break;
        }

        let Some((frame_codec, decoded)) = Codec::decode_frame(&frame) else {
            continue;
        };
        codec = frame_codec;

        let flow = match decoded {
            Ok(msg) => session.handle(msg).await,
            Err(err) => {
                session.report(None, &protocol_error(err));
                ControlFlow::Continue(())
            }
        };

        if !forward(&mut outbound, codec, &frame_tx) || flow.is_break() {
            break;
        }
    }

    session.close();
    forward(&mut outbound, codec, &frame_tx);
    drop(frame_tx);
    let _ = writer.await;

    ctx.sessions.remove(session_id);
    tracing::info!(session = session_id, %peer, "session ended");
}

/// Encode everything queued so far and hand it to the writer.
///
/// Returns `false` once the writer is gone.
fn forward(
    outbound: &mut mpsc::UnboundedReceiver<ServerMessage>,
    codec: Codec,
    frame_tx: &mpsc::UnboundedSender<Message>,
) -> bool {
    while let Ok(msg) = outbound.try_recv() {
        match codec.encode(&msg) {
            Ok(frame) => {
                if frame_tx.send(frame).is_err() {
                    return false;
                }
            }
            Err(e) => tracing::error!("failed to encode {:?}: {}", msg, e),
        }
    }
    true
}
