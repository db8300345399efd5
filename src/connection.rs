//! Connection Handler (spec §4.8).
//!
//! Grounded directly on the teacher's `call_server.rs::handle_connection`:
//! `accept_async`, split sender/receiver, a channel-forwarded outbound
//! writer task, and a `tokio::select!` read loop — generalized from the
//! call-mixing `CallMessage` protocol to the gateway's config/audio/
//! finalize protocol (spec §6.1).

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

use crate::config::{ConfigMessage, SessionConfig};
use crate::decoder::StreamingDecoder;
use crate::error::GatewayError;
use crate::event::Event;
use crate::session_id::SessionId;
use crate::session_manager::SessionManager;
use crate::vad::VoiceActivityModel;

/// Inbound text-message discriminant (spec §6.1). `config` carries its
/// full body and is re-parsed into `ConfigMessage`; `finalize` has none.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Config(ConfigMessage),
    Finalize,
}

pub async fn handle_connection<M, D>(
    stream: TcpStream,
    addr: SocketAddr,
    manager: Arc<SessionManager<M, D>>,
) where
    M: VoiceActivityModel + 'static,
    D: StreamingDecoder + 'static,
{
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!(%addr, error = %e, "websocket handshake failed");
            return;
        }
    };

    let session_id = match manager.create_session().await {
        Ok(id) => id,
        Err(e) => {
            warn!(%addr, error = %e, "rejecting connection");
            let _ = ws_stream; // handshake already completed; drop closes it
            return;
        }
    };

    info!(%addr, session = %session_id, "connection accepted");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(64);

    let sender_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    if send_event(&out_tx, &Event::SessionCreated { session_id }).await.is_err() {
        manager.retire_session(session_id).await;
        sender_task.abort();
        return;
    }

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if handle_text_message(&manager, session_id, &text, &out_tx).await.is_err() {
                    break;
                }
            }
            Ok(Message::Binary(data)) => {
                if handle_binary_message(&manager, session_id, &data, &out_tx).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {
                // Ignore ping/pong/frame control messages.
            }
        }
    }

    manager.retire_session(session_id).await;
    sender_task.abort();
    info!(%addr, session = %session_id, "connection closed");
}

async fn handle_text_message<M, D>(
    manager: &Arc<SessionManager<M, D>>,
    session_id: SessionId,
    text: &str,
    out_tx: &mpsc::Sender<Message>,
) -> Result<(), ()>
where
    M: VoiceActivityModel + 'static,
    D: StreamingDecoder + 'static,
{
    let parsed: Result<ClientMessage, _> = serde_json::from_str(text);
    match parsed {
        Ok(ClientMessage::Config(msg)) => match SessionConfig::try_from(msg) {
            Ok(cfg) => {
                let result = manager
                    .with_session(session_id, |session| session.apply_config(cfg))
                    .await;
                handle_gateway_result(result, out_tx).await
            }
            Err(e) => send_event(out_tx, &Event::error(e.to_string())).await,
        },
        Ok(ClientMessage::Finalize) => {
            let result = manager
                .with_session(session_id, |session| session.finalize())
                .await;
            match result {
                Ok(Ok(Some(event))) => send_event(out_tx, &event).await,
                Ok(Ok(None)) => Ok(()),
                Ok(Err(e)) => dispatch_error(manager, session_id, e, out_tx).await,
                Err(e) => dispatch_error(manager, session_id, e, out_tx).await,
            }
        }
        Err(_) => send_event(out_tx, &Event::error("unknown message type")).await,
    }
}

async fn handle_binary_message<M, D>(
    manager: &Arc<SessionManager<M, D>>,
    session_id: SessionId,
    data: &[u8],
    out_tx: &mpsc::Sender<Message>,
) -> Result<(), ()>
where
    M: VoiceActivityModel + 'static,
    D: StreamingDecoder + 'static,
{
    let samples = bytes_to_f32(data);
    let result = manager
        .with_session(session_id, |session| async move { session.ingest(&samples).await })
        .await;

    match result {
        Ok(Ok(events)) => {
            for event in events {
                send_event(out_tx, &event).await?;
            }
            Ok(())
        }
        Ok(Err(e)) => dispatch_error(manager, session_id, e, out_tx).await,
        Err(e) => dispatch_error(manager, session_id, e, out_tx).await,
    }
}

/// Applies the §7 disposition: emit the error, and if it's fatal also
/// retire the session.
async fn dispatch_error<M, D>(
    manager: &Arc<SessionManager<M, D>>,
    session_id: SessionId,
    err: GatewayError,
    out_tx: &mpsc::Sender<Message>,
) -> Result<(), ()>
where
    M: VoiceActivityModel + 'static,
    D: StreamingDecoder + 'static,
{
    if matches!(err, GatewayError::SessionClosed) {
        // Use-after-close is ignored silently per §7.
        return Ok(());
    }
    let fatal = err.is_fatal();
    send_event(out_tx, &Event::error(err.to_string())).await?;
    if fatal {
        manager.retire_session(session_id).await;
    }
    Ok(())
}

async fn handle_gateway_result(
    result: Result<Result<(), GatewayError>, GatewayError>,
    out_tx: &mpsc::Sender<Message>,
) -> Result<(), ()> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => send_event(out_tx, &Event::error(e.to_string())).await,
        Err(e) => send_event(out_tx, &Event::error(e.to_string())).await,
    }
}

async fn send_event(out_tx: &mpsc::Sender<Message>, event: &Event) -> Result<(), ()> {
    let json = serde_json::to_string(event).map_err(|_| ())?;
    out_tx.send(Message::Text(json.into())).await.map_err(|_| ())
}

/// Raw little-endian float32 PCM, mono, 16kHz, no framing header (§6.1).
fn bytes_to_f32(data: &[u8]) -> Vec<f32> {
    data.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
