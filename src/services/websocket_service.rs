use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    dto::{
        common::VoteValue,
        ws::{JoinPayload, ParticipantInboundMessage, ParticipantOutboundMessage},
    },
    error::ServiceError,
    services::{presence, session_service},
    state::{ParticipantConnection, SessionRuntime, SharedState, session::DemographicProfile},
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Internal error type for participant socket operations.
///
/// This type represents errors that occur during WebSocket vote processing,
/// distinct from `ServiceError` which is used for HTTP responses.
#[derive(Debug, Error)]
enum SocketError {
    /// Writer channel closed - connection should be terminated immediately.
    #[error("connection closed")]
    ConnectionClosed,
    /// Error from persistence or state management operations.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
}

/// Handle the full lifecycle for an individual participant WebSocket
/// connection: identification, presence, votes and teardown.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket join timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let inbound = match ParticipantInboundMessage::from_json_str(&initial_message) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "failed to parse or validate participant message");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let ParticipantInboundMessage::Join(join) = inbound else {
        warn!("first message was not a join");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    let Some(session) = state.session(join.session_id) else {
        warn!(session_id = %join.session_id, "join targeted an unknown session");
        let _ = send_outbound(
            &outbound_tx,
            &ParticipantOutboundMessage::Error {
                message: format!("session `{}` not found", join.session_id),
            },
        );
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    let JoinPayload {
        participant_id,
        display_name,
        demographics,
        ..
    } = join;
    let demographics: DemographicProfile = demographics.into();

    presence::register(
        &state,
        &session,
        ParticipantConnection {
            participant_id: participant_id.clone(),
            display_name,
            demographics: demographics.clone(),
            joined_at: SystemTime::now(),
            tx: outbound_tx.clone(),
        },
    );
    info!(session_id = %session.id, participant_id = %participant_id, "participant joined");

    let snapshot = session_service::phase_snapshot(&state, &session, None).await;
    if send_outbound(&outbound_tx, &ParticipantOutboundMessage::Joined { snapshot }).is_err() {
        presence::unregister(&state, &session, &participant_id, &outbound_tx);
        finalize(writer_task, outbound_tx).await;
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ParticipantInboundMessage::from_json_str(&text) {
                Ok(ParticipantInboundMessage::Vote {
                    response,
                    elapsed_ms,
                }) => {
                    let res = handle_vote(
                        &state,
                        &session,
                        &participant_id,
                        demographics.clone(),
                        response,
                        elapsed_ms,
                        &outbound_tx,
                    )
                    .await;
                    if let Err(err) = res {
                        warn!(
                            session_id = %session.id,
                            participant_id = %participant_id,
                            error = %err,
                            "error while handling vote"
                        );
                        if matches!(err, SocketError::ConnectionClosed) {
                            break;
                        }
                    }
                }
                Ok(ParticipantInboundMessage::Leave) => {
                    info!(session_id = %session.id, participant_id = %participant_id, "participant left");
                    let _ = outbound_tx.send(Message::Close(None));
                    break;
                }
                Ok(ParticipantInboundMessage::Join(_)) => {
                    warn!(participant_id = %participant_id, "ignoring duplicate join message");
                }
                Ok(ParticipantInboundMessage::Unknown) => {
                    warn!(participant_id = %participant_id, "ignoring unknown message type");
                }
                Err(err) => {
                    warn!(participant_id = %participant_id, error = %err, "failed to parse participant message");
                    let _ = send_outbound(
                        &outbound_tx,
                        &ParticipantOutboundMessage::Error { message: err },
                    );
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(participant_id = %participant_id, "participant socket closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(participant_id = %participant_id, error = %err, "websocket error");
                break;
            }
        }
    }

    presence::unregister(&state, &session, &participant_id, &outbound_tx);
    info!(session_id = %session.id, participant_id = %participant_id, "participant disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Record one vote and acknowledge it, reporting recoverable rejections
/// (wrong phase, duplicate, stale generation) back over the socket.
async fn handle_vote(
    state: &SharedState,
    session: &Arc<SessionRuntime>,
    participant_id: &str,
    demographics: DemographicProfile,
    response: VoteValue,
    elapsed_ms: u32,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), SocketError> {
    let photo = session.current_photo().await;
    match session_service::submit_vote(
        state,
        session,
        participant_id,
        demographics,
        response,
        elapsed_ms,
    )
    .await
    {
        Ok(_) => send_outbound(outbound_tx, &ParticipantOutboundMessage::VoteAck { photo }),
        Err(
            err @ (ServiceError::InvalidState(_)
            | ServiceError::DuplicateVote(_)
            | ServiceError::StaleVote(_)),
        ) => send_outbound(
            outbound_tx,
            &ParticipantOutboundMessage::Error {
                message: err.to_string(),
            },
        ),
        Err(err) => Err(SocketError::Service(err)),
    }
}

/// Serialize a payload and push it onto the socket's writer channel.
///
/// Serialization failures are permanent (a bug in our own types); they are
/// logged and swallowed. A closed writer channel is transient and surfaces
/// as `SocketError::ConnectionClosed` so the caller can terminate.
fn send_outbound(
    tx: &mpsc::UnboundedSender<Message>,
    message: &ParticipantOutboundMessage,
) -> Result<(), SocketError> {
    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize outbound participant message");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| SocketError::ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
