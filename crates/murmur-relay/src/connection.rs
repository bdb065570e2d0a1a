use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use murmur_types::api::Claims;
use murmur_types::events::{RelayCommand, RelayEvent};

use crate::directory::RoomDirectory;
use crate::hub::{ConnId, RelayHub};

/// Server sends a Ping every 15 seconds. Two missed Pongs drop the connection.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const MAX_MISSED_PONGS: u8 = 2;

/// The first frame must be `identify`, and it must arrive within this window.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Session clocks. Production uses the defaults; tests shorten them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayTiming {
    pub identify_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub max_missed_pongs: u8,
}

impl Default for RelayTiming {
    fn default() -> Self {
        Self {
            identify_timeout: IDENTIFY_TIMEOUT,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            max_missed_pongs: MAX_MISSED_PONGS,
        }
    }
}

/// Everything a relay session needs, shared by all connections.
#[derive(Clone)]
pub struct RelayContext {
    pub hub: RelayHub,
    pub directory: Arc<dyn RoomDirectory>,
    pub jwt_secret: Arc<str>,
    pub timing: RelayTiming,
}

/// An identified connection.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub conn_id: ConnId,
    pub user_id: Uuid,
    pub username: String,
}

/// Drive one WebSocket from the identify handshake until it closes.
pub async fn handle_connection(socket: WebSocket, ctx: RelayContext) {
    let (mut sender, mut receiver) = socket.split();

    let Some((user_id, username)) = wait_for_identify(&mut receiver, &ctx).await else {
        warn!("Relay client failed to identify, closing");
        let _ = sender.send(Message::Close(None)).await;
        return;
    };

    info!("{} ({}) connected to relay", username, user_id);

    let ready = RelayEvent::Ready {
        user_id,
        username: username.clone(),
    };
    if let Err(e) = send_event(&mut sender, &ready).await {
        debug!("{} ({}) went away before ready: {}", username, user_id, e);
        return;
    }

    let (conn_id, outbound) = ctx.hub.register(user_id, username.clone()).await;
    let session = Session {
        conn_id,
        user_id,
        username,
    };

    run_session(sender, receiver, outbound, &ctx, &session).await;

    if let Some(departure) = ctx.hub.unregister(conn_id).await {
        if departure.went_offline {
            if let Err(e) = with_directory(&ctx, move |dir| dir.touch_last_active(user_id)).await {
                warn!("Could not record last_active for {}: {:#}", user_id, e);
            }
        }
    }
    info!("{} ({}) disconnected from relay", session.username, user_id);
}

/// Pump the outbound queue and heartbeat on one task, read commands on another.
/// Returns when either side finishes.
async fn run_session(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut outbound: tokio::sync::mpsc::Receiver<RelayEvent>,
    ctx: &RelayContext,
    session: &Session,
) {
    let timing = ctx.timing;
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(timing.heartbeat_interval);
        heartbeat.tick().await;
        let mut missed_pongs: u8 = 0;

        loop {
            tokio::select! {
                event = outbound.recv() => {
                    let Some(event) = event else { break };
                    if let Err(e) = send_event(&mut sender, &event).await {
                        debug!("Relay send failed: {}", e);
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_pongs = 0;
                    } else {
                        missed_pongs += 1;
                        if missed_pongs >= timing.max_missed_pongs {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_pongs);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    let recv_ctx = ctx.clone();
    let recv_session = session.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<RelayCommand>(&text) {
                    Ok(cmd) => handle_command(&recv_ctx, &recv_session, cmd).await,
                    Err(e) => {
                        debug!(
                            "{} ({}) bad command: {} -- raw: {}",
                            recv_session.username,
                            recv_session.user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => pong_flag_recv.store(true, Ordering::Release),
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

async fn wait_for_identify(receiver: &mut SplitStream<WebSocket>, ctx: &RelayContext) -> Option<(Uuid, String)> {
    let identify = async {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let Ok(RelayCommand::Identify { token }) = serde_json::from_str::<RelayCommand>(&text) else {
                        debug!("First relay frame was not identify");
                        return None;
                    };
                    let claims = verify_token(&ctx.jwt_secret, &token)?;
                    let user_id = claims.sub;
                    return match with_directory(ctx, move |dir| dir.username(user_id)).await {
                        Ok(Some(username)) => Some((user_id, username)),
                        Ok(None) => {
                            debug!("Identify for deleted user {}", user_id);
                            None
                        }
                        Err(e) => {
                            warn!("Identify lookup failed for {}: {:#}", user_id, e);
                            None
                        }
                    };
                }
                Message::Close(_) => return None,
                _ => {}
            }
        }
        None
    };

    match tokio::time::timeout(ctx.timing.identify_timeout, identify).await {
        Ok(identified) => identified,
        Err(_) => {
            debug!("No identify within {:?}", ctx.timing.identify_timeout);
            None
        }
    }
}

/// Signature and expiry check, same as the REST gate.
pub(crate) fn verify_token(secret: &str, token: &str) -> Option<Claims> {
    match decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default()) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            debug!("Relay token rejected: {}", e);
            None
        }
    }
}

pub(crate) async fn handle_command(ctx: &RelayContext, session: &Session, cmd: RelayCommand) {
    let hub = &ctx.hub;
    match cmd {
        RelayCommand::Identify { .. } => {
            debug!("{} sent identify twice, ignoring", session.username);
        }

        RelayCommand::JoinChat { chat_id } => {
            let user_id = session.user_id;
            let event = match with_directory(ctx, move |dir| dir.is_participant(chat_id, user_id)).await {
                Ok(true) => {
                    hub.join(session.conn_id, chat_id).await;
                    info!("{} ({}) joined {}", session.username, user_id, chat_id);
                    RelayEvent::Joined { chat_id }
                }
                Ok(false) => {
                    info!("{} ({}) refused join to {}", session.username, user_id, chat_id);
                    RelayEvent::JoinRejected {
                        chat_id,
                        reason: "Not a participant of this conversation".into(),
                    }
                }
                Err(e) => {
                    warn!("Membership check for {} in {} failed: {:#}", user_id, chat_id, e);
                    RelayEvent::JoinRejected {
                        chat_id,
                        reason: "Could not verify membership".into(),
                    }
                }
            };
            hub.send_to(session.conn_id, event).await;
        }

        RelayCommand::LeaveChat { chat_id } => {
            hub.leave(session.conn_id, chat_id).await;
            debug!("{} left {}", session.username, chat_id);
        }

        RelayCommand::Typing { chat_id, is_typing } => {
            hub.relay_typing(session.conn_id, chat_id, is_typing).await;
        }

        RelayCommand::NewMessage { chat_id, message } => {
            match hub.relay_message(session.conn_id, chat_id, message).await {
                Some(seq) => trace!("{} relayed #{} into {}", session.username, seq, chat_id),
                None => debug!("{} relayed into {} without joining, dropped", session.username, chat_id),
            }
        }

        RelayCommand::MessageAck { message_id, status } => {
            let user_id = session.user_id;
            match with_directory(ctx, move |dir| dir.acknowledge(message_id, user_id, status)).await {
                Ok(Some((chat_id, status))) => {
                    hub.broadcast_room(
                        chat_id,
                        RelayEvent::StatusUpdate {
                            chat_id,
                            message_id,
                            status,
                            user_id,
                        },
                    )
                    .await;
                }
                Ok(None) => trace!("ack from {} for {} changed nothing", session.username, message_id),
                Err(e) => warn!("ack from {} for {} failed: {:#}", session.username, message_id, e),
            }
        }
    }
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &RelayEvent) -> anyhow::Result<()> {
    let text = serde_json::to_string(event)?;
    sender.send(Message::Text(text.into())).await?;
    Ok(())
}

/// Run a blocking directory call on the blocking pool.
async fn with_directory<F, T>(ctx: &RelayContext, f: F) -> anyhow::Result<T>
where
    F: FnOnce(&dyn RoomDirectory) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let directory = ctx.directory.clone();
    tokio::task::spawn_blocking(move || f(directory.as_ref())).await?
}
