//! garrisond - WebSocket room server for the territory war game.
//!
//! Exposes `GET /rooms` for a JSON room listing and `GET /ws` for the game
//! protocol: inbound JSON commands, outbound tagged server messages. One
//! room membership per connection; a closed socket leaves the room.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use garrison_engine::{Coord, MoveOrder, PlayerId};
use garrison_server::{AccountId, ConnectionTx, Orchestrator, RoomId, ServerConfig, ServerMessage};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "garrisond")]
#[command(about = "Territory war room server")]
struct Args {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Simulation tick interval in milliseconds
    #[arg(long, default_value = "600")]
    tick_ms: u64,

    /// Snapshot broadcast interval in milliseconds
    #[arg(long, default_value = "1000")]
    broadcast_ms: u64,

    /// Seconds a finished room lingers before closing itself
    #[arg(long, default_value = "30")]
    close_grace_secs: u64,
}

/// Commands clients send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientCommand {
    CreateRoom {
        name: String,
        account: Option<AccountId>,
    },
    JoinRoom {
        room_id: RoomId,
        name: String,
        account: Option<AccountId>,
    },
    ListRooms,
    Ready,
    Spectate {
        enabled: bool,
    },
    Move {
        from: Coord,
        to: Coord,
    },
    GetState,
    PlayAgain,
    Leave,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = ServerConfig {
        tick_interval: Duration::from_millis(args.tick_ms),
        broadcast_interval: Duration::from_millis(args.broadcast_ms),
        close_grace: Duration::from_secs(args.close_grace_secs),
        ..ServerConfig::default()
    };
    let orchestrator = Arc::new(Orchestrator::new(config));

    let app = Router::new()
        .route("/rooms", get(list_rooms))
        .route("/ws", get(ws_upgrade))
        .with_state(orchestrator.clone());

    let listener = TcpListener::bind(&args.bind).await?;
    tracing::info!("listening on {}", args.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    orchestrator.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down");
}

async fn list_rooms(State(orchestrator): State<Arc<Orchestrator>>) -> impl IntoResponse {
    Json(orchestrator.list_rooms().await)
}

async fn ws_upgrade(
    State(orchestrator): State<Arc<Orchestrator>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, orchestrator))
}

/// Per-connection state: at most one room membership at a time.
struct Session {
    room: Option<(RoomId, PlayerId)>,
}

async fn handle_socket(socket: WebSocket, orchestrator: Arc<Orchestrator>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Writer task: everything the room pushes goes out through here.
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&msg) else {
                continue;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session { room: None };

    while let Some(Ok(msg)) = stream.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        match serde_json::from_str::<ClientCommand>(&text) {
            Ok(command) => handle_command(&orchestrator, &tx, &mut session, command).await,
            Err(err) => send_error(&tx, &format!("bad command: {err}")),
        }
    }

    // Socket gone, membership goes with it.
    if let Some((room, player)) = session.room.take() {
        let _ = orchestrator.leave_room(room, player).await;
    }
    writer.abort();
}

async fn handle_command(
    orchestrator: &Arc<Orchestrator>,
    tx: &ConnectionTx,
    session: &mut Session,
    command: ClientCommand,
) {
    match command {
        ClientCommand::CreateRoom { name, account } => {
            if session.room.is_some() {
                send_error(tx, "already in a room");
                return;
            }
            let room_id = match orchestrator.create_room().await {
                Ok(id) => id,
                Err(err) => {
                    send_error(tx, &err.to_string());
                    return;
                }
            };
            let _ = tx.send(ServerMessage::RoomCreated { room_id });
            join(orchestrator, tx, session, room_id, &name, account).await;
        }
        ClientCommand::JoinRoom {
            room_id,
            name,
            account,
        } => {
            if session.room.is_some() {
                send_error(tx, "already in a room");
                return;
            }
            join(orchestrator, tx, session, room_id, &name, account).await;
        }
        ClientCommand::ListRooms => {
            let rooms = orchestrator.list_rooms().await;
            let _ = tx.send(ServerMessage::RoomList { rooms });
        }
        ClientCommand::Ready => {
            let Some((room, player)) = session.room else {
                send_error(tx, "not in a room");
                return;
            };
            if let Err(err) = orchestrator.set_ready(room, player).await {
                send_error(tx, &err.to_string());
            }
        }
        ClientCommand::Spectate { enabled } => {
            let Some((room, player)) = session.room else {
                send_error(tx, "not in a room");
                return;
            };
            if let Err(err) = orchestrator.set_spectator(room, player, enabled).await {
                send_error(tx, &err.to_string());
            }
        }
        ClientCommand::Move { from, to } => {
            let Some((room, player)) = session.room else {
                send_error(tx, "not in a room");
                return;
            };
            match orchestrator
                .enqueue_move(room, player, MoveOrder { from, to })
                .await
            {
                Ok(accepted) => {
                    let _ = tx.send(ServerMessage::MoveResult { accepted, from, to });
                }
                Err(err) => send_error(tx, &err.to_string()),
            }
        }
        ClientCommand::GetState => {
            let Some((room, player)) = session.room else {
                send_error(tx, "not in a room");
                return;
            };
            let phase = orchestrator.room_phase(room).await;
            let view = orchestrator.view(room, Some(player)).await;
            match (phase, view) {
                (Ok(phase), Ok(view)) => {
                    let _ = tx.send(ServerMessage::Snapshot {
                        room_id: room,
                        phase,
                        view,
                    });
                }
                (Err(err), _) | (_, Err(err)) => send_error(tx, &err.to_string()),
            }
        }
        ClientCommand::PlayAgain => {
            let Some((room, _)) = session.room else {
                send_error(tx, "not in a room");
                return;
            };
            if let Err(err) = orchestrator.play_again(room).await {
                send_error(tx, &err.to_string());
            }
        }
        ClientCommand::Leave => {
            if let Some((room, player)) = session.room.take() {
                let _ = orchestrator.leave_room(room, player).await;
            }
        }
    }
}

async fn join(
    orchestrator: &Arc<Orchestrator>,
    tx: &ConnectionTx,
    session: &mut Session,
    room_id: RoomId,
    name: &str,
    account: Option<AccountId>,
) {
    match orchestrator.join_room(room_id, name, account).await {
        Ok(joined) => {
            let _ = orchestrator
                .attach_connection(room_id, joined.player_id, tx.clone())
                .await;
            session.room = Some((room_id, joined.player_id));
            let _ = tx.send(ServerMessage::RoomJoined {
                room_id,
                player_id: joined.player_id,
                color: joined.color,
            });
        }
        Err(err) => send_error(tx, &err.to_string()),
    }
}

fn send_error(tx: &ConnectionTx, message: &str) {
    let _ = tx.send(ServerMessage::Error {
        message: message.to_string(),
    });
}
