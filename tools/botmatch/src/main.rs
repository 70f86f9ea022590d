use garrison_engine::MatchConfig;
use garrison_server::{MemoryRecorder, Orchestrator, RoomPhase, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    println!("=== Garrison Bot Match Demo ===\n");

    let config = ServerConfig {
        tick_interval: Duration::from_millis(20), // Fast for a watchable demo
        broadcast_interval: Duration::from_millis(100),
        countdown_seconds: 3,
        countdown_interval: Duration::from_millis(300),
        close_grace: Duration::from_secs(60),
        game: MatchConfig::open_field(14, 14),
        ..ServerConfig::default()
    };

    let recorder = Arc::new(MemoryRecorder::new());
    let server = Orchestrator::with_recorder(config, recorder.clone());

    println!("Creating room...");
    let room = server
        .create_room_seeded(42)
        .await
        .expect("Failed to create room");
    println!("Room {} created!", room);

    let rook = server.add_bot(room, "Rook").await.expect("Failed to seat bot");
    let pawn = server.add_bot(room, "Pawn").await.expect("Failed to seat bot");
    println!("Seated Rook as player {} and Pawn as player {}", rook, pawn);
    println!("Bots are ready on arrival, so the countdown starts by itself.\n");

    let mut last_countdown = None;
    loop {
        sleep(Duration::from_millis(250)).await;

        let Ok(phase) = server.room_phase(room).await else {
            println!("Room is gone");
            break;
        };
        let Ok(view) = server.view(room, None).await else {
            println!("Room is gone");
            break;
        };

        match phase {
            RoomPhase::CountingDown => {
                if view.countdown != last_countdown {
                    last_countdown = view.countdown;
                    if let Some(left) = view.countdown {
                        println!("Starting in {}...", left);
                    }
                }
            }
            RoomPhase::Active | RoomPhase::Over => {
                let standings: Vec<String> = view
                    .leaderboard
                    .iter()
                    .map(|row| {
                        let name = view
                            .players
                            .iter()
                            .find(|p| p.id == row.player)
                            .map(|p| p.name.as_str())
                            .unwrap_or("?");
                        format!("{}: {} soldiers / {} tiles", name, row.soldiers, row.tiles)
                    })
                    .collect();
                println!("[tick {:>4}] {}", view.tick, standings.join("  |  "));

                if view.over {
                    println!("\n=== Match Over ===");
                    match view.winner {
                        Some(id) => {
                            let name = view
                                .players
                                .iter()
                                .find(|p| p.id == id)
                                .map(|p| p.name.as_str())
                                .unwrap_or("?");
                            println!("Winner: {} (player {})", name, id);
                        }
                        None => println!("No winner"),
                    }
                    println!("Reason: {:?}", view.over_reason);
                    println!("Ticks played: {}", view.tick);
                    break;
                }
                if view.tick > 1500 {
                    println!("\nCalling it: still undecided after {} ticks.", view.tick);
                    break;
                }
            }
            _ => {}
        }
    }

    // Shutdown settles a still-running match, so the ledger comes after.
    server.shutdown().await;

    println!("\n=== Ledger ===");
    let matches = recorder.matches();
    if matches.is_empty() {
        println!("No finished match was recorded.");
    }
    for rec in &matches {
        println!(
            "Match {}: room {}, winner account {:?}, {} ticks over {:?}",
            rec.record, rec.room, rec.winner, rec.total_ticks, rec.duration
        );
    }
    println!("(Bots play as guests, so no account stats moved.)");

    println!("\nServer shutdown complete.");
}
