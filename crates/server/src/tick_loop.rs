use crate::room::RoomHandle;
use std::time::Instant;
use tokio::time::{interval, MissedTickBehavior};

/// Run the tick loop for a room. Returns when the room asks to close or
/// shutdown is requested; the caller is responsible for retiring the room.
pub async fn run_room_loop(handle: RoomHandle) {
    let (tick_interval, broadcast_interval) = {
        let inner = handle.inner.lock().await;
        (inner.config.tick_interval, inner.config.broadcast_interval)
    };

    let mut ticker = interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_broadcast = Instant::now();

    loop {
        ticker.tick().await;

        if handle.should_shutdown() {
            break;
        }

        let broadcast_due = last_broadcast.elapsed() >= broadcast_interval;
        if broadcast_due {
            last_broadcast = Instant::now();
        }

        let outcome = handle.drive(broadcast_due).await;
        if outcome.close {
            break;
        }
    }
}
