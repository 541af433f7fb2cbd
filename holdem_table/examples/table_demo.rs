//! Table Demo
//!
//! Runs a short three-player table in-process. Every player calls or checks
//! whenever it is their turn, and each hand's events are printed as they
//! arrive.
//!
//! ```sh
//! RUST_LOG=info cargo run --example table_demo
//! ```

use holdem_table::{
    GameEvent,
    entities::{Action, ActionChoice, PlayerId},
    table::{TableActor, TableConfig, TableTimings},
};
use tokio::time::Duration;

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = TableConfig {
        name: "Demo".to_string(),
        timings: TableTimings {
            reveal_lead_in: Duration::from_millis(50),
            reveal_interval: Duration::from_millis(50),
            reveal_settle: Duration::from_millis(50),
            runout_pause: Duration::from_millis(50),
            showdown_settle: Duration::from_millis(100),
            showdown_display: Duration::from_millis(200),
            uncontested_display: Duration::from_millis(100),
            auto_start_delay: Duration::from_millis(100),
            ..TableTimings::default()
        },
        ..TableConfig::default()
    };
    let (actor, table) = TableActor::new(config);
    let task = tokio::spawn(actor.run());

    let players: Vec<PlayerId> = ["ann", "ben", "cat"].into_iter().map(PlayerId::from).collect();
    let mut updates = table.subscribe(players[0].clone(), 256).await.expect("table is open");
    for id in &players {
        let response = table.join(id.clone(), id.as_str().into()).await;
        println!("{id} joined: {response:?}");
    }

    let mut hands = 0;
    while let Some(update) = updates.recv().await {
        for event in &update.events {
            println!("{event}");
            if matches!(event, GameEvent::Won(..)) {
                hands += 1;
            }
        }
        if hands >= 3 {
            break;
        }

        // Whoever is up calls or checks.
        for id in &players {
            let Ok(choices) = table.actions(id.clone()).await else {
                continue;
            };
            let action = if choices.iter().any(|c| matches!(c, ActionChoice::Check)) {
                Some(Action::Check)
            } else if choices.iter().any(|c| matches!(c, ActionChoice::Call { .. })) {
                Some(Action::Call)
            } else if choices.iter().any(|c| matches!(c, ActionChoice::AllIn { .. })) {
                Some(Action::AllIn)
            } else {
                None
            };
            if let Some(action) = action {
                let _ = table.act(id.clone(), action).await;
            }
        }
    }

    let _ = table.close().await;
    let _ = task.await;
}
