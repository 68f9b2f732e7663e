//! `chatrelay history` -- print a channel's saved turns.

use chatrelay_types::chat::{ChannelId, Turn};
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};

use crate::state::AppState;

pub async fn show_history(
    app: &AppState,
    channel: &str,
    count: usize,
    json: bool,
) -> anyhow::Result<()> {
    app.load_snapshot().await;
    let channel = ChannelId::new(channel);
    let turns = app.state.recent_turns(&channel, count).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&turns)?);
        return Ok(());
    }

    if turns.is_empty() {
        println!(
            "  {}",
            console::style(format!("No history for channel '{channel}'.")).dim()
        );
        return Ok(());
    }

    println!("{}", render_table(&turns));
    Ok(())
}

fn render_table(turns: &[Turn]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Time (UTC)", "Who", "Message"]);

    for turn in turns {
        let who = if turn.is_bot() {
            "bot".to_string()
        } else {
            turn.author_name.clone().unwrap_or_else(|| "?".to_string())
        };
        table.add_row(vec![
            turn.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            who,
            turn.content.clone(),
        ]);
    }
    table
}
