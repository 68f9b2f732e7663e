//! `chatrelay reset` -- clear a channel's saved history.

use chatrelay_core::state::LoadOutcome;
use chatrelay_types::chat::ChannelId;

use crate::state::AppState;

pub async fn reset_channel(app: &AppState, channel: &str, json: bool) -> anyhow::Result<()> {
    let channel = ChannelId::new(channel);

    // Saving over a snapshot we could not read would drop every other channel.
    if let LoadOutcome::Recovered { reason } = app.load_snapshot().await {
        anyhow::bail!(
            "refusing to reset channel '{channel}': snapshot {} could not be loaded ({reason})",
            app.state.store().path().display()
        );
    }

    let had_history = app.state.reset_channel(&channel).await?;

    if json {
        let out = serde_json::json!({
            "channel": channel.as_str(),
            "cleared": had_history,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if had_history {
        println!(
            "  {} Cleared history for channel '{}'",
            console::style("✓").green(),
            console::style(&channel).cyan()
        );
    } else {
        println!(
            "  {}",
            console::style(format!("Channel '{channel}' had no history.")).dim()
        );
    }
    Ok(())
}
