use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use lunchbot_core::config::LunchConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::bot::{ConsoleChat, Inbox, InboxSender, LunchBot};
use crate::cmd::open_store;
use crate::control::{self, ControlMessage};
use crate::output::OutputMode;

#[derive(Args, Debug, Default)]
pub struct RunArgs {}

/// Feed console lines to the control loop until stdin closes.
async fn read_console(sender: InboxSender, signup_emoji: String) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => {
                if sender.send(control::parse(&line, &signup_emoji)).is_err() {
                    return;
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(%err, "console read failed");
                break;
            }
        }
    }
    let _ = sender.send(ControlMessage::Shutdown);
}

/// Run the bot against the console until input ends.
pub fn run_bot(_args: &RunArgs, output: OutputMode, config: &LunchConfig, project_root: &Path) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let store = open_store(config, project_root);
    let chat = ConsoleChat::new(output, std::io::stdout());
    let bot = LunchBot::new(store, chat, config.clone(), Utc::now)?;
    info!(data_dir = %config.data_path(project_root).display(), "lunch bot starting");

    let result = runtime.block_on(async move {
        let (sender, inbox) = Inbox::channel();
        let reader = tokio::spawn(read_console(sender, config.signup_emoji.clone()));
        let result = bot.run(inbox).await;
        reader.abort();
        result.map(drop)
    });
    // a blocked stdin read must not hold the process open
    runtime.shutdown_background();
    result
}
