use std::{path::PathBuf, sync::Arc};

use {
    herald_commands::{AccessControl, CommandProcessor},
    herald_common::types::AccessPolicy,
    herald_config::HeraldConfig,
    herald_telegram::{PollMode, TelegramBot},
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use crate::{open_registry, require_token};

/// Answer subscription commands until ctrl-c.
pub async fn serve(config: &HeraldConfig, data_dir: Option<&PathBuf>) -> anyhow::Result<()> {
    let token = require_token(config)?;
    let registry = open_registry(config, data_dir).await?;

    let access = AccessControl::new(config.access.policy, config.access.allowlist.clone());
    if config.access.policy == AccessPolicy::Allowlist && config.access.allowlist.is_empty() {
        warn!("access allowlist is empty, every subscription command will be ignored");
    }
    let processor = Arc::new(CommandProcessor::new(
        registry,
        access,
        config.registry.on_duplicate,
    ));

    let bot = TelegramBot::connect(token).await?;
    bot.register_commands().await;

    let cancel = cancel_on_ctrl_c();
    bot.poll(PollMode::Commands(processor), cancel).await?;
    Ok(())
}

/// Log `Chat ID | Chat Title` for every inbound message until ctrl-c.
pub async fn chat_id(config: &HeraldConfig) -> anyhow::Result<()> {
    let token = require_token(config)?;
    let bot = TelegramBot::connect(token).await?;
    info!("send a message in the target chat to see its id");

    let cancel = cancel_on_ctrl_c();
    bot.poll(PollMode::ChatIds, cancel).await?;
    Ok(())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("shutting down");
        token.cancel();
    });
    cancel
}
