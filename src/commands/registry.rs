use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use tracing::{info, warn};

use super::{chance, gifs, imgur, quote, simple, square, web, yugioh};
use super::{Command, CommandDeps};

pub type Constructor = fn(&CommandDeps) -> Result<Box<dyn Command>>;

/// Every known command, in dispatch order.
pub const CONSTRUCTORS: &[(&str, Constructor)] = &[
    ("archive_url", web::archive_url),
    ("convert_currency", web::convert_currency),
    ("dance_gif", simple::dance_gif),
    ("eight_ball", chance::eight_ball),
    ("either_or", chance::either_or),
    ("excuse", web::excuse),
    ("flip_table", simple::flip_table),
    ("google", web::google),
    ("help", simple::help),
    ("imgur", imgur::imgur),
    ("message_to_gif", gifs::message_to_gif),
    ("mtg", web::mtg),
    ("ping", simple::ping),
    ("quote", quote::quote),
    ("russian_roulette", chance::russian_roulette),
    ("russian_scoreboard", chance::russian_scoreboard),
    ("sgdq", web::sgdq),
    ("shrug", simple::shrug),
    ("square_meme", square::square_meme),
    ("title", simple::title),
    ("yugioh", yugioh::yugioh),
];

/// Construct and prepare every registered command.
///
/// Prepare hooks run concurrently. A failing hook is logged and the command
/// is still registered, the same as a command with nothing to prepare.
pub async fn build(deps: &CommandDeps) -> Result<Vec<Arc<dyn Command>>> {
    let mut commands = Vec::with_capacity(CONSTRUCTORS.len());

    for (name, constructor) in CONSTRUCTORS {
        let command =
            constructor(deps).with_context(|| format!("Failed to build command {}", name))?;
        info!("Loading command {} {:?}", name, command.matcher().usages());
        commands.push(command);
    }

    let prepared = join_all(commands.iter_mut().map(|command| command.prepare())).await;
    for (command, result) in commands.iter().zip(prepared) {
        if let Err(e) = result {
            warn!("Command {} failed to prepare: {:#}", command.name(), e);
        }
    }

    info!("Registered {} commands", commands.len());

    Ok(commands.into_iter().map(Arc::from).collect())
}
