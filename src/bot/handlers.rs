// src/bot/handlers.rs - Effects behind each chat command

use async_trait::async_trait;
use log::{error, info, warn};

use crate::bot::commands::{CommandContext, CommandHandler, CommandOutcome};

/// `!clip`: resolve the channel, then ask Helix for a clip
pub struct ClipCommand;

#[async_trait]
impl CommandHandler for ClipCommand {
    async fn execute(&self, ctx: &CommandContext<'_>) -> CommandOutcome {
        let session = ctx.session;

        let broadcaster_id = match session.clips.broadcaster_id(&session.channel).await {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to resolve broadcaster id for {}: {}", session.channel, e);
                return CommandOutcome::Completed(vec!["Error al obtener ID del canal".to_string()]);
            }
        };

        let reply = match session.clips.create_clip(&broadcaster_id).await {
            Ok(url) => format!("¡Clip creado! {}", url),
            Err(e) => {
                error!("Failed to create clip: {}", e);
                "No pude crear el clip, ¿estás en vivo?".to_string()
            }
        };

        CommandOutcome::Completed(vec![reply])
    }
}

/// `!rank` / `!rango`
pub struct RankCommand;

#[async_trait]
impl CommandHandler for RankCommand {
    async fn execute(&self, ctx: &CommandContext<'_>) -> CommandOutcome {
        let puuid = ctx.session.subject.get().await;

        let reply = match ctx.session.ranks.rank(&puuid).await {
            Ok(rank) => format!(
                "{}, {} está en pointLeft {}, [{} RR] pointRight",
                ctx.message.username, ctx.session.channel, rank.tier, rank.ranking_in_tier
            ),
            Err(e) => {
                error!("Failed to fetch rank for {}: {}", puuid, e);
                "No se pudo obtener el rango".to_string()
            }
        };

        CommandOutcome::Completed(vec![reply])
    }
}

/// `!setpuuid <PUUID>`
pub struct SetPuuidCommand;

#[async_trait]
impl CommandHandler for SetPuuidCommand {
    async fn execute(&self, ctx: &CommandContext<'_>) -> CommandOutcome {
        let Some(candidate) = ctx.args.split_whitespace().next() else {
            return CommandOutcome::Rejected(vec!["Usa: !setpuuid <PUUID>".to_string()]);
        };

        if !ctx.session.subject.set(candidate).await {
            warn!("{} sent an invalid PUUID: {}", ctx.message.username, candidate);
            return CommandOutcome::Rejected(vec!["PUUID inválido".to_string()]);
        }

        info!("{} set the tracked PUUID", ctx.message.username);
        CommandOutcome::Completed(vec![format!("PUUID actualizado a {}", candidate)])
    }
}

/// `!pot`: fixed chant, five lines of five numbered tokens
pub struct PotCommand;

pub const POT_LINES: usize = 5;
pub const POT_TOKENS_PER_LINE: usize = 5;

pub fn pot_lines() -> Vec<String> {
    (0..POT_LINES)
        .map(|line| {
            let start = line * POT_TOKENS_PER_LINE + 1;
            (start..start + POT_TOKENS_PER_LINE)
                .map(|n| format!("pot{}", n))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

#[async_trait]
impl CommandHandler for PotCommand {
    async fn execute(&self, _ctx: &CommandContext<'_>) -> CommandOutcome {
        CommandOutcome::Completed(pot_lines())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pot_lines_layout() {
        let lines = pot_lines();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "pot1 pot2 pot3 pot4 pot5");
        assert_eq!(lines[4], "pot21 pot22 pot23 pot24 pot25");
    }
}
