use std::sync::Arc;

use crate::bot::cooldowns::CooldownGate;
use crate::bot::dedup::MessageDeduplicator;
use crate::bot::subject::TrackedSubject;
use crate::services::{ClipService, RankService};

/// Mutable bot state plus the adapters commands call into
pub struct Session {
    /// Login of the broadcaster the bot serves
    pub channel: String,
    pub dedup: MessageDeduplicator,
    pub cooldowns: CooldownGate,
    pub subject: TrackedSubject,
    pub clips: Arc<dyn ClipService>,
    pub ranks: Arc<dyn RankService>,
}

impl Session {
    pub fn new(
        channel: String,
        initial_puuid: String,
        clips: Arc<dyn ClipService>,
        ranks: Arc<dyn RankService>,
    ) -> Self {
        Self {
            channel,
            dedup: MessageDeduplicator::new(),
            cooldowns: CooldownGate::new(),
            subject: TrackedSubject::new(initial_puuid),
            clips,
            ranks,
        }
    }
}
