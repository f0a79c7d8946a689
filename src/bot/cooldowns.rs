use chrono::{DateTime, Utc};
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Commands that share one cooldown timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CooldownFamily {
    Clip,
    Rank,
    Pot,
}

impl CooldownFamily {
    pub fn cooldown_seconds(self) -> u64 {
        match self {
            CooldownFamily::Clip => 30,
            CooldownFamily::Rank => 15,
            CooldownFamily::Pot => 30,
        }
    }
}

impl fmt::Display for CooldownFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CooldownFamily::Clip => "clip",
            CooldownFamily::Rank => "rank",
            CooldownFamily::Pot => "pot",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
struct FamilyState {
    last_invoked_at: Option<DateTime<Utc>>,
    in_flight: bool,
}

/// Per-family gate. A family is reserved while a permit is outstanding and
/// only starts its cooldown once the permit is committed.
pub struct CooldownGate {
    states: Mutex<HashMap<CooldownFamily, FamilyState>>,
}

impl CooldownGate {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CooldownFamily, FamilyState>> {
        self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reserve `family`, or return the seconds left before it can run again
    pub fn try_acquire(&self, family: CooldownFamily, now: DateTime<Utc>) -> Result<CooldownPermit<'_>, u64> {
        let cooldown_secs = family.cooldown_seconds();
        let mut states = self.lock();
        let state = states.entry(family).or_default();

        if state.in_flight {
            debug!("Cooldown family '{}' already running", family);
            return Err(cooldown_secs);
        }

        if let Some(last) = state.last_invoked_at {
            let cooldown_ms = cooldown_secs as i64 * 1000;
            let elapsed_ms = now.signed_duration_since(last).num_milliseconds();
            let remaining_ms = (cooldown_ms - elapsed_ms).min(cooldown_ms);
            if remaining_ms > 0 {
                let remaining_secs = (remaining_ms + 999) / 1000;
                debug!("Cooldown family '{}' has {}s left", family, remaining_secs);
                return Err(remaining_secs as u64);
            }
        }

        state.in_flight = true;
        Ok(CooldownPermit {
            gate: self,
            family,
            acquired_at: now,
            committed: false,
        })
    }

    pub fn last_invoked_at(&self, family: CooldownFamily) -> Option<DateTime<Utc>> {
        self.lock().get(&family).and_then(|state| state.last_invoked_at)
    }

    fn finish(&self, family: CooldownFamily, invoked_at: Option<DateTime<Utc>>) {
        let mut states = self.lock();
        let state = states.entry(family).or_default();
        state.in_flight = false;
        if invoked_at.is_some() {
            state.last_invoked_at = invoked_at;
        }
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Reservation of a cooldown family. Dropping it uncommitted releases the
/// family without starting the cooldown.
pub struct CooldownPermit<'a> {
    gate: &'a CooldownGate,
    family: CooldownFamily,
    acquired_at: DateTime<Utc>,
    committed: bool,
}

impl CooldownPermit<'_> {
    pub fn family(&self) -> CooldownFamily {
        self.family
    }

    /// Start the cooldown from the moment the permit was acquired
    pub fn commit(mut self) {
        self.committed = true;
        self.gate.finish(self.family, Some(self.acquired_at));
    }
}

impl Drop for CooldownPermit<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.gate.finish(self.family, None);
        }
    }
}
