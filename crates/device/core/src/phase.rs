//! Tick-driven activation sequencing.
//!
//! [`PhaseMachine`] is synchronous: the owner feeds it elapsed time and
//! receives the phases entered, one at a time, so each transition can be
//! acted on (and aborted) before the next one is taken. No wall clock is
//! read here.

use core::time::Duration;

use crate::config::PhaseTimings;

/// Phases of one activation cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    /// Controls disabled, close effects playing.
    Locking,
    /// Occupants sealed inside.
    Dwelling,
    /// Snapshot taken and outcomes computed.
    Resolving,
    /// Outcome batch broadcast.
    Announcing,
    /// Controls re-enabled, busy cleared.
    Unlocking,
}

impl Phase {
    /// Whether external controls are usable in this phase.
    pub const fn controls_enabled(self) -> bool {
        matches!(self, Self::Idle | Self::Unlocking)
    }
}

/// Result of an activation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    /// A new cycle started; `nonce` identifies it.
    Accepted { nonce: u64 },
    /// The machine was busy; nothing changed.
    Dropped,
}

#[derive(Clone, Debug)]
pub struct PhaseMachine {
    phase: Phase,
    busy: bool,
    defaults: PhaseTimings,
    active: PhaseTimings,
    remaining: Duration,
    nonce: u64,
}

impl PhaseMachine {
    pub fn new(defaults: PhaseTimings) -> Self {
        Self {
            phase: Phase::Idle,
            busy: false,
            defaults,
            active: defaults,
            remaining: Duration::ZERO,
            nonce: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Nonce of the current (or last) activation.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn timings(&self) -> PhaseTimings {
        self.defaults
    }

    pub fn request_activation(&mut self) -> Activation {
        self.request_activation_with(self.defaults)
    }

    /// Starts a cycle with one-off timings. Dropped unless idle and not busy.
    pub fn request_activation_with(&mut self, timings: PhaseTimings) -> Activation {
        if self.busy || self.phase != Phase::Idle {
            return Activation::Dropped;
        }
        self.busy = true;
        self.nonce += 1;
        self.active = timings;
        self.phase = Phase::Locking;
        self.remaining = timings.lock();
        Activation::Accepted { nonce: self.nonce }
    }

    /// Consumes time from `budget` and enters at most one phase.
    ///
    /// Returns `None` once the budget no longer covers the current phase or
    /// the machine is idle. Leftover time carries into the next phase.
    pub fn step(&mut self, budget: &mut Duration) -> Option<Phase> {
        if self.phase == Phase::Idle {
            return None;
        }
        if self.remaining > *budget {
            self.remaining -= *budget;
            *budget = Duration::ZERO;
            return None;
        }
        *budget -= self.remaining;

        let (next, duration) = match self.phase {
            Phase::Locking => (Phase::Dwelling, self.active.dwell()),
            Phase::Dwelling => (Phase::Resolving, Duration::ZERO),
            Phase::Resolving => (Phase::Announcing, self.active.settle()),
            Phase::Announcing => (Phase::Unlocking, Duration::ZERO),
            Phase::Unlocking | Phase::Idle => (Phase::Idle, Duration::ZERO),
        };
        if next == Phase::Unlocking {
            self.busy = false;
        }
        self.phase = next;
        self.remaining = duration;
        Some(next)
    }

    /// Every phase entered while consuming `elapsed`.
    pub fn tick(&mut self, elapsed: Duration) -> Vec<Phase> {
        let mut budget = elapsed;
        let mut entered = Vec::new();
        while let Some(phase) = self.step(&mut budget) {
            entered.push(phase);
        }
        entered
    }

    /// Returns to idle from any phase, clearing busy.
    pub fn abort(&mut self) {
        self.phase = Phase::Idle;
        self.busy = false;
        self.remaining = Duration::ZERO;
    }
}
