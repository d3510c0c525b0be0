//! # Per-Pump State Projection
//!
//! Maintains the last known state of every pump seen on the line and
//! stabilises the exported status.
//!
//! An idle dispenser alternates its DC1 status between NOT_PROGRAMMED and
//! FILLING_COMPLETED several times a second as a keepalive. Exporting that
//! oscillation verbatim makes every downstream consumer flap, so the
//! projector keeps a short status history and applies a preference order:
//! critical transitions (RESET, AUTHORIZED) surface immediately, the
//! informative idle status wins over the empty one, and anything else must
//! repeat before it replaces the current status. The projector never invents
//! a transition; it only delays or ignores non-stabilised ones.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::constants::{STATUS_HISTORY_DEPTH, STATUS_MODE_THRESHOLD, STATUS_RECENT_WINDOW_MS};
use crate::dart::transaction::{PumpStatus, PumpTransaction};

/// Last known state of one pump.
#[derive(Debug, Clone)]
pub struct PumpState {
    pub address: u8,
    pub status: Option<PumpStatus>,
    pub volume: Option<f64>,
    pub amount: Option<f64>,
    pub nozzle: Option<u8>,
    pub nozzle_out: Option<bool>,
    pub price: Option<f64>,
    pub identity: Option<String>,
    pub last_update: Instant,
    /// Previous filling readings, kept so consumers can compute increments.
    pub prev_volume: Option<f64>,
    pub prev_amount: Option<f64>,
    status_history: VecDeque<(PumpStatus, Instant)>,
}

impl PumpState {
    fn new(address: u8, now: Instant) -> Self {
        PumpState {
            address,
            status: None,
            volume: None,
            amount: None,
            nozzle: None,
            nozzle_out: None,
            price: None,
            identity: None,
            last_update: now,
            prev_volume: None,
            prev_amount: None,
            status_history: VecDeque::with_capacity(STATUS_HISTORY_DEPTH),
        }
    }

    /// Value snapshot for subscribers.
    pub fn snapshot(&self) -> PumpStateSnapshot {
        PumpStateSnapshot {
            address: format!("0x{:02X}", self.address),
            status: self.status,
            volume: self.volume,
            amount: self.amount,
            nozzle: self.nozzle,
            nozzle_out: self.nozzle_out,
            price: self.price,
            identity: self.identity.clone(),
            age_ms: self.last_update.elapsed().as_millis() as u64,
        }
    }
}

/// Serializable view of a pump's state.
#[derive(Debug, Clone, Serialize)]
pub struct PumpStateSnapshot {
    pub address: String,
    pub status: Option<PumpStatus>,
    pub volume: Option<f64>,
    pub amount: Option<f64>,
    pub nozzle: Option<u8>,
    pub nozzle_out: Option<bool>,
    pub price: Option<f64>,
    pub identity: Option<String>,
    pub age_ms: u64,
}

/// Projects decoded transactions onto per-pump state.
#[derive(Debug, Default)]
pub struct StateProjector {
    pumps: HashMap<u8, PumpState>,
}

impl StateProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one decoded transaction and returns the newly exported
    /// status when the exported status changed.
    pub fn apply(
        &mut self,
        address: u8,
        transaction: &PumpTransaction,
        now: Instant,
    ) -> Option<PumpStatus> {
        let state = self
            .pumps
            .entry(address)
            .or_insert_with(|| PumpState::new(address, now));
        state.last_update = now;

        match transaction {
            PumpTransaction::Status { status } => {
                let before = state.status;
                Self::apply_status(state, *status, now);
                if state.status != before {
                    state.status
                } else {
                    None
                }
            }
            PumpTransaction::FillingInfo { volume, amount } => {
                state.prev_volume = state.volume;
                state.prev_amount = state.amount;
                state.volume = Some(*volume);
                state.amount = Some(*amount);
                None
            }
            PumpTransaction::NozzleStatus {
                price,
                nozzle,
                nozzle_out,
            } => {
                state.price = Some(*price);
                state.nozzle = Some(*nozzle);
                state.nozzle_out = Some(*nozzle_out);
                None
            }
            PumpTransaction::Identity { identity } => {
                state.identity = Some(identity.clone());
                None
            }
            _ => None,
        }
    }

    fn apply_status(state: &mut PumpState, new_status: PumpStatus, now: Instant) {
        state.status_history.push_back((new_status, now));
        while state.status_history.len() > STATUS_HISTORY_DEPTH {
            state.status_history.pop_front();
        }

        let window = Duration::from_millis(STATUS_RECENT_WINDOW_MS);
        let recent: Vec<PumpStatus> = state
            .status_history
            .iter()
            .filter(|(_, t)| now.duration_since(*t) <= window)
            .map(|(s, _)| *s)
            .collect();
        let count = |s: PumpStatus| recent.iter().filter(|&&r| r == s).count();

        let exported = if count(PumpStatus::Reset) > 0 {
            PumpStatus::Reset
        } else if count(PumpStatus::Authorized) > 0 {
            PumpStatus::Authorized
        } else if count(PumpStatus::FillingCompleted) > 0 {
            PumpStatus::FillingCompleted
        } else if count(PumpStatus::NotProgrammed) >= STATUS_MODE_THRESHOLD {
            PumpStatus::NotProgrammed
        } else if let Some(mode) = Self::mode(&recent) {
            if Some(mode) != state.status && count(mode) >= STATUS_MODE_THRESHOLD {
                mode
            } else {
                state.status.unwrap_or(new_status)
            }
        } else {
            state.status.unwrap_or(new_status)
        };

        state.status = Some(exported);
    }

    /// Most frequent status in the window.
    fn mode(recent: &[PumpStatus]) -> Option<PumpStatus> {
        let mut counts: HashMap<PumpStatus, usize> = HashMap::new();
        for &s in recent {
            *counts.entry(s).or_default() += 1;
        }
        counts.into_iter().max_by_key(|(_, n)| *n).map(|(s, _)| s)
    }

    pub fn pump(&self, address: u8) -> Option<&PumpState> {
        self.pumps.get(&address)
    }

    pub fn pumps(&self) -> impl Iterator<Item = &PumpState> {
        self.pumps.values()
    }

    /// Drops state for addresses no longer served, after a configuration
    /// change abandons them.
    pub fn forget(&mut self, address: u8) {
        self.pumps.remove(&address);
    }
}
