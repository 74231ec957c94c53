//! Session Time Tracker.
//!
//! Accumulates foreground time as wall-clock deltas between flushes, so a
//! late or missed tick loses nothing. Time spent hidden is never counted.

use std::sync::Arc;

use feedwarden_store::CounterStore;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::clock::{Clock, SystemClock};
use crate::error::EngineResult;
use crate::obs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub accumulated_seconds: f64,
    pub active: bool,
}

pub struct SessionTracker<C: Clock = SystemClock> {
    clock: C,
    store: Arc<dyn CounterStore>,
    key: String,
    total: f64,
    origin: Instant,
    state: SessionState,
    loaded: bool,
}

impl<C: Clock> SessionTracker<C> {
    /// Paused until [`load`](Self::load).
    pub fn new(clock: C, store: Arc<dyn CounterStore>, key: impl Into<String>) -> Self {
        let origin = clock.now();
        Self {
            clock,
            store,
            key: key.into(),
            total: 0.0,
            origin,
            state: SessionState::Paused,
            loaded: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            accumulated_seconds: self.total,
            active: self.state == SessionState::Active,
        }
    }

    /// Read the stored total and start counting.
    pub async fn load(&mut self) -> EngineResult<f64> {
        self.total = self.store.get(&self.key).await?.unwrap_or(0.0);
        self.origin = self.clock.now();
        self.state = SessionState::Active;
        self.loaded = true;
        Ok(self.total)
    }

    /// Periodic flush while active.
    pub async fn tick(&mut self) -> EngineResult<f64> {
        if self.state == SessionState::Active {
            self.flush().await?;
        }
        Ok(self.total)
    }

    /// Tab hidden: flush, then pause. Repeated hides are no-ops.
    pub async fn hide(&mut self) -> EngineResult<()> {
        if self.state != SessionState::Active {
            return Ok(());
        }
        self.state = SessionState::Paused;
        self.flush().await
    }

    /// Tab visible again: restart the tick origin so the hidden interval is
    /// skipped.
    pub fn show(&mut self) {
        if self.loaded && self.state == SessionState::Paused {
            self.origin = self.clock.now();
            self.state = SessionState::Active;
        }
    }

    /// Final flush before the process ends.
    pub async fn unload(&mut self) -> EngineResult<()> {
        if self.state == SessionState::Active {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> EngineResult<()> {
        let now = self.clock.now();
        let delta = now.saturating_duration_since(self.origin).as_secs_f64();
        self.origin = now;
        self.total += delta;
        self.store.set(&self.key, self.total).await?;
        obs::emit_session_flushed(self.total, delta);
        Ok(())
    }
}
