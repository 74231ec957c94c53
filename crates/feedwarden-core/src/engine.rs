//! The single-threaded scheduler loop.
//!
//! Host signals and settle requests arrive on the handle channel;
//! classification calls run as spawned tasks posting completions, tagged
//! with the context that issued them, on a second channel. The session tick,
//! badge changes and goal changes are selected alongside both. A reply for a
//! torn-down context is dropped before it can touch the error status.

use std::sync::Arc;

use feedwarden_classifier::{badge_text, Classifier, ErrorStatusBoard};
use feedwarden_store::{Criteria, CounterStore, GoalStore, Settings, SettingsStore};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn, Instrument};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::effect::{Effect, Surface};
use crate::error::{EngineError, EngineResult};
use crate::item::{ListKind, ObservedNode};
use crate::metrics::METRICS;
use crate::navigation::{
    Completion, CompletionOutcome, ContextToken, Dispatch, NavigationCoordinator, Step,
};
use crate::obs::{self, ContextSpan};
use crate::session::{SessionSnapshot, SessionTracker};

/// Point-in-time events from the host runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum HostSignal {
    NavigationStart,
    NavigationComplete {
        url: String,
        /// Title of the focal item, when the page has one.
        #[serde(default)]
        title: String,
    },
    VisibilityChanged {
        hidden: bool,
    },
    Unload,
    ListMutated {
        list: ListKind,
        nodes: Vec<ObservedNode>,
    },
    OverrideInput {
        text: String,
    },
}

enum EngineEvent {
    Host(HostSignal),
    Settle(oneshot::Sender<()>),
}

/// Sending side of a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineEvent>,
}

impl EngineHandle {
    pub async fn send(&self, signal: HostSignal) -> EngineResult<()> {
        self.tx
            .send(EngineEvent::Host(signal))
            .await
            .map_err(|_| EngineError::Shutdown)
    }

    /// Wait until every signal sent so far is handled and no
    /// classification call is outstanding.
    pub async fn settled(&self) -> EngineResult<()> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(EngineEvent::Settle(tx))
            .await
            .map_err(|_| EngineError::Shutdown)?;
        rx.await.map_err(|_| EngineError::Shutdown)
    }
}

/// External collaborators the engine talks to.
pub struct EngineDeps {
    pub goals: Arc<dyn GoalStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub counters: Arc<dyn CounterStore>,
    pub classifier: Arc<dyn Classifier>,
    pub board: Arc<ErrorStatusBoard>,
}

pub struct Engine<C: Clock = SystemClock> {
    config: EngineConfig,
    coordinator: NavigationCoordinator,
    session: SessionTracker<C>,
    goals: Arc<dyn GoalStore>,
    goal_changes: watch::Receiver<Criteria>,
    settings: Arc<dyn SettingsStore>,
    classifier: Arc<dyn Classifier>,
    board: Arc<ErrorStatusBoard>,
    surface: Box<dyn Surface>,
    events: mpsc::Receiver<EngineEvent>,
    completions_tx: mpsc::Sender<Completion>,
    completions: mpsc::Receiver<Completion>,
    in_flight: usize,
    waiters: Vec<oneshot::Sender<()>>,
}

impl Engine<SystemClock> {
    pub fn new(
        config: EngineConfig,
        deps: EngineDeps,
        surface: impl Surface + 'static,
    ) -> EngineResult<(Self, EngineHandle)> {
        Self::with_clock(config, deps, surface, SystemClock)
    }
}

impl<C: Clock> Engine<C> {
    pub fn with_clock(
        config: EngineConfig,
        deps: EngineDeps,
        surface: impl Surface + 'static,
        clock: C,
    ) -> EngineResult<(Self, EngineHandle)> {
        config.validate()?;
        let (tx, events) = mpsc::channel(config.channel_capacity);
        let (completions_tx, completions) = mpsc::channel(config.channel_capacity);
        let engine = Self {
            coordinator: NavigationCoordinator::new(config.clone()),
            session: SessionTracker::new(clock, deps.counters, config.counter_key.clone()),
            config,
            goal_changes: deps.goals.subscribe(),
            goals: deps.goals,
            settings: deps.settings,
            classifier: deps.classifier,
            board: deps.board,
            surface: Box::new(surface),
            events,
            completions_tx,
            completions,
            in_flight: 0,
            waiters: Vec::new(),
        };
        Ok((engine, EngineHandle { tx }))
    }

    pub fn session(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Run until `Unload` or until every handle is dropped; returns the
    /// final session total.
    pub async fn run(mut self) -> EngineResult<SessionSnapshot> {
        if let Err(e) = self.session.load().await {
            // counting from zero would overwrite the stored total
            warn!(error = %e, "session total unavailable, time tracking paused");
        }
        let mut badge = self.board.subscribe();
        let initial = self.board.current();
        self.render(Effect::SetBadge {
            text: badge_text(&initial).to_string(),
        });
        let mut goals_open = true;
        let mut badge_open = true;

        let mut tick = tokio::time::interval(self.config.tick_interval());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tick.tick().await;

        info!(event = "engine.started", tick_ms = self.config.tick_interval_ms);

        loop {
            tokio::select! {
                event = self.events.recv() => {
                    let running = match event {
                        Some(event) => self.handle(event).await,
                        None => {
                            debug!("all handles dropped");
                            self.unload().await;
                            false
                        }
                    };
                    if !running {
                        break;
                    }
                }
                Some(completion) = self.completions.recv() => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    self.handle_completion(completion).await;
                    self.notify_settled();
                }
                _ = tick.tick() => {
                    if let Err(e) = self.session.tick().await {
                        warn!(error = %e, "session flush failed");
                    }
                }
                changed = badge.changed(), if badge_open => {
                    if changed.is_err() {
                        badge_open = false;
                        continue;
                    }
                    let status = badge.borrow_and_update().clone();
                    self.render(Effect::SetBadge {
                        text: badge_text(&status).to_string(),
                    });
                }
                changed = self.goal_changes.changed(), if goals_open => {
                    if changed.is_err() {
                        goals_open = false;
                        continue;
                    }
                    self.apply_goals();
                }
            }
        }

        self.coordinator.teardown();
        METRICS.flush();
        info!(event = "engine.stopped", total_seconds = self.session.total());
        Ok(self.session.snapshot())
    }

    /// Returns `false` when the loop should stop.
    async fn handle(&mut self, event: EngineEvent) -> bool {
        match event {
            EngineEvent::Host(signal) => {
                if let Ok(true) = self.goal_changes.has_changed() {
                    self.apply_goals();
                }
                let span = match self.coordinator.token() {
                    Some(token) => obs::context_span(&token.to_string()),
                    None => tracing::Span::none(),
                };
                self.handle_signal(signal).instrument(span).await
            }
            EngineEvent::Settle(waiter) => {
                self.waiters.push(waiter);
                self.notify_settled();
                true
            }
        }
    }

    /// Hand the latest goals to the live context.
    fn apply_goals(&mut self) {
        let criteria = self.goal_changes.borrow_and_update().clone();
        debug!(criteria = %criteria.digest(), "goals changed");
        self.coordinator.update_criteria(criteria);
    }

    fn notify_settled(&mut self) {
        if self.in_flight == 0 {
            for waiter in self.waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }

    async fn handle_signal(&mut self, signal: HostSignal) -> bool {
        match signal {
            HostSignal::NavigationStart => {
                let step = self.coordinator.navigation_start();
                self.apply(step);
            }
            HostSignal::NavigationComplete { url, title } => {
                match self.read_policy().await {
                    Ok((settings, criteria)) => {
                        match self
                            .coordinator
                            .navigation_complete(&url, &title, settings, criteria)
                        {
                            Ok(step) => self.apply(step),
                            Err(e) => warn!(error = %e, url = %url, "navigation failed"),
                        }
                    }
                    // fail safe: whatever was suspended stays suspended
                    Err(e) => warn!(error = %e, url = %url, "policy unavailable"),
                }
            }
            HostSignal::VisibilityChanged { hidden: true } => {
                if let Err(e) = self.session.hide().await {
                    warn!(error = %e, "session flush failed");
                }
            }
            HostSignal::VisibilityChanged { hidden: false } => self.session.show(),
            HostSignal::ListMutated { list, nodes } => {
                let step = self.coordinator.list_mutated(list, &nodes);
                self.apply(step);
            }
            HostSignal::OverrideInput { text } => match self.coordinator.override_input(&text) {
                Ok(step) => self.apply(step),
                Err(e) => debug!(error = %e, "override ignored"),
            },
            HostSignal::Unload => {
                self.unload().await;
                return false;
            }
        }
        true
    }

    async fn unload(&mut self) {
        self.coordinator.teardown();
        if let Err(e) = self.session.unload().await {
            warn!(error = %e, "final session flush failed");
        }
    }

    async fn read_policy(&self) -> EngineResult<(Settings, Criteria)> {
        let settings = self.settings.get().await?;
        let criteria = self.goals.get().await?;
        Ok((settings, criteria))
    }

    async fn handle_completion(&mut self, completion: Completion) {
        if self.coordinator.token() != Some(completion.token) {
            METRICS.inc_stale_dropped();
            obs::emit_stale_dropped(&completion.token.to_string(), completion.outcome.call());
            return;
        }
        match &completion.outcome {
            CompletionOutcome::Title(result) => self.board.record(result).await,
            CompletionOutcome::Summary(result) => self.board.record(result).await,
            CompletionOutcome::Filter { result, .. } => self.board.record(result).await,
        }
        self.route_completion(completion);
    }

    fn route_completion(&mut self, completion: Completion) {
        let token = completion.token.to_string();
        let _span = ContextSpan::enter(&token);
        let call = completion.outcome.call();
        if let Some(err) = completion.outcome.error() {
            METRICS.inc_classification_failures();
            obs::emit_classification_failed(call, err);
        }
        match self.coordinator.complete(completion) {
            Ok(step) => self.apply(step),
            Err(EngineError::StaleContext { .. }) => {
                METRICS.inc_stale_dropped();
                obs::emit_stale_dropped(&token, call);
            }
            Err(e) => warn!(error = %e, call = %call, "completion rejected"),
        }
    }

    fn apply(&mut self, step: Step) {
        for effect in step.effects {
            self.render(effect);
        }
        if step.dispatches.is_empty() {
            return;
        }
        let Some(token) = self.coordinator.token() else {
            return;
        };
        for dispatch in step.dispatches {
            self.spawn(token, dispatch);
        }
    }

    fn render(&mut self, effect: Effect) {
        self.surface.render(effect);
    }

    fn spawn(&mut self, token: ContextToken, dispatch: Dispatch) {
        let classifier = self.classifier.clone();
        let tx = self.completions_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let outcome = match dispatch {
                Dispatch::Title { criteria, title } => {
                    CompletionOutcome::Title(classifier.evaluate_title(&criteria, &title).await)
                }
                Dispatch::Summary { content } => {
                    CompletionOutcome::Summary(classifier.summarize(&content).await)
                }
                Dispatch::Filter(request) => CompletionOutcome::Filter {
                    list: request.list,
                    page_id: request.page_id,
                    result: classifier
                        .filter_batch(&request.criteria, &request.batch)
                        .await,
                },
            };
            let completion = Completion { token, outcome };
            if tx.send(completion).await.is_err() {
                debug!("engine stopped before completion was delivered");
            }
        });
    }
}
