//! End-to-end runs of the scheduler loop against scripted collaborators.

use std::sync::Arc;
use std::time::Duration;

use feedwarden_classifier::fakes::ScriptedClassifier;
use feedwarden_classifier::{Classifier, ClassifyError, ErrorStatusBoard, Rating, Verdict};
use feedwarden_core::{
    Effect, Engine, EngineConfig, EngineDeps, EngineHandle, EngineResult, HostSignal, ItemId,
    ListKind, ManualClock, ObservedNode, Outcome, RecordingSurface, SessionSnapshot, METRICS,
};
use feedwarden_store::fakes::{MemoryCounterStore, MemoryGoalStore, MemorySettingsStore};
use feedwarden_store::{CounterStore, Criteria, ErrorKind, GoalStore, Settings, SettingsStore};
use tokio::task::JoinHandle;

const WATCH: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
const PHRASE: &str = "this video is not a distraction";

struct Harness {
    handle: EngineHandle,
    surface: RecordingSurface,
    goals: Arc<MemoryGoalStore>,
    settings: Arc<MemorySettingsStore>,
    counters: Arc<MemoryCounterStore>,
    board: Arc<ErrorStatusBoard>,
    clock: Arc<ManualClock>,
    join: JoinHandle<EngineResult<SessionSnapshot>>,
}

impl Harness {
    async fn start(classifier: Arc<dyn Classifier>, criteria: Criteria, settings: Settings) -> Self {
        let goals = Arc::new(MemoryGoalStore::with(criteria));
        let settings = Arc::new(MemorySettingsStore::with(settings));
        let counters = Arc::new(MemoryCounterStore::new());
        let board = Arc::new(ErrorStatusBoard::with_settings(settings.clone()).await);
        let clock = Arc::new(ManualClock::new());
        let surface = RecordingSurface::new();

        let deps = EngineDeps {
            goals: goals.clone(),
            settings: settings.clone(),
            counters: counters.clone(),
            classifier,
            board: board.clone(),
        };
        let (engine, handle) =
            Engine::with_clock(EngineConfig::default(), deps, surface.clone(), clock.clone())
                .unwrap();
        let join = tokio::spawn(engine.run());
        handle.settled().await.unwrap();

        Self {
            handle,
            surface,
            goals,
            settings,
            counters,
            board,
            clock,
            join,
        }
    }

    async fn send(&self, signal: HostSignal) {
        self.handle.send(signal).await.unwrap();
    }

    async fn navigate(&self, url: &str, title: &str) {
        self.send(HostSignal::NavigationStart).await;
        self.send(HostSignal::NavigationComplete {
            url: url.to_string(),
            title: title.to_string(),
        })
        .await;
    }

    async fn settle(&self) {
        self.handle.settled().await.unwrap();
    }

    async fn unload(self) -> SessionSnapshot {
        self.send(HostSignal::Unload).await;
        self.join.await.unwrap().unwrap()
    }
}

fn goals() -> Criteria {
    Criteria::new("cooking tutorials", "pranks")
}

fn filter_only() -> Settings {
    Settings {
        blocker_enabled: false,
        video_eval_enabled: false,
        ..Settings::default()
    }
}

fn nodes(n: u64) -> Vec<ObservedNode> {
    (1..=n)
        .map(|i| ObservedNode::new(i, format!("Recommendation {i}")))
        .collect()
}

fn last_playback(effects: &[Effect]) -> Option<Effect> {
    effects
        .iter()
        .rev()
        .find(|e| matches!(e, Effect::SuspendPlayback | Effect::ResumePlayback))
        .cloned()
}

#[tokio::test(start_paused = true)]
async fn avoid_verdict_ends_flagged_with_playback_suspended() {
    let classifier = Arc::new(
        ScriptedClassifier::new()
            .title_ok(Verdict::new(Rating::Avoid, "This is a prank compilation."))
            .summary_ok("Pranks on strangers.", "Mostly staged."),
    );
    let h = Harness::start(classifier.clone(), goals(), Settings::default()).await;

    h.navigate(WATCH, "Epic pranks 2024").await;
    h.settle().await;

    let effects = h.surface.effects();
    let warning = effects.iter().find_map(|e| match e {
        Effect::RenderWarning {
            report,
            confirmation_phrase,
        } => Some((report.clone(), confirmation_phrase.clone())),
        _ => None,
    });
    let (report, phrase) = warning.expect("flagged warning rendered");
    assert_eq!(report.verdict, Rating::Avoid);
    assert_eq!(phrase, PHRASE);
    assert_eq!(last_playback(&effects), Some(Effect::SuspendPlayback));
    assert!(effects.contains(&Effect::HidePrimary));
    assert_eq!(classifier.seen_titles(), vec!["Epic pranks 2024".to_string()]);

    h.unload().await;
}

#[tokio::test(start_paused = true)]
async fn only_exact_phrase_overrides_flagged_item() {
    let classifier = Arc::new(
        ScriptedClassifier::new().title_ok(Verdict::new(Rating::Irrelevant, "Off goal.")),
    );
    let h = Harness::start(classifier, goals(), Settings::default()).await;
    h.navigate(WATCH, "Celebrity gossip").await;
    h.settle().await;
    h.surface.take();

    for attempt in ["ok", "this video is not a distraction.", "THIS VIDEO IS NOT A DISTRACTION"] {
        h.send(HostSignal::OverrideInput {
            text: attempt.to_string(),
        })
        .await;
    }
    h.settle().await;
    assert!(h.surface.effects().is_empty());

    h.send(HostSignal::OverrideInput {
        text: PHRASE.to_string(),
    })
    .await;
    h.settle().await;
    let effects = h.surface.effects();
    assert!(effects.contains(&Effect::DismissWarning));
    assert_eq!(last_playback(&effects), Some(Effect::ResumePlayback));
    let resumed = effects
        .iter()
        .position(|e| *e == Effect::ResumePlayback)
        .unwrap();
    let verdict = effects[resumed..].iter().find_map(|e| match e {
        Effect::RenderVerdict { report } => Some(report.clone()),
        _ => None,
    });
    let report = verdict.expect("verdict stays rendered after the override");
    assert_eq!(report.verdict, Rating::Irrelevant);
    assert_eq!(report.rationale, "Off goal.");

    h.unload().await;
}

#[tokio::test(start_paused = true)]
async fn page_of_twenty_with_twelve_shown_hides_the_rest() {
    let shown: Vec<String> = (1..=12).map(|n| format!("video-{n}")).collect();
    let classifier = Arc::new(ScriptedClassifier::new().filter_ok(shown));
    let h = Harness::start(classifier.clone(), goals(), filter_only()).await;

    h.navigate(WATCH, "").await;
    h.send(HostSignal::ListMutated {
        list: ListKind::Recommendations,
        nodes: nodes(20),
    })
    .await;
    h.settle().await;

    let batches = classifier.seen_batches();
    assert_eq!(batches.len(), 1, "one request for the whole page");
    assert_eq!(batches[0].len(), 20);

    let effects = h.surface.effects();
    assert!(effects.iter().any(|e| matches!(e, Effect::LockItems { ids, .. } if ids.len() == 20)));
    let outcomes = effects
        .iter()
        .find_map(|e| match e {
            Effect::ApplyOutcomes { outcomes, .. } => Some(outcomes.clone()),
            _ => None,
        })
        .expect("outcomes applied");
    assert_eq!(outcomes.len(), 20);
    assert_eq!(outcomes.values().filter(|o| o.visible).count(), 12);
    for n in 13..=20 {
        assert_eq!(outcomes[&ItemId::new(n)], Outcome::hidden());
    }

    h.unload().await;
}

#[tokio::test(start_paused = true)]
async fn failed_page_stays_locked() {
    for err in [
        ClassifyError::Malformed("expected a list".into()),
        ClassifyError::Transport("connection reset".into()),
    ] {
        let classifier = Arc::new(ScriptedClassifier::new().filter_err(err));
        let h = Harness::start(classifier, goals(), filter_only()).await;
        h.navigate(WATCH, "").await;
        h.send(HostSignal::ListMutated {
            list: ListKind::Recommendations,
            nodes: nodes(19),
        })
        .await;
        h.settle().await;

        let effects = h.surface.effects();
        assert!(effects.iter().any(|e| matches!(e, Effect::LockItems { .. })));
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::ApplyOutcomes { .. })));
        h.unload().await;
    }
}

#[tokio::test(start_paused = true)]
async fn completions_for_torn_down_context_are_dropped() {
    let classifier = Arc::new(
        ScriptedClassifier::new()
            .gated()
            .title_ok(Verdict::new(Rating::Relevant, "Great tutorial."))
            .summary_ok("s", "a"),
    );
    let h = Harness::start(classifier.clone(), goals(), Settings::default()).await;
    let stale_before = METRICS.stale_dropped();

    h.navigate(WATCH, "Knife skills").await;
    h.navigate("https://www.youtube.com/feed/subscriptions", "").await;
    h.surface.take();
    classifier.release(2);
    h.settle().await;

    let effects = h.surface.effects();
    assert!(!effects
        .iter()
        .any(|e| matches!(e, Effect::RenderVerdict { .. } | Effect::RenderSummary { .. })));
    assert!(!effects.contains(&Effect::ShowPrimary));
    assert!(METRICS.stale_dropped() >= stale_before + 2);

    h.unload().await;
}

#[tokio::test(start_paused = true)]
async fn error_status_clears_after_next_success() {
    let classifier = Arc::new(
        ScriptedClassifier::new()
            .title_err(ClassifyError::RateLimit)
            .title_ok(Verdict::new(Rating::Relevant, "On goal.")),
    );
    let h = Harness::start(classifier, goals(), Settings::default()).await;
    assert!(h.surface.contains(&Effect::SetBadge { text: String::new() }));

    h.navigate(WATCH, "first").await;
    h.settle().await;
    assert_eq!(h.board.current().kind, ErrorKind::RateLimit);
    assert_eq!(
        h.settings.get().await.unwrap().error_status.kind,
        ErrorKind::RateLimit
    );
    // the failed item stays blocked
    assert_eq!(last_playback(&h.surface.effects()), Some(Effect::SuspendPlayback));
    for _ in 0..10 {
        if h.surface.contains(&Effect::SetBadge { text: "!".into() }) {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(h.surface.contains(&Effect::SetBadge { text: "!".into() }));

    h.navigate(WATCH, "second").await;
    h.settle().await;
    assert!(h.board.current().is_none());
    assert!(h.settings.get().await.unwrap().error_status.is_none());

    h.unload().await;
}

#[tokio::test(start_paused = true)]
async fn empty_goals_prompt_instead_of_gating() {
    let classifier = Arc::new(ScriptedClassifier::new());
    let h = Harness::start(classifier.clone(), Criteria::default(), Settings::default()).await;
    h.navigate(WATCH, "anything").await;
    h.send(HostSignal::ListMutated {
        list: ListKind::Recommendations,
        nodes: nodes(20),
    })
    .await;
    h.settle().await;

    let effects = h.surface.effects();
    assert!(effects.contains(&Effect::PromptForGoals));
    assert_eq!(last_playback(&effects), Some(Effect::ResumePlayback));
    assert_eq!(classifier.calls(), 0);

    h.unload().await;
}

#[tokio::test(start_paused = true)]
async fn goal_change_applies_to_later_pages_of_live_context() {
    let classifier = Arc::new(
        ScriptedClassifier::new()
            .filter_ok(["video-1"])
            .filter_ok(["video-7"]),
    );
    let h = Harness::start(classifier.clone(), goals(), filter_only()).await;
    let feed = |n| HostSignal::ListMutated {
        list: ListKind::Feed,
        nodes: nodes(n),
    };

    h.navigate("https://www.youtube.com/", "").await;
    h.send(feed(6)).await;
    h.send(feed(6)).await;
    h.settle().await;

    let updated = Criteria::new("woodworking", "drama");
    h.goals.set(updated.clone()).await.unwrap();
    h.send(feed(12)).await;
    h.send(feed(12)).await;
    h.settle().await;

    assert_eq!(classifier.seen_filter_criteria(), vec![goals(), updated]);
    let batches = classifier.seen_batches();
    assert_eq!(batches[1].len(), 6);
    assert_eq!(batches[1][0].id, "video-7");

    h.unload().await;
}

#[tokio::test(start_paused = true)]
async fn stale_failure_leaves_error_status_alone() {
    let classifier = Arc::new(
        ScriptedClassifier::new()
            .gated()
            .title_err(ClassifyError::Auth)
            .summary_err(ClassifyError::RateLimit),
    );
    let h = Harness::start(classifier.clone(), goals(), Settings::default()).await;

    h.navigate(WATCH, "Knife skills").await;
    h.navigate("https://www.youtube.com/feed/subscriptions", "").await;
    classifier.release(2);
    h.settle().await;

    assert!(h.board.current().is_none());
    assert!(h.settings.get().await.unwrap().error_status.is_none());
    assert!(!h.surface.contains(&Effect::SetBadge { text: "!".into() }));

    h.unload().await;
}

#[tokio::test(start_paused = true)]
async fn session_counts_visible_time_once() {
    let h = Harness::start(Arc::new(ScriptedClassifier::new()), goals(), filter_only()).await;

    h.clock.advance(Duration::from_secs(5));
    h.send(HostSignal::VisibilityChanged { hidden: true }).await;
    h.send(HostSignal::VisibilityChanged { hidden: true }).await;
    h.settle().await;
    assert_eq!(h.counters.get("totalTimeSpentOnYouTube").await.unwrap(), Some(5.0));

    h.clock.advance(Duration::from_secs(60));
    h.send(HostSignal::VisibilityChanged { hidden: false }).await;
    h.settle().await;
    h.clock.advance(Duration::from_secs(2));

    let counters = h.counters.clone();
    let snapshot = h.unload().await;
    assert_eq!(snapshot.accumulated_seconds, 7.0);
    assert_eq!(counters.get("totalTimeSpentOnYouTube").await.unwrap(), Some(7.0));
}

#[tokio::test(start_paused = true)]
async fn dropping_every_handle_stops_the_loop() {
    let h = Harness::start(Arc::new(ScriptedClassifier::new()), goals(), filter_only()).await;
    h.clock.advance(Duration::from_secs(3));
    let Harness { handle, join, .. } = h;
    drop(handle);
    let snapshot = join.await.unwrap().unwrap();
    assert_eq!(snapshot.accumulated_seconds, 3.0);
}
