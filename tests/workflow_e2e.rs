use std::sync::Arc;

use chrono::Duration;

use herald_agent::{EngineSettings, GraphEngine, RunLog, StateStore, Workflow};
use herald_core::config::SchedulingConfig;
use herald_core::types::{Action, HumanFeedback, LogStatus, PostState, PostStatus};
use herald_core::{HeraldError, WorkflowState};
use herald_test_utils::{at, sample_preferences, FixedClock, ScriptedGenerator, ScriptedPublisher};

struct Setup {
    workflow: Workflow,
    clock: Arc<FixedClock>,
    generator: Arc<ScriptedGenerator>,
    publisher: Arc<ScriptedPublisher>,
    log_dir: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

fn setup_with(publisher: ScriptedPublisher, settings: EngineSettings) -> Setup {
    let generator = ScriptedGenerator::always(
        r#"{"title": "AI Without the Hype", "content": "Practical notes.\n\n#AI"}"#,
    );
    setup_full(generator, publisher, settings)
}

fn setup_full(generator: ScriptedGenerator, publisher: ScriptedPublisher, settings: EngineSettings) -> Setup {
    let dir = tempfile::tempdir().expect("tempdir");
    let log_dir = dir.path().join("logs");
    let clock = Arc::new(FixedClock::new(at(8, 0)));
    let generator = Arc::new(generator);
    let publisher = Arc::new(publisher);

    let engine = GraphEngine::new(
        generator.clone(),
        publisher.clone(),
        clock.clone(),
        RunLog::new(&log_dir),
        settings,
    );
    let store = StateStore::open(&dir.path().join("state.db")).expect("open store");
    let workflow = Workflow::open(
        Arc::new(engine),
        Arc::new(store),
        WorkflowState::with_preferences(sample_preferences()),
    )
    .expect("open workflow");

    Setup {
        workflow,
        clock,
        generator,
        publisher,
        log_dir,
        _dir: dir,
    }
}

fn setup() -> Setup {
    setup_with(ScriptedPublisher::succeeding(), EngineSettings::default())
}

fn entries(state: &WorkflowState, action: Action) -> Vec<LogStatus> {
    state
        .logs
        .iter()
        .filter(|e| e.action == action)
        .map(|e| e.status)
        .collect()
}

#[tokio::test]
async fn test_approved_inside_window_is_posted() {
    let s = setup();

    s.workflow.tick().await.unwrap();
    let drafted = s.workflow.snapshot().await;
    assert_eq!(drafted.content.as_ref().unwrap().title, "AI Without the Hype");
    assert!(drafted.status.is(PostState::Pending));

    s.clock.set(at(9, 2));
    s.workflow.submit_feedback(HumanFeedback::approve("")).await.unwrap();

    let state = s.workflow.snapshot().await;
    assert!(state.status.is(PostState::Posted));
    assert!(state.status.post_url.as_deref().unwrap().starts_with("https://www.linkedin.com/feed/update/"));
    assert_eq!(state.status.posted_at, Some(at(9, 2)));
    assert_eq!(entries(&state, Action::Posting), vec![LogStatus::Success]);
    assert_eq!(entries(&state, Action::Scheduling), vec![LogStatus::Success]);

    let latest = state.latest_log(Action::Posting).unwrap();
    assert_eq!(latest.status, LogStatus::Success);
}

#[tokio::test]
async fn test_outside_window_forces_after_three_waits() {
    let s = setup();
    s.workflow.tick().await.unwrap();

    s.clock.set(at(10, 0));
    s.workflow.submit_feedback(HumanFeedback::approve("")).await.unwrap();

    let state = s.workflow.snapshot().await;
    assert_eq!(
        entries(&state, Action::Scheduling),
        vec![LogStatus::Waiting, LogStatus::Waiting, LogStatus::Waiting, LogStatus::Forced]
    );
    assert!(state.status.is(PostState::Posted));
    assert_eq!(state.scheduler_attempts, 0);
}

#[tokio::test]
async fn test_debug_override_posts_immediately() {
    let settings = EngineSettings {
        scheduling: SchedulingConfig {
            force_post: true,
            ..SchedulingConfig::default()
        },
        ..EngineSettings::default()
    };
    let s = setup_with(ScriptedPublisher::succeeding(), settings);
    s.workflow.tick().await.unwrap();

    s.clock.set(at(15, 0));
    s.workflow.submit_feedback(HumanFeedback::approve("")).await.unwrap();

    let state = s.workflow.snapshot().await;
    assert_eq!(entries(&state, Action::Scheduling), vec![LogStatus::Forced]);
    assert!(state.status.is(PostState::Posted));
}

#[tokio::test]
async fn test_rejection_regenerates_and_waits_again() {
    let s = setup();
    s.workflow.tick().await.unwrap();

    s.workflow
        .submit_feedback(HumanFeedback::reject("Needs a concrete example"))
        .await
        .unwrap();

    let state = s.workflow.snapshot().await;
    assert!(state.status.is(PostState::Pending));
    assert!(state.content.is_some());
    assert_eq!(s.generator.calls(), 2);
    assert_eq!(
        s.generator.requests()[1].feedback.as_deref(),
        Some("Needs a concrete example")
    );
    assert_eq!(entries(&state, Action::ContentApproval), vec![LogStatus::Failure]);
    assert!(s.publisher.published().is_empty());
}

#[tokio::test]
async fn test_terminal_states_are_idempotent() {
    let s = setup();
    s.workflow.tick().await.unwrap();
    s.clock.set(at(9, 0));
    s.workflow.submit_feedback(HumanFeedback::approve("")).await.unwrap();

    let posted = s.workflow.snapshot().await;
    for _ in 0..3 {
        s.clock.advance(Duration::minutes(1));
        let report = s.workflow.tick().await.unwrap();
        assert!(!report.changed);
        assert!(report.new_entries.is_empty());
    }
    assert_eq!(s.workflow.snapshot().await, posted);
    assert_eq!(s.publisher.published().len(), 1);
}

#[tokio::test]
async fn test_failed_post_stays_failed_until_reapproved() {
    let s = setup_with(
        ScriptedPublisher::failing("401 Unauthorized: token expired"),
        EngineSettings::default(),
    );
    s.workflow.tick().await.unwrap();
    s.clock.set(at(9, 0));
    s.workflow.submit_feedback(HumanFeedback::approve("")).await.unwrap();

    let failed = s.workflow.snapshot().await;
    assert!(failed.status.is(PostState::Failed));
    assert_eq!(failed.status.error.as_deref(), Some("401 Unauthorized: token expired"));
    assert!(failed.status.post_url.is_none());
    assert_eq!(entries(&failed, Action::Posting), vec![LogStatus::Failure]);

    let report = s.workflow.tick().await.unwrap();
    assert!(!report.changed);
    assert_eq!(s.publisher.attempts(), 1);

    s.workflow.submit_feedback(HumanFeedback::approve("retry")).await.unwrap();
    assert_eq!(s.publisher.attempts(), 2);
}

#[tokio::test]
async fn test_status_and_log_agree() {
    let s = setup();
    s.workflow.tick().await.unwrap();
    s.clock.set(at(9, 4));
    s.workflow.submit_feedback(HumanFeedback::approve("")).await.unwrap();

    let state = s.workflow.snapshot().await;
    match state.status.status {
        PostState::Posted => {
            assert_eq!(state.latest_log(Action::Posting).unwrap().status, LogStatus::Success)
        }
        other => panic!("expected posted, got {other}"),
    }
}

#[tokio::test]
async fn test_persisted_log_matches_state() {
    let s = setup();
    s.workflow.tick().await.unwrap();
    s.clock.set(at(9, 1));
    s.workflow.submit_feedback(HumanFeedback::approve("")).await.unwrap();

    let state = s.workflow.snapshot().await;
    let persisted = RunLog::new(&s.log_dir)
        .read_day(at(9, 1).date_naive())
        .await
        .unwrap();
    assert_eq!(persisted, state.logs);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("state.db");

    let open = |clock: Arc<FixedClock>, publisher: Arc<ScriptedPublisher>| {
        let engine = GraphEngine::new(
            Arc::new(ScriptedGenerator::always("Title: Restarts\nContent: Still here.")),
            publisher,
            clock,
            RunLog::new(dir.path().join("logs")),
            EngineSettings::default(),
        );
        Workflow::open(
            Arc::new(engine),
            Arc::new(StateStore::open(&db).unwrap()),
            WorkflowState::with_preferences(sample_preferences()),
        )
        .unwrap()
    };

    let first_publisher = Arc::new(ScriptedPublisher::succeeding());
    {
        let wf = open(Arc::new(FixedClock::new(at(10, 0))), first_publisher.clone());
        wf.tick().await.unwrap();
    }

    let publisher = Arc::new(ScriptedPublisher::succeeding());
    let wf = open(Arc::new(FixedClock::new(at(9, 3))), publisher.clone());
    let restored = wf.snapshot().await;
    assert_eq!(restored.content.as_ref().unwrap().title, "Restarts");
    assert!(restored.status.is(PostState::Pending));

    wf.submit_feedback(HumanFeedback::approve("")).await.unwrap();
    assert!(wf.snapshot().await.status.is(PostState::Posted));
    assert_eq!(publisher.published()[0].0, "Restarts");
    assert!(first_publisher.published().is_empty());
}

#[tokio::test]
async fn test_unapproved_content_is_never_scheduled() {
    let s = setup();
    for hour in [9, 10, 11, 12] {
        s.clock.set(at(hour, 0));
        s.workflow.tick().await.unwrap();
    }

    let state = s.workflow.snapshot().await;
    assert!(state.current_time.is_none());
    assert_eq!(state.scheduler_attempts, 0);
    assert!(entries(&state, Action::Scheduling).is_empty());
    assert_eq!(s.generator.calls(), 1);
    assert_eq!(state.status, PostStatus::new(PostState::Pending));
}

#[tokio::test]
async fn test_approval_before_any_draft_is_refused() {
    let s = setup();
    s.clock.set(at(10, 0));

    let err = s.workflow.submit_feedback(HumanFeedback::approve("")).await.unwrap_err();
    assert!(matches!(err, HeraldError::NoDraftToReview));
    assert!(s.workflow.snapshot().await.human_feedback.is_none());

    s.workflow.tick().await.unwrap();
    let state = s.workflow.snapshot().await;
    assert!(state.content.is_some());
    assert!(state.status.is(PostState::Pending));
    assert!(entries(&state, Action::Scheduling).is_empty());
    assert!(s.publisher.published().is_empty());
}

#[tokio::test]
async fn test_approval_after_failed_regeneration_is_refused() {
    let generator = ScriptedGenerator::sequence([
        Ok("Title: First\nContent: Shown to the reviewer."),
        Err("rate limited"),
        Ok("Title: Third\nContent: Not reviewed yet."),
    ]);
    let s = setup_full(generator, ScriptedPublisher::succeeding(), EngineSettings::default());
    s.workflow.tick().await.unwrap();

    s.clock.set(at(10, 0));
    s.workflow
        .submit_feedback(HumanFeedback::reject("Try another angle"))
        .await
        .unwrap();
    let rejected = s.workflow.snapshot().await;
    assert!(rejected.status.is(PostState::Rejected));
    assert!(rejected.content.is_none());
    assert!(rejected.status.error.as_deref().unwrap().contains("rate limited"));

    let err = s.workflow.submit_feedback(HumanFeedback::approve("")).await.unwrap_err();
    assert!(matches!(err, HeraldError::NoDraftToReview));

    s.workflow.tick().await.unwrap();
    let redrafted = s.workflow.snapshot().await;
    assert_eq!(redrafted.content.as_ref().unwrap().title, "Third");
    assert!(redrafted.status.is(PostState::Pending));
    assert!(s.publisher.published().is_empty());

    s.workflow.submit_feedback(HumanFeedback::approve("")).await.unwrap();
    assert_eq!(s.publisher.published()[0].0, "Third");
    assert_eq!(s.generator.calls(), 3);
}
