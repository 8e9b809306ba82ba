//! End-to-end chain execution scenarios.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use taskchain::adapters::{MockModelClient, MockTaskExecutor};
use taskchain::domain::models::chain::{
    BranchOperator, ChainDefinition, ChainTask, HookCall, TaskTransition, TaskType,
    TransitionBranch, TERM_END,
};
use taskchain::domain::models::value::Value;
use taskchain::services::{
    ActivityEvent, ChainEnv, EchoHook, HookRegistry, RecordingTracker, RuntimeState, SimpleEnv,
    StandardTaskExecutor,
};
use taskchain::EngineError;

fn chain(id: &str, tasks: Vec<ChainTask>) -> ChainDefinition {
    ChainDefinition {
        id: id.to_string(),
        description: String::new(),
        routing_strategy: String::new(),
        tasks,
    }
}

fn default_to(goto_task: &str) -> TaskTransition {
    TaskTransition::branches(vec![TransitionBranch::default_to(goto_task)])
}

fn terminal(id: &str, task_type: TaskType) -> ChainTask {
    ChainTask::new(id, task_type).with_transition(default_to(TERM_END))
}

/// Engine wired to the real executor with a scripted model client.
fn real_env(model: MockModelClient) -> (SimpleEnv, Arc<RecordingTracker>) {
    let tracker = Arc::new(RecordingTracker::new());
    let executor = StandardTaskExecutor::new(
        vec![RuntimeState::new("rt-1", "test-model")],
        Arc::new(model),
        Arc::new(HookRegistry::new().with_hook(Arc::new(EchoHook))),
    );
    (
        SimpleEnv::new(Arc::new(executor), tracker.clone()),
        tracker,
    )
}

/// Engine wired to a scripted mock executor.
fn mock_env(executor: MockTaskExecutor) -> (SimpleEnv, Arc<RecordingTracker>, Arc<MockTaskExecutor>) {
    let tracker = Arc::new(RecordingTracker::new());
    let executor = Arc::new(executor);
    (
        SimpleEnv::new(executor.clone(), tracker.clone()),
        tracker,
        executor,
    )
}

fn attempt_starts(events: &[ActivityEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ActivityEvent::TaskAttemptStarted { .. }))
        .count()
}

#[tokio::test]
async fn test_raw_passthrough() {
    let (env, _tracker) = real_env(MockModelClient::returning("unused"));
    let chain = chain("passthrough", vec![terminal("t", TaskType::RawString)]);

    let run = env
        .exec(CancellationToken::new(), &chain, Value::from("hello"))
        .await
        .unwrap();

    assert_eq!(run.output, Value::from("hello"));
    assert_eq!(run.state.len(), 1);
    assert_eq!(run.state[0].task_id, "t");
    assert!(run.state[0].error.is_none());
}

#[tokio::test]
async fn test_branching_on_score() {
    let (env, tracker) = real_env(MockModelClient::returning("73"));

    let score = ChainTask::new("score", TaskType::PromptToScore).with_transition(
        TaskTransition::branches(vec![
            TransitionBranch::new(BranchOperator::Gt, "50", "high"),
            TransitionBranch::default_to("low"),
        ]),
    );
    let chain = chain(
        "score_chain",
        vec![
            score,
            terminal("high", TaskType::RawString),
            terminal("low", TaskType::RawString),
        ],
    );

    let run = env
        .exec(CancellationToken::new(), &chain, Value::from("rate this"))
        .await
        .unwrap();

    assert_eq!(run.output, Value::from("73"));
    assert_eq!(run.state.len(), 2);
    assert_eq!(run.state[1].task_id, "high");

    let routed_high = tracker.events().iter().any(|e| {
        matches!(e, ActivityEvent::NextTask { to_task, .. } if to_task == "high")
    });
    assert!(routed_high);
}

#[tokio::test]
async fn test_in_range_routing() {
    let (env, _tracker) = real_env(MockModelClient::returning("unused"));

    let classify = ChainTask::new("classify", TaskType::ParseNumber).with_transition(
        TaskTransition::branches(vec![
            TransitionBranch::new(BranchOperator::InRange, "0-10", "lo"),
            TransitionBranch::new(BranchOperator::InRange, "11-50", "mid"),
            TransitionBranch::default_to("hi"),
        ]),
    );
    let chain = chain(
        "range_chain",
        vec![
            classify,
            terminal("lo", TaskType::RawString),
            terminal("mid", TaskType::RawString),
            terminal("hi", TaskType::RawString),
        ],
    );

    let run = env
        .exec(CancellationToken::new(), &chain, Value::from("42"))
        .await
        .unwrap();

    assert_eq!(run.state[1].task_id, "mid");
    assert_eq!(run.output, Value::from("42"));
}

#[tokio::test]
async fn test_retry_then_recover() {
    let (env, tracker, executor) = mock_env(
        MockTaskExecutor::returning(Value::from("ok"), "ok")
            .with_error_sequence(vec![Some("transient"), Some("transient"), None]),
    );

    let mut task = terminal("flaky", TaskType::PromptToString);
    task.retry_on_failure = 2;
    let chain = chain("retry_chain", vec![task]);

    let run = env
        .exec(CancellationToken::new(), &chain, Value::from("go"))
        .await
        .unwrap();

    assert_eq!(run.output, Value::from("ok"));
    assert_eq!(executor.call_count(), 3);

    let events = tracker.events();
    assert_eq!(attempt_starts(&events), 3);
    let failures = events
        .iter()
        .filter(|e| matches!(e, ActivityEvent::TaskAttemptFailed { .. }))
        .count();
    assert_eq!(failures, 2);
    assert!(events
        .iter()
        .any(|e| matches!(e, ActivityEvent::ChainCompleted { .. })));
    assert_eq!(run.state.len(), 1);
}

#[tokio::test]
async fn test_retry_exhaustion_routes_to_on_failure() {
    let (env, tracker, _executor) = mock_env(
        MockTaskExecutor::returning(Value::from("recovered"), "recovered")
            .with_error_sequence(vec![Some("down"), Some("still down"), None]),
    );

    let mut flaky = ChainTask::new("flaky", TaskType::PromptToString)
        .with_transition(default_to(TERM_END));
    flaky.retry_on_failure = 1;
    flaky.transition.on_failure = "handler".to_string();

    let chain = chain(
        "failover_chain",
        vec![flaky, terminal("handler", TaskType::RawString)],
    );

    let run = env
        .exec(CancellationToken::new(), &chain, Value::from("go"))
        .await
        .unwrap();

    assert_eq!(run.output, Value::from("recovered"));

    // Two attempts on the failing task, one on the handler.
    let events = tracker.events();
    assert_eq!(attempt_starts(&events), 3);
    let error_transition = events.iter().any(|e| {
        matches!(
            e,
            ActivityEvent::NextTask {
                from_task,
                to_task,
                reason,
                ..
            } if from_task == "flaky"
                && to_task == "handler"
                && *reason == taskchain::services::tracker::TransitionReason::Error
        )
    });
    assert!(error_transition);

    // Both visits are captured, the failed one with its error.
    assert_eq!(run.state.len(), 2);
    assert!(run.state[0].error.is_some());
    assert!(run.state[1].error.is_none());
}

#[tokio::test]
async fn test_surfaced_error_after_retries_without_handler() {
    let (env, tracker, _executor) = mock_env(
        MockTaskExecutor::returning(Value::from("never"), "never")
            .with_error_sequence(vec![Some("boom"), Some("boom"), Some("boom")]),
    );

    let mut task = terminal("doomed", TaskType::PromptToString);
    task.retry_on_failure = 2;
    let chain = chain("doomed_chain", vec![task]);

    let err = env
        .exec(CancellationToken::new(), &chain, Value::from("go"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::TaskFailed { retries: 2, .. }
    ));
    assert_eq!(attempt_starts(&tracker.events()), 3);
}

#[tokio::test]
async fn test_timeout_counts_as_failed_attempt() {
    let (env, tracker, executor) = mock_env(
        MockTaskExecutor::returning(Value::from("late"), "late")
            .with_delay(Duration::from_millis(200)),
    );

    let mut task = terminal("slow", TaskType::PromptToString);
    task.timeout = "50ms".to_string();
    let chain = chain("slow_chain", vec![task]);

    let err = env
        .exec(CancellationToken::new(), &chain, Value::from("go"))
        .await
        .unwrap_err();

    assert_eq!(executor.call_count(), 1);
    assert_eq!(attempt_starts(&tracker.events()), 1);
    match err {
        EngineError::TaskFailed { task_id, reason, .. } => {
            assert_eq!(task_id, "slow");
            assert!(reason.contains("timed out"));
        }
        other => panic!("expected TaskFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_timeout_participates_in_retry() {
    let (env, tracker, executor) = mock_env(
        MockTaskExecutor::returning(Value::from("late"), "late")
            .with_delay(Duration::from_millis(80)),
    );

    let mut task = terminal("slowish", TaskType::PromptToString);
    task.timeout = "30ms".to_string();
    task.retry_on_failure = 1;
    let chain = chain("slowish_chain", vec![task]);

    let err = env
        .exec(CancellationToken::new(), &chain, Value::from("go"))
        .await
        .unwrap_err();

    // Each expiry consumed one attempt.
    assert_eq!(executor.call_count(), 2);
    assert_eq!(attempt_starts(&tracker.events()), 2);
    assert!(matches!(err, EngineError::TaskFailed { retries: 1, .. }));
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_attempt() {
    let (env, _tracker, _executor) = mock_env(
        MockTaskExecutor::returning(Value::from("late"), "late")
            .with_delay(Duration::from_secs(5)),
    );
    let chain = chain("cancel_chain", vec![terminal("t", TaskType::PromptToString)]);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let env = Arc::new(env);

    let handle = tokio::spawn(async move {
        env.exec(cancel, &chain, Value::from("go")).await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    trigger.cancel();

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
}

#[tokio::test]
async fn test_unknown_hook_fails_without_retrying() {
    let (env, tracker) = real_env(MockModelClient::returning("unused"));

    let mut task = terminal("call_out", TaskType::Hook);
    task.hook = Some(HookCall::new("not_registered"));
    task.retry_on_failure = 3;
    let chain = chain("hook_chain", vec![task]);

    let err = env
        .exec(CancellationToken::new(), &chain, Value::from("payload"))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::UnknownHook(name) if name == "not_registered"));
    // A configuration error burns no retries.
    assert_eq!(attempt_starts(&tracker.events()), 1);
}

#[tokio::test]
async fn test_hook_chain_passes_payload_through() {
    let (env, _tracker) = real_env(MockModelClient::returning("unused"));

    let first = ChainTask::new("first", TaskType::Hook)
        .with_hook(HookCall::new("echo"))
        .with_transition(default_to("second"));
    let second = ChainTask::new("second", TaskType::Hook)
        .with_hook(HookCall::new("echo"))
        .with_transition(default_to(TERM_END));
    let chain = chain("echo_chain", vec![first, second]);

    let run = env
        .exec(CancellationToken::new(), &chain, Value::from("payload"))
        .await
        .unwrap();

    assert_eq!(run.output, Value::from("payload"));
    assert_eq!(run.state.len(), 2);
}

#[tokio::test]
async fn test_template_and_print_use_the_scope() {
    let (env, tracker) = real_env(MockModelClient::returning("fine"));

    let mut ask = ChainTask::new("ask", TaskType::PromptToString)
        .with_template("Summarize: {{ .input }}")
        .with_transition(default_to(TERM_END));
    ask.print = "ask said {{ .previous_output }}".to_string();
    let chain = chain("template_chain", vec![ask]);

    let run = env
        .exec(CancellationToken::new(), &chain, Value::from("the text"))
        .await
        .unwrap();
    assert_eq!(run.output, Value::from("fine"));

    let printed = tracker.events().iter().any(|e| {
        matches!(e, ActivityEvent::TaskPrinted { message, .. } if message == "ask said fine")
    });
    assert!(printed);
}

#[tokio::test]
async fn test_no_matching_transition_is_fatal() {
    let (env, _tracker) = real_env(MockModelClient::returning("unused"));

    let task = ChainTask::new("t", TaskType::RawString).with_transition(
        TaskTransition::branches(vec![TransitionBranch::new(
            BranchOperator::Equals,
            "never",
            TERM_END,
        )]),
    );
    let chain = chain("stuck_chain", vec![task]);

    let err = env
        .exec(CancellationToken::new(), &chain, Value::from("something"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Transition(_)));
    assert!(err.to_string().contains("no matching transition"));
}

#[tokio::test]
async fn test_revisits_are_captured_per_visit() {
    let (env, _tracker) = real_env(MockModelClient::returning("unused"));

    // "start" routes back through "again", whose template rewrites the
    // string payload so the second pass terminates.
    let start = ChainTask::new("start", TaskType::RawString).with_transition(
        TaskTransition::branches(vec![
            TransitionBranch::new(BranchOperator::Equals, "1", "again"),
            TransitionBranch::default_to(TERM_END),
        ]),
    );
    let again = ChainTask::new("again", TaskType::RawString)
        .with_template("2")
        .with_transition(default_to("start"));
    let chain = chain("loop_chain", vec![start, again]);

    let run = env
        .exec(CancellationToken::new(), &chain, Value::from("1"))
        .await
        .unwrap();

    let visited: Vec<&str> = run.state.iter().map(|u| u.task_id.as_str()).collect();
    assert_eq!(visited, vec!["start", "again", "start"]);
    assert_eq!(run.output, Value::from("2"));
}
