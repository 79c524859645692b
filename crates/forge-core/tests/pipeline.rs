//! End-to-end controller behaviour against scripted collaborators

use forge_artifact::{Category, StageKind};
use forge_core::{FanOutFailure, ForgeConfig, GateOutcome, GateState, PipelineController};
use forge_model::{GenerationError, RetryPolicy};
use forge_stage::StageFailure;
use forge_test_utils::{
    chatty, files_json, requirement_json, stage_marker, PanickingBackend, ScriptedBackend, ScriptedGate,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn config(max_iterations: u32) -> ForgeConfig {
    ForgeConfig::default()
        .with_max_iterations(max_iterations)
        .with_retry_policy(RetryPolicy::immediate())
}

/// Requirement and code answers; fan-out routes are added per test
fn base_backend() -> ScriptedBackend {
    ScriptedBackend::new()
        .reply_when(stage_marker(StageKind::Requirements), chatty(&requirement_json("Calculator App")))
        .reply_when(
            stage_marker(StageKind::Code),
            files_json("Calculator App", &[("main", "print(eval_expression(input()))")]),
        )
}

fn with_fan_out(mut backend: ScriptedBackend) -> ScriptedBackend {
    for kind in StageKind::FAN_OUT {
        let file = format!("{kind}.md");
        backend = backend.reply_when(stage_marker(kind), files_json("Calculator App", &[(file.as_str(), "generated")]));
    }
    backend
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

#[tokio::test]
async fn calculator_is_accepted_on_second_iteration() {
    let backend = Arc::new(with_fan_out(base_backend()).repeat_last());
    let gate = Arc::new(ScriptedGate::new([55.0, 82.0]).with_failing_issue("missing input validation"));
    let controller = PipelineController::new(config(3), backend.clone(), gate.clone()).unwrap();

    let result = controller.run("build a calculator").await.unwrap();

    assert_eq!(result.requirement.name, "Calculator App");
    assert_eq!(result.outcome, GateOutcome::Accepted);
    assert_eq!(result.gated.state(), GateState::Accepted);
    assert_eq!(result.gated.iteration_index(), 1);
    assert_eq!(result.gated.history().len(), 2);
    assert!(!result.gated.history()[0].verdict.passes());
    assert_eq!(result.gated.history()[1].verdict.score(), 82.0);
    assert_eq!(gate.reviews(), 2);

    let code_prompts = backend.prompts_with(stage_marker(StageKind::Code));
    assert_eq!(code_prompts.len(), 2);
    assert!(!code_prompts[0].contains("missing input validation"));
    assert!(code_prompts[1].contains("missing input validation"));
    assert!(code_prompts[1].contains("Score: 55/100"));
    assert!(code_prompts[1].contains("Files in the previous attempt: main"));

    let code = result.code_artifact().unwrap();
    assert!(code.files().contains_key("main"));
    assert_eq!(result.fan_out.len(), StageKind::FAN_OUT.len());
    assert_eq!(result.fan_out_failures().count(), 0);
}

#[tokio::test]
async fn exhausted_stage_keeps_last_artifact_and_still_fans_out() {
    let backend = Arc::new(with_fan_out(base_backend()).repeat_last());
    let controller =
        PipelineController::new(config(2), backend, Arc::new(ScriptedGate::always_failing())).unwrap();

    let result = controller.run("build a calculator").await.unwrap();
    assert_eq!(result.outcome, GateOutcome::Exhausted);
    assert!(result.is_degraded());
    assert_eq!(result.code_artifact(), result.gated.history()[1].artifact());
    assert_eq!(result.fan_out_failures().count(), 0);
    assert!(result.projection().contains_key(&Category::Ui));
}

#[tokio::test]
async fn failed_requirement_structuring_aborts_the_project() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .reply_when(stage_marker(StageKind::Requirements), r#"{"project_name": "Project Name"}"#)
            .repeat_last(),
    );
    let controller = PipelineController::new(config(3), backend.clone(), Arc::new(ScriptedGate::new([90.0]))).unwrap();

    let err = controller.run("build a calculator").await.unwrap_err();
    assert!(matches!(
        err,
        forge_core::PipelineError::Requirements(StageFailure::ExtractionExhausted { attempts: 3, .. })
    ));
    assert!(backend.prompts_with(stage_marker(StageKind::Code)).is_empty());
}

#[tokio::test(start_paused = true)]
async fn fan_out_failure_is_isolated() {
    let backend = base_backend()
        .reply_after(
            stage_marker(StageKind::Tests),
            Duration::from_secs(30),
            files_json("Calculator App", &[("test_main.py", "assert True")]),
        )
        .fail_when(stage_marker(StageKind::Docs), GenerationError::Rejected("content policy".into()))
        .reply_when(stage_marker(StageKind::Deployment), files_json("Calculator App", &[("Dockerfile", "FROM python")]))
        .reply_when(stage_marker(StageKind::Ui), files_json("Calculator App", &[("index.html", "<html></html>")]))
        .repeat_last();
    let backend = Arc::new(backend);
    let controller =
        PipelineController::new(config(1), backend.clone(), Arc::new(ScriptedGate::new([90.0]))).unwrap();

    let result = controller.run("build a calculator").await.unwrap();

    let failures: Vec<_> = result.fan_out_failures().map(|(kind, _)| kind).collect();
    assert_eq!(failures, vec![StageKind::Docs]);
    assert!(matches!(
        result.fan_out[&StageKind::Docs],
        Err(FanOutFailure::Stage(StageFailure::ExtractionExhausted { .. }))
    ));
    assert!(result.artifact(StageKind::Tests).is_some());
    assert!(result.artifact(StageKind::Deployment).is_some());
    assert!(result.artifact(StageKind::Ui).is_some());
    assert_eq!(backend.prompts_with(stage_marker(StageKind::Docs)).len(), 3);

    let summary = result.summary();
    assert_eq!(summary.fan_out_failures.len(), 1);
    assert_eq!(summary.files_per_category[&Category::Tests], 1);
}

#[tokio::test]
async fn panicking_fan_out_task_keeps_sibling_results() {
    let inner = with_fan_out(base_backend()).repeat_last();
    let backend = Arc::new(PanickingBackend::new(inner, stage_marker(StageKind::Docs)));
    let controller =
        PipelineController::new(config(1), backend, Arc::new(ScriptedGate::new([90.0]))).unwrap();

    let result = controller.run("build a calculator").await.unwrap();

    assert_eq!(result.outcome, GateOutcome::Accepted);
    assert!(matches!(
        result.fan_out[&StageKind::Docs],
        Err(FanOutFailure::Aborted { stage: StageKind::Docs, .. })
    ));
    for kind in [StageKind::Tests, StageKind::Deployment, StageKind::Ui] {
        assert!(result.fan_out[&kind].is_ok(), "{kind}");
        assert!(result.artifact(kind).is_some(), "{kind}");
    }
    assert_eq!(result.fan_out.len(), 4);
    let failures: Vec<_> = result.fan_out_failures().map(|(kind, _)| kind).collect();
    assert_eq!(failures, vec![StageKind::Docs]);
}

#[tokio::test]
async fn fan_out_stages_see_the_accepted_code() {
    let backend = Arc::new(with_fan_out(base_backend()).repeat_last());
    let controller =
        PipelineController::new(config(1), backend.clone(), Arc::new(ScriptedGate::new([90.0]))).unwrap();
    controller.run("build a calculator").await.unwrap();

    for kind in StageKind::FAN_OUT {
        let prompts = backend.prompts_with(stage_marker(kind));
        assert_eq!(prompts.len(), 1, "{kind}");
        assert!(prompts[0].contains("--- main"), "{kind}");
    }
}

#[tokio::test]
async fn sessions_run_in_parallel_without_sharing_state() {
    let backend = Arc::new(with_fan_out(base_backend()).repeat_last());
    let controller = Arc::new(
        PipelineController::new(config(1), backend, Arc::new(ScriptedGate::new([90.0]))).unwrap(),
    );
    let (a, b) = tokio::join!(controller.run("first"), controller.run("second"));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.project_id, b.project_id);
    assert_eq!(a.gated.history().len(), 1);
    assert_eq!(b.gated.history().len(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn always_failing_gate_exhausts_after_exactly_n(n in 1u32..=6) {
        let backend = Arc::new(with_fan_out(base_backend()).repeat_last());
        let gate = Arc::new(ScriptedGate::always_failing());
        let controller = PipelineController::new(config(n), backend.clone(), gate.clone()).unwrap();

        let result = block_on(controller.run("build a calculator")).unwrap();
        prop_assert_eq!(result.outcome, GateOutcome::Exhausted);
        prop_assert_eq!(result.gated.history().len(), n as usize);
        prop_assert_eq!(result.gated.iteration_index() + 1, n);
        prop_assert_eq!(gate.reviews(), n as usize);
        prop_assert_eq!(backend.prompts_with(stage_marker(StageKind::Code)).len(), n as usize);
    }

    #[test]
    fn passing_gate_stops_at_first_pass(n in 1u32..=6, k in 0u32..6) {
        let k = k % n;
        let mut scores = vec![30.0; k as usize];
        scores.push(95.0);
        let gate = Arc::new(ScriptedGate::new(scores));
        let backend = Arc::new(with_fan_out(base_backend()).repeat_last());
        let controller = PipelineController::new(config(n), backend, gate.clone()).unwrap();

        let result = block_on(controller.run("build a calculator")).unwrap();
        prop_assert_eq!(result.outcome, GateOutcome::Accepted);
        prop_assert_eq!(result.gated.history().len(), k as usize + 1);
        prop_assert_eq!(result.gated.iteration_index(), k);
        prop_assert_eq!(gate.reviews(), k as usize + 1);
    }
}
