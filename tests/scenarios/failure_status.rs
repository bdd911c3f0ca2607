//! Scenario C: failing commands surface their exit status

use crate::helpers::*;
use streampipe::core::ExecutionCause;
use streampipe::execution::Strategy;
use streampipe::PipelineError;

#[tokio::test]
async fn test_false_reports_nonzero_exit() {
    let pipeline = pipeline_from_yaml(
        r#"
name: "fails"
steps:
  - name: fail
    run: "false"
"#,
    );
    let outcome = run_with(&pipeline, strategy_options(None, None)).await;

    match outcome.result {
        Err(PipelineError::Execution { step, cause }) => {
            assert_eq!(step, "fails");
            assert!(matches!(cause, ExecutionCause::Exit(code) if code != 0));
        }
        other => panic!("expected execution error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_exit_code_recorded_by_every_strategy() {
    let pipeline = pipeline_from_yaml(
        r#"
name: "exit42"
steps:
  - name: fail
    run: exit 42
"#,
    );

    for forced in [Some(Strategy::ShellPipe), Some(Strategy::ConcurrentStream)] {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run_with(&pipeline, strategy_options(forced, Some(dir.path()))).await;

        let err = outcome.result.unwrap_err();
        assert_eq!(err.exit_code(), Some(42), "strategy {:?}", forced);
        assert_status(dir.path(), 42);
    }
}

#[tokio::test]
async fn test_pipefail_keeps_early_failure_visible() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_from_yaml(
        r#"
name: "masked"
steps:
  - name: produce
    run: echo partial; exit 3
    output: data
  - name: consume
    run: cat
    input: data
"#,
    );
    let outcome = run_with(&pipeline, strategy_options(None, Some(dir.path()))).await;

    assert_eq!(outcome.result.unwrap_err().exit_code(), Some(3));
    assert_eq!(read_log(dir.path(), "consume.out"), "partial\n");
    assert_status(dir.path(), 3);
}

#[tokio::test]
async fn test_failed_wave_blocks_later_waves() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_from_yaml(
        r#"
name: "barrier"
steps:
  - name: late
    run: cat
    input: early
  - name: early
    run: echo data; exit 9
    output: early
"#,
    );
    let outcome = run_with(&pipeline, strategy_options(None, Some(dir.path()))).await;

    assert_eq!(outcome.result.as_ref().unwrap_err().exit_code(), Some(9));
    assert_eq!(outcome.waves(), vec![vec!["early"]]);
    assert!(!outcome.started_steps().contains(&"late".to_string()));
    assert_status(dir.path(), 9);
}
