//! Scenario A: a linear chain runs as one native shell pipe

use crate::helpers::*;
use streampipe::execution::Strategy;

const ECHO_UPPER: &str = r#"
name: "echo-upper"
steps:
  - name: echo
    run: echo hello
    output: text
  - name: upper
    run: tr a-z A-Z
    input: text
"#;

#[tokio::test]
async fn test_linear_pipeline_matches_native_pipe() {
    let pipeline = pipeline_from_yaml(ECHO_UPPER);
    let outcome = run_with(&pipeline, strategy_options(None, None)).await;

    let summary = outcome.result.as_ref().unwrap();
    assert_eq!(summary.strategy, Some(Strategy::ShellPipe));
    assert_eq!(outcome.log.contents(), "HELLO\n");
    // The shell owns the whole chain, so no wave is ever scheduled
    assert!(outcome.waves().is_empty());
}

#[tokio::test]
async fn test_logged_shell_pipe_writes_per_step_files() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_from_yaml(ECHO_UPPER);
    let outcome = run_with(&pipeline, strategy_options(None, Some(dir.path()))).await;

    assert!(outcome.result.is_ok());
    assert_eq!(read_log(dir.path(), "echo.out"), "hello\n");
    assert_eq!(read_log(dir.path(), "upper.out"), "HELLO\n");
    assert_status(dir.path(), 0);
}

#[tokio::test]
async fn test_multiline_step_is_one_stage() {
    let pipeline = pipeline_from_yaml(
        r#"
name: "multi"
steps:
  - name: gen
    run: |
      echo one
      echo two
      echo three
    output: lines
  - name: count
    run: wc -l | tr -d ' '
    input: lines
"#,
    );
    let outcome = run_with(&pipeline, strategy_options(None, None)).await;

    assert!(outcome.result.is_ok());
    assert_eq!(outcome.log.contents(), "3\n");
}

#[tokio::test]
async fn test_same_output_from_both_strategies() {
    let pipeline = pipeline_from_yaml(ECHO_UPPER);
    let piped_dir = tempfile::tempdir().unwrap();
    let streamed_dir = tempfile::tempdir().unwrap();

    let piped = run_with(
        &pipeline,
        strategy_options(Some(Strategy::ShellPipe), Some(piped_dir.path())),
    )
    .await;
    let streamed = run_with(
        &pipeline,
        strategy_options(Some(Strategy::ConcurrentStream), Some(streamed_dir.path())),
    )
    .await;

    assert!(piped.result.is_ok());
    assert!(streamed.result.is_ok());
    for name in ["echo.out", "upper.out"] {
        assert_eq!(
            read_log(piped_dir.path(), name),
            read_log(streamed_dir.path(), name),
            "{}",
            name
        );
    }
    assert_eq!(read_log(streamed_dir.path(), "upper.out"), "HELLO\n");
}
