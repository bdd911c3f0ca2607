//! Scenario B: one stream read by two consumers

use crate::helpers::*;
use streampipe::execution::Strategy;
use streampipe::PipelineError;

const FAN_OUT: &str = r#"
name: "fan-out"
steps:
  - name: source
    run: seq 1 5
    output: data
  - name: branch1
    run: head -n 1
    input: data
  - name: branch2
    run: tail -n 1
    input: data
"#;

#[tokio::test]
async fn test_shell_pipe_rejects_fan_out() {
    let pipeline = pipeline_from_yaml(FAN_OUT);
    let outcome = run_with(&pipeline, strategy_options(Some(Strategy::ShellPipe), None)).await;

    assert!(matches!(
        outcome.result,
        Err(PipelineError::NonLinearPipeline(_))
    ));
    assert!(outcome.started_steps().is_empty());
}

#[tokio::test]
async fn test_concurrent_accepts_fan_out_in_one_wave() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_from_yaml(FAN_OUT);
    let outcome = run_with(&pipeline, strategy_options(None, Some(dir.path()))).await;

    let summary = outcome.result.as_ref().unwrap();
    assert_eq!(summary.strategy, Some(Strategy::ConcurrentStream));
    assert_eq!(outcome.waves(), vec![vec!["source", "branch1", "branch2"]]);

    assert_eq!(read_log(dir.path(), "branch1.out"), "1\n");
    assert_eq!(read_log(dir.path(), "branch2.out"), "5\n");
    assert_eq!(read_log(dir.path(), "source.out"), "1\n2\n3\n4\n5\n");
    assert_status(dir.path(), 0);
}

#[tokio::test]
async fn test_progress_signal_routes_linear_chain_to_waves() {
    let dir = tempfile::tempdir().unwrap();
    let archive_src = dir.path().join("src");
    std::fs::create_dir(&archive_src).unwrap();
    std::fs::write(archive_src.join("file.txt"), "payload").unwrap();

    let yaml = format!(
        r#"
name: "archive"
steps:
  - name: pack
    run: tar -C '{}' -cf - file.txt
    output: archive
  - name: list
    run: tar -tf -
    input: archive
"#,
        archive_src.display()
    );
    let pipeline = pipeline_from_yaml(&yaml);
    let outcome = run_with(&pipeline, strategy_options(None, None)).await;

    let summary = outcome.result.as_ref().unwrap();
    assert_eq!(summary.strategy, Some(Strategy::ConcurrentStream));
    assert_eq!(outcome.waves(), vec![vec!["pack", "list"]]);
    assert!(outcome.log.contents().contains("file.txt\n"));
}
