//! The sequential executor used when the strategy engine is off

use crate::helpers::*;
use streampipe::execution::RunOptions;

#[tokio::test]
async fn test_sequential_progress_and_output() {
    let pipeline = pipeline_from_yaml(
        r#"
name: "legacy"
description: "two steps, one stream"
steps:
  - name: echo
    run: echo hello
    output: text
  - name: upper
    run: tr a-z A-Z
    input: text
"#,
    );
    let outcome = run_with(&pipeline, RunOptions::default()).await;

    let summary = outcome.result.as_ref().unwrap();
    assert_eq!(summary.strategy, None);
    assert!(outcome.waves().is_empty());
    assert_eq!(outcome.started_steps(), vec!["echo", "upper"]);

    let log = outcome.log.contents();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.first(), Some(&"Executing pipeline: legacy"));
    assert!(lines.contains(&"Description: two steps, one stream"));
    assert!(lines.contains(&"[Step 1/2] echo"));
    assert!(lines.contains(&"[Step 2/2] upper"));
    assert!(lines.contains(&"Input: text"));
    assert!(lines.contains(&"HELLO"));
    assert_eq!(
        lines.last(),
        Some(&"Pipeline 'legacy' completed successfully")
    );
}

#[tokio::test]
async fn test_sequential_replays_stream_to_every_consumer() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_from_yaml(
        r#"
name: "replay"
steps:
  - name: source
    run: printf 'b\na\n'
    output: data
  - name: sorted
    run: sort
    input: data
  - name: counted
    run: wc -l | tr -d ' '
    input: data
"#,
    );
    let options = RunOptions {
        log_directory: Some(dir.path().to_path_buf()),
        ..RunOptions::default()
    };
    let outcome = run_with(&pipeline, options).await;

    assert!(outcome.result.is_ok());
    assert_eq!(read_log(dir.path(), "sorted.out"), "a\nb\n");
    assert_eq!(read_log(dir.path(), "counted.out"), "2\n");
    assert_status(dir.path(), 0);
}
