//! Scenarios D and E: structural problems are caught before anything runs

use crate::helpers::*;
use streampipe::core::config::PipelineConfig;
use streampipe::execution::RunOptions;
use streampipe::{PipelineError, ValidationError};

#[tokio::test]
async fn test_empty_pipeline_rejected_by_every_executor() {
    let pipeline = PipelineConfig::from_yaml("name: empty\nsteps: []\n")
        .unwrap()
        .to_pipeline();

    for options in [RunOptions::default(), strategy_options(None, None)] {
        let outcome = run_with(&pipeline, options).await;
        assert!(matches!(
            outcome.result,
            Err(PipelineError::Validation(ValidationError::EmptyPipeline(_)))
        ));
        assert!(outcome.started_steps().is_empty());
        assert_eq!(outcome.log.contents(), "");
    }
}

#[tokio::test]
async fn test_dangling_input_names_step_and_stream() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_from_yaml(
        r#"
name: "dangling"
steps:
  - name: produce
    run: echo hi
    output: text
  - name: consume
    run: cat
    input: nowhere
"#,
    );
    let outcome = run_with(&pipeline, strategy_options(None, Some(dir.path()))).await;

    let err = outcome.result.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("consume"), "{}", message);
    assert!(message.contains("nowhere"), "{}", message);

    // Nothing ran, so nothing was logged
    assert!(!dir.path().join("produce.out").exists());
    assert!(!dir.path().join("pipeline.status").exists());
}

#[tokio::test]
async fn test_duplicate_step_names_rejected() {
    let pipeline = pipeline_from_yaml(
        r#"
name: "dupes"
steps:
  - name: same
    run: echo one
  - name: same
    run: echo two
"#,
    );
    let outcome = run_with(&pipeline, strategy_options(None, None)).await;

    assert!(matches!(
        outcome.result,
        Err(PipelineError::Validation(ValidationError::DuplicateStep(_)))
    ));
}
