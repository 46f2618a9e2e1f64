//! End to end runs of the audit report pipeline.

mod common;

use std::sync::Arc;

use common::{GatedProducer, Harness, audit_def, wait_until};
use ledgerflow_artifact::{ArtifactSink, InMemorySink, WORD_MIME_TYPE};
use ledgerflow_config::Action;
use ledgerflow_pipeline::{ERROR_MARKER, StepOutcome, StepStatus, TickOutcome};
use ledgerflow_producer::{ActionScript, Script, ScriptedProducer};

fn demo_script() -> Script {
  Script {
    fragment_delay_ms: 0,
    ..Script::demo()
  }
}

#[tokio::test]
async fn test_full_run_saves_report_to_target() {
  let producer = Arc::new(ScriptedProducer::new(demo_script()));
  let sink = Arc::new(InMemorySink::new(["doc-0", "doc-1"]));
  let (session, driver) = Harness::new(audit_def("doc-1"), producer.clone(), sink.clone()).build();

  let summary = driver.run_to_completion().await.unwrap();

  assert_eq!(summary.outcome, TickOutcome::Complete);
  assert_eq!(summary.steps_executed, 5);
  assert!(summary.snapshot.complete);
  assert_eq!(summary.snapshot.cursor, 5);
  for step in &summary.snapshot.steps {
    assert_eq!(step.status, StepStatus::Done);
    assert_eq!(step.outcome, Some(StepOutcome::Completed));
  }

  let memory = &summary.snapshot.memory;
  assert!(memory.excel_data().is_some_and(|d| d.contains("Accounts receivable")));
  assert!(memory.analysis().is_some_and(|a| a.contains("## Observations")));

  assert_eq!(sink.append_calls().await, 1);
  assert!(sink.list("doc-0").await.unwrap().is_empty());
  let saved = sink.list("doc-1").await.unwrap();
  assert_eq!(saved.len(), 1);
  assert_eq!(saved[0].mime_type, WORD_MIME_TYPE);
  assert_eq!(saved[0].name, "Financial_Analysis_Report.docx");

  let compose = summary.snapshot.steps[3].content_preview.clone().unwrap();
  assert_eq!(saved[0].decode_content().unwrap(), compose);
  assert_eq!(saved[0].summary, "Memo: Q4 Balance Review");

  let persist_preview = summary.snapshot.steps[4].content_preview.clone().unwrap();
  assert!(persist_preview.starts_with("Saved Financial_Analysis_Report.docx"));
  assert!(persist_preview.ends_with("to doc-1"));

  // Nothing left to do
  assert_eq!(driver.tick().await.unwrap(), TickOutcome::Complete);
  assert!(session.is_mounted());
}

#[tokio::test]
async fn test_analyze_failure_is_rendered_inline_and_run_continues() {
  let producer = Arc::new(ScriptedProducer::new(Script {
    analyze: ActionScript::fragments(["Receivables grew.", "never sent"])
      .failing_at(1, "model overloaded"),
    ..demo_script()
  }));
  let sink = Arc::new(InMemorySink::new(["doc-1"]));
  let (_session, driver) = Harness::new(audit_def("doc-1"), producer.clone(), sink.clone()).build();

  let summary = driver.run_to_completion().await.unwrap();
  assert_eq!(summary.outcome, TickOutcome::Complete);

  let analyze = &summary.snapshot.steps[2];
  assert_eq!(analyze.status, StepStatus::Done);
  assert!(matches!(
    analyze.outcome,
    Some(StepOutcome::Recovered { ref error }) if error.contains("model overloaded")
  ));
  let preview = analyze.content_preview.clone().unwrap();
  assert!(preview.starts_with("Receivables grew."));
  assert!(preview.contains(ERROR_MARKER));

  // The partial analysis, marker included, is what compose works from
  let analysis = summary.snapshot.memory.analysis().unwrap().to_string();
  assert_eq!(analysis, preview);
  assert_eq!(producer.calls(Action::Compose).await, 1);
  let compose_request = producer
    .requests()
    .await
    .into_iter()
    .find(|r| r.action == Action::Compose)
    .unwrap();
  assert_eq!(compose_request.context, analysis);

  assert_eq!(sink.list("doc-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_detach_mid_stream_abandons_the_step() {
  let (producer, feed) = GatedProducer::new(Action::FetchData);
  let sink = Arc::new(InMemorySink::new(["doc-1"]));
  let (session, driver) = Harness::new(audit_def("doc-1"), producer.clone(), sink.clone()).build();

  let run = tokio::spawn(async move { driver.run_to_completion().await });

  feed.send(Ok("| Account |".to_string())).unwrap();
  feed.send(Ok(" Cash |".to_string())).unwrap();
  wait_until(&session, |p| {
    p.steps()[1].content_preview.as_deref() == Some("| Account | Cash |")
  })
  .await;

  session.detach().await;
  // Fragments after teardown go nowhere
  let _ = feed.send(Ok(" late |".to_string()));

  let summary = run.await.unwrap().unwrap();
  assert_eq!(summary.outcome, TickOutcome::Detached);
  assert_eq!(summary.steps_executed, 1);

  let snapshot = summary.snapshot;
  assert_eq!(snapshot.memory.excel_data(), None);
  assert_eq!(snapshot.cursor, 1);
  assert_eq!(
    snapshot.steps[1].content_preview.as_deref(),
    Some("| Account | Cash |")
  );
  for step in &snapshot.steps[2..] {
    assert_eq!(step.status, StepStatus::Pending);
  }

  assert_eq!(producer.requests().await.len(), 1);
  assert_eq!(sink.append_calls().await, 0);
}

#[tokio::test]
async fn test_concurrent_tick_does_not_start_a_second_stream() {
  let (producer, feed) = GatedProducer::new(Action::FetchData);
  let sink = Arc::new(InMemorySink::new(["doc-1"]));
  let (session, driver) = Harness::new(audit_def("doc-1"), producer.clone(), sink).build();

  assert_eq!(driver.tick().await.unwrap(), TickOutcome::Advanced { index: 0 });

  let first = {
    let driver = driver.clone();
    tokio::spawn(async move { driver.tick().await })
  };
  wait_until(&session, |p| p.steps()[1].status == StepStatus::Running).await;

  let second = driver.tick().await.unwrap();
  assert!(matches!(second, TickOutcome::Idle | TickOutcome::Busy));
  assert!(session.guard().is_busy());

  feed.send(Ok("| Cash | 100 |".to_string())).unwrap();
  drop(feed);

  assert_eq!(
    first.await.unwrap().unwrap(),
    TickOutcome::Advanced { index: 1 }
  );
  assert_eq!(producer.gated_calls(), 1);
  assert!(!session.guard().is_busy());
  assert_eq!(session.read(|p| p.running_count()).await, 0);
}

#[tokio::test]
async fn test_unknown_target_falls_back_to_first_container() {
  let producer = Arc::new(ScriptedProducer::new(demo_script()));
  let sink = Arc::new(InMemorySink::new(["doc-a", "doc-b"]));
  let (_session, driver) = Harness::new(audit_def("doc-9"), producer, sink.clone()).build();

  let summary = driver.run_to_completion().await.unwrap();

  assert_eq!(summary.outcome, TickOutcome::Complete);
  assert_eq!(sink.list("doc-a").await.unwrap().len(), 1);
  assert!(sink.list("doc-b").await.unwrap().is_empty());
  assert!(
    summary.snapshot.steps[4]
      .content_preview
      .as_deref()
      .is_some_and(|p| p.ends_with("to doc-a"))
  );
}
