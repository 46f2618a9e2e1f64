//! Scripted producer that replays canned fragments.

use std::time::Duration;

use async_trait::async_trait;
use ledgerflow_config::Action;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{FragmentStream, ProducerError, StreamingTaskProducer, TaskRequest};

/// Fragments and failure behaviour for one action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionScript {
  pub fragments: Vec<String>,
  /// Yield an error instead of the fragment at this index.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub fail_after: Option<usize>,
  pub fail_message: String,
  /// Refuse to start the stream at all.
  pub unavailable: bool,
}

impl ActionScript {
  pub fn fragments<I, S>(fragments: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      fragments: fragments.into_iter().map(Into::into).collect(),
      ..Self::default()
    }
  }

  /// Break the stream at `index` with the given message.
  pub fn failing_at(mut self, index: usize, message: impl Into<String>) -> Self {
    self.fail_after = Some(index);
    self.fail_message = message.into();
    self
  }
}

/// A full script, one entry per content-producing action.
///
/// ```json
/// {
///   "fragment_delay_ms": 40,
///   "fetch_data": { "fragments": ["| Account | Balance |\n", "| Cash | 1200 |\n"] },
///   "analyze": { "fragments": ["Cash is stable."], "fail_after": 1, "fail_message": "model overloaded" },
///   "compose": { "fragments": ["# Memo\n", "All good."] }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Script {
  pub fetch_data: ActionScript,
  pub analyze: ActionScript,
  pub compose: ActionScript,
  /// Delay before each fragment is yielded.
  pub fragment_delay_ms: u64,
}

impl Script {
  pub fn for_action(&self, action: Action) -> Option<&ActionScript> {
    match action {
      Action::FetchData => Some(&self.fetch_data),
      Action::Analyze => Some(&self.analyze),
      Action::Compose => Some(&self.compose),
      Action::Navigate | Action::Persist => None,
    }
  }

  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }

  /// Canned content for a small trial balance review.
  pub fn demo() -> Self {
    Self {
      fetch_data: ActionScript::fragments([
        "| Account | Q3 | Q4 |\n",
        "|---|---:|---:|\n",
        "| Cash | 182,400 | 141,950 |\n",
        "| Accounts receivable | 96,300 | 131,775 |\n",
        "| Inventory | 54,120 | 55,010 |\n",
        "| Accounts payable | (71,880) | (69,420) |\n",
        "| Revenue | 412,900 | 438,600 |\n",
      ]),
      analyze: ActionScript::fragments([
        "## Observations\n",
        "- Receivables grew 36.8% quarter over quarter while revenue grew 6.2%.\n",
        "- Cash declined 22.2%, consistent with slower collections.\n",
        "- Inventory and payables are flat within normal variance.\n",
        "## Risk\n",
        "Days sales outstanding is trending up; review the aging schedule.\n",
      ]),
      compose: ActionScript::fragments([
        "# Memo: Q4 Balance Review\n\n",
        "**To:** Engagement partner\n\n",
        "Receivables outpaced revenue by a wide margin this quarter, ",
        "which drove the decline in cash. ",
        "We recommend confirming the ten largest open balances ",
        "and reviewing credit terms granted after October 1.\n",
      ]),
      fragment_delay_ms: 40,
    }
  }
}

/// Producer that replays a [`Script`].
///
/// Every request is recorded and can be inspected with
/// [`ScriptedProducer::requests`].
pub struct ScriptedProducer {
  script: Script,
  requests: Mutex<Vec<TaskRequest>>,
}

impl ScriptedProducer {
  pub fn new(script: Script) -> Self {
    Self {
      script,
      requests: Mutex::new(Vec::new()),
    }
  }

  /// Requests received so far, in order.
  pub async fn requests(&self) -> Vec<TaskRequest> {
    self.requests.lock().await.clone()
  }

  /// Number of requests received for one action.
  pub async fn calls(&self, action: Action) -> usize {
    self
      .requests
      .lock()
      .await
      .iter()
      .filter(|r| r.action == action)
      .count()
  }
}

/// Replay position inside one stream.
struct Replay {
  fragments: Vec<String>,
  next: usize,
  fail_after: Option<usize>,
  fail_message: String,
  delay: Duration,
  cancel: CancellationToken,
  finished: bool,
}

#[async_trait]
impl StreamingTaskProducer for ScriptedProducer {
  async fn stream(
    &self,
    request: TaskRequest,
    cancel: CancellationToken,
  ) -> Result<FragmentStream, ProducerError> {
    let action = request.action;
    debug!(action = %action, context_len = request.context.len(), "scripted stream requested");
    self.requests.lock().await.push(request);

    let script = self
      .script
      .for_action(action)
      .ok_or(ProducerError::Unsupported { action })?;

    if script.unavailable {
      return Err(ProducerError::unavailable(script.fail_message.clone()));
    }

    let replay = Replay {
      fragments: script.fragments.clone(),
      next: 0,
      fail_after: script.fail_after,
      fail_message: script.fail_message.clone(),
      delay: Duration::from_millis(self.script.fragment_delay_ms),
      cancel,
      finished: false,
    };

    let stream = futures::stream::unfold(replay, |mut replay| async move {
      if replay.finished {
        return None;
      }

      if !replay.delay.is_zero() {
        tokio::select! {
          _ = replay.cancel.cancelled() => return None,
          _ = tokio::time::sleep(replay.delay) => {}
        }
      }

      // Nobody is listening anymore.
      if replay.cancel.is_cancelled() {
        return None;
      }

      if replay.fail_after == Some(replay.next) {
        replay.finished = true;
        let err = ProducerError::stream(replay.fail_message.clone());
        return Some((Err(err), replay));
      }

      let fragment = replay.fragments.get(replay.next).cloned()?;
      replay.next += 1;
      Some((Ok(fragment), replay))
    });

    Ok(Box::pin(stream))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures::StreamExt;

  fn request(action: Action) -> TaskRequest {
    TaskRequest::new(action, Some("doc-1".to_string()), "")
  }

  async fn collect(stream: FragmentStream) -> Vec<Result<String, ProducerError>> {
    stream.collect().await
  }

  #[tokio::test]
  async fn test_replays_fragments_in_order() {
    let producer = ScriptedProducer::new(Script {
      fetch_data: ActionScript::fragments(["a", "b", "c"]),
      ..Script::default()
    });

    let stream = producer
      .stream(request(Action::FetchData), CancellationToken::new())
      .await
      .unwrap();
    let items = collect(stream).await;

    assert_eq!(
      items,
      vec![Ok("a".to_string()), Ok("b".to_string()), Ok("c".to_string())]
    );
    assert_eq!(producer.calls(Action::FetchData).await, 1);
  }

  #[tokio::test]
  async fn test_fails_at_index_and_stops() {
    let producer = ScriptedProducer::new(Script {
      analyze: ActionScript::fragments(["one", "two", "three"]).failing_at(1, "model overloaded"),
      ..Script::default()
    });

    let stream = producer
      .stream(request(Action::Analyze), CancellationToken::new())
      .await
      .unwrap();
    let items = collect(stream).await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0], Ok("one".to_string()));
    assert_eq!(items[1], Err(ProducerError::stream("model overloaded")));
  }

  #[tokio::test]
  async fn test_unavailable_refuses_to_start() {
    let producer = ScriptedProducer::new(Script {
      compose: ActionScript {
        unavailable: true,
        fail_message: "quota exceeded".to_string(),
        ..ActionScript::default()
      },
      ..Script::default()
    });

    let result = producer
      .stream(request(Action::Compose), CancellationToken::new())
      .await;
    assert!(matches!(result, Err(ProducerError::Unavailable { .. })));
    // The attempt is still recorded
    assert_eq!(producer.calls(Action::Compose).await, 1);
  }

  #[tokio::test]
  async fn test_non_content_action_is_unsupported() {
    let producer = ScriptedProducer::new(Script::demo());
    let result = producer
      .stream(request(Action::Persist), CancellationToken::new())
      .await;
    assert!(matches!(
      result,
      Err(ProducerError::Unsupported {
        action: Action::Persist
      })
    ));
  }

  #[tokio::test]
  async fn test_cancelled_stream_ends_early() {
    let producer = ScriptedProducer::new(Script {
      fetch_data: ActionScript::fragments(["a", "b", "c"]),
      fragment_delay_ms: 10,
      ..Script::default()
    });

    let cancel = CancellationToken::new();
    let mut stream = producer
      .stream(request(Action::FetchData), cancel.clone())
      .await
      .unwrap();

    assert_eq!(stream.next().await, Some(Ok("a".to_string())));
    cancel.cancel();
    assert_eq!(stream.next().await, None);
  }

  #[test]
  fn test_script_from_json() {
    let script = Script::from_json(
      r#"{
        "fragment_delay_ms": 5,
        "analyze": { "fragments": ["x"], "fail_after": 0, "fail_message": "boom" }
      }"#,
    )
    .unwrap();
    assert_eq!(script.fragment_delay_ms, 5);
    assert_eq!(script.analyze.fail_after, Some(0));
    assert!(script.fetch_data.fragments.is_empty());
  }

  #[test]
  fn test_demo_script_has_content_for_every_stream() {
    let script = Script::demo();
    for action in [Action::FetchData, Action::Analyze, Action::Compose] {
      let entry = script.for_action(action).unwrap();
      assert!(!entry.fragments.is_empty(), "no fragments for {}", action);
    }
  }
}
