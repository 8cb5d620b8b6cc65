use async_trait::async_trait;
use noteflow_context::{ContextDiscoveryService, FileSelector};
use noteflow_protocol::contracts::StructuringRequest;
use noteflow_synth::{NotesStore, Pipeline, PipelineError, StructuringCapability, SynthesisSession};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

struct ScriptedStructuring {
    replies: Mutex<Vec<String>>,
    requests: Mutex<Vec<StructuringRequest>>,
    fail: bool,
}

impl ScriptedStructuring {
    fn with_replies(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, idx: usize) -> StructuringRequest {
        self.requests.lock().unwrap()[idx].clone()
    }
}

#[async_trait]
impl StructuringCapability for ScriptedStructuring {
    async fn structure(&self, request: &StructuringRequest) -> anyhow::Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            anyhow::bail!("capability unavailable");
        }
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            anyhow::bail!("no scripted reply left");
        }
        Ok(replies.remove(0))
    }
}

struct ScriptedSelector {
    reply: String,
}

impl ScriptedSelector {
    fn empty() -> Arc<Self> {
        Arc::new(Self {
            reply: r#"{"explicit": [], "discovered": [], "reasoning": "nothing relevant"}"#
                .to_string(),
        })
    }

    fn returning(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
        })
    }
}

#[async_trait]
impl FileSelector for ScriptedSelector {
    async fn select(&self, _tree: &str, _raw_text: &str) -> anyhow::Result<String> {
        Ok(self.reply.clone())
    }
}

fn pipeline(
    root: &Path,
    structuring: Arc<dyn StructuringCapability>,
    selector: Arc<dyn FileSelector>,
) -> Pipeline {
    let store = NotesStore::new(root);
    let discovery = ContextDiscoveryService::new(selector, Some(store.cache_dir()));
    Pipeline::new(structuring, discovery, store)
}

const TWO_TASK_REPLY: &str = r#"Sure, structured below.
{"sections": [
    {"category": "Bugs", "priority": "high", "tasks": [
        {"text": "fix login bug", "title": "Fix login"}
    ]},
    {"category": "Features", "priority": "medium", "tasks": [
        {"text": "add dark mode", "title": "Dark mode"}
    ]}
], "warnings": []}"#;

const ONE_TASK_REPLY: &str = r#"{"sections": [
    {"category": "Refactors", "priority": "medium", "tasks": [
        {"text": "refactor token refresh", "title": "Token refresh",
         "depends_on": ["Fix login"]}
    ]}
], "warnings": ["deadline unclear"]}"#;

#[tokio::test]
async fn two_cycles_grow_the_collection_and_advance_the_baseline() {
    let temp = tempdir().unwrap();
    fs::create_dir_all(temp.path().join("src")).unwrap();
    fs::write(temp.path().join("src").join("auth.ts"), "token refresh\n").unwrap();

    let structuring = ScriptedStructuring::with_replies(&[TWO_TASK_REPLY, ONE_TASK_REPLY]);
    let selector = ScriptedSelector::returning(
        r#"{"explicit": ["src/auth.ts"], "discovered": [], "reasoning": "mentioned"}"#,
    );
    let pipe = pipeline(temp.path(), structuring.clone(), selector);
    let session = SynthesisSession::new(temp.path());

    // t0: two-line buffer.
    let t0_buffer = "fix login bug\nadd dark mode";
    let report = pipe.run_cycle(&session, t0_buffer, false).await.unwrap();
    assert_eq!(report.appended, 2);
    assert_eq!(report.total_tasks, 2);

    let store = NotesStore::new(temp.path());
    let notes = store.load_or_init().unwrap();
    assert_eq!(notes.last_formatted_raw, t0_buffer);
    assert_eq!(notes.tasks.len(), 2);

    // t1: one appended line mentioning a project file.
    let t1_buffer = "fix login bug\nadd dark mode\n@src/auth.ts refactor token refresh";
    let report = pipe.run_cycle(&session, t1_buffer, false).await.unwrap();
    assert_eq!(report.appended, 1);
    assert_eq!(report.total_tasks, 3);
    assert_eq!(report.warnings, vec!["deadline unclear"]);

    // Only the third line was sent as the delta.
    let second_request = structuring.request(1);
    assert_eq!(second_request.delta, "@src/auth.ts refactor token refresh");
    assert!(second_request.context.contains("src/auth.ts"));
    assert!(second_request.context.contains("token refresh"));

    let notes = store.load_or_init().unwrap();
    assert_eq!(notes.tasks.len(), 3);
    assert_eq!(notes.last_formatted_raw, t1_buffer);
    // The new task carries provenance and a resolved dependency.
    let new_task = &notes.tasks[2];
    assert_eq!(new_task.metadata.context_files[0].path, "src/auth.ts");
    assert_eq!(new_task.metadata.depends_on, vec![notes.tasks[0].id.clone()]);
}

#[tokio::test]
async fn malformed_selection_still_reaches_the_structuring_call() {
    let temp = tempdir().unwrap();
    let structuring = ScriptedStructuring::with_replies(&[TWO_TASK_REPLY]);
    let selector = ScriptedSelector::returning("totally not json {{{");
    let pipe = pipeline(temp.path(), structuring.clone(), selector);
    let session = SynthesisSession::new(temp.path());

    let report = pipe
        .run_cycle(&session, "fix login bug\nadd dark mode", false)
        .await
        .unwrap();

    assert_eq!(report.appended, 2);
    assert!(report.context_files.is_empty());
    // The structuring call went out with empty context.
    assert_eq!(structuring.calls(), 1);
    assert_eq!(structuring.request(0).context, "");
}

#[tokio::test]
async fn unchanged_buffer_is_a_no_op_without_a_structuring_call() {
    let temp = tempdir().unwrap();
    let structuring = ScriptedStructuring::with_replies(&[TWO_TASK_REPLY]);
    let pipe = pipeline(temp.path(), structuring.clone(), ScriptedSelector::empty());
    let session = SynthesisSession::new(temp.path());

    let buffer = "fix login bug\nadd dark mode";
    pipe.run_cycle(&session, buffer, false).await.unwrap();
    assert_eq!(structuring.calls(), 1);

    let err = pipe.run_cycle(&session, buffer, false).await.unwrap_err();
    assert!(matches!(err, PipelineError::NoChanges));
    // No second structuring call was made.
    assert_eq!(structuring.calls(), 1);
}

#[tokio::test]
async fn capability_failure_leaves_the_store_untouched() {
    let temp = tempdir().unwrap();
    let pipe = pipeline(
        temp.path(),
        ScriptedStructuring::failing(),
        ScriptedSelector::empty(),
    );
    let session = SynthesisSession::new(temp.path());

    let err = pipe
        .run_cycle(&session, "fix login bug", false)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Capability(_)));

    let notes = NotesStore::new(temp.path()).load_or_init().unwrap();
    assert!(notes.tasks.is_empty());
    assert_eq!(notes.last_formatted_raw, "");
}

#[tokio::test]
async fn reply_without_json_is_a_validation_error() {
    let temp = tempdir().unwrap();
    let structuring = ScriptedStructuring::with_replies(&["I could not structure that."]);
    let pipe = pipeline(temp.path(), structuring, ScriptedSelector::empty());
    let session = SynthesisSession::new(temp.path());

    let err = pipe
        .run_cycle(&session, "fix login bug", false)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));

    let notes = NotesStore::new(temp.path()).load_or_init().unwrap();
    assert!(notes.tasks.is_empty());
    assert_eq!(notes.last_formatted_raw, "");
}

#[tokio::test]
async fn cancelled_session_discards_the_result() {
    let temp = tempdir().unwrap();
    let structuring = ScriptedStructuring::with_replies(&[TWO_TASK_REPLY]);
    let pipe = pipeline(temp.path(), structuring.clone(), ScriptedSelector::empty());
    let session = SynthesisSession::new(temp.path());

    // The user switched projects while the calls were in flight.
    session.cancel();

    let err = pipe
        .run_cycle(&session, "fix login bug", false)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::StaleSession));
    // The capability was consulted, but nothing was written.
    assert_eq!(structuring.calls(), 1);
    let notes = NotesStore::new(temp.path()).load_or_init().unwrap();
    assert!(notes.tasks.is_empty());
    assert_eq!(notes.last_formatted_raw, "");
}

#[tokio::test]
async fn voice_flag_is_forwarded_to_the_capability() {
    let temp = tempdir().unwrap();
    let structuring = ScriptedStructuring::with_replies(&[TWO_TASK_REPLY]);
    let pipe = pipeline(temp.path(), structuring.clone(), ScriptedSelector::empty());
    let session = SynthesisSession::new(temp.path());

    pipe.run_cycle(&session, "um so fix the login thing", true)
        .await
        .unwrap();
    assert!(structuring.request(0).voice_input);
}
