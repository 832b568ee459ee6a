//! Client session state and the controller driving it
//!
//! Each action owns its own `loading`/`error` slot, so a tokenize and a
//! translate may be in flight together without clobbering each other.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::core::models::{TokenizationResult, TranslationResult};
use crate::session::backend::ProcessorBackend;

/// Message shown when an action is triggered with blank input
pub const EMPTY_INPUT: &str = "Please enter some Chinese text";

/// User-triggered actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Tokenize,
    Translate,
}

impl ActionKind {
    /// Banner shown when the action fails
    pub fn failure_message(self) -> &'static str {
        match self {
            ActionKind::Tokenize => "Failed to tokenize text. Please try again.",
            ActionKind::Translate => "Failed to translate text. Please try again.",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Tokenize => write!(f, "tokenize"),
            ActionKind::Translate => write!(f, "translate"),
        }
    }
}

/// Per-action state slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionState {
    pub loading: bool,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// How an action ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Input was blank, no request issued
    Skipped,
    /// Same action already in flight, no request issued
    Busy,
    Succeeded,
    Failed,
}

/// In-memory client session
#[derive(Debug, Clone, Default)]
pub struct ClientSession {
    pub input_text: String,
    tokenize: ActionState,
    translate: ActionState,
    pub tokenization_result: Option<TokenizationResult>,
    pub translation_result: Option<TranslationResult>,
}

impl ClientSession {
    pub fn action(&self, kind: ActionKind) -> &ActionState {
        match kind {
            ActionKind::Tokenize => &self.tokenize,
            ActionKind::Translate => &self.translate,
        }
    }

    fn action_mut(&mut self, kind: ActionKind) -> &mut ActionState {
        match kind {
            ActionKind::Tokenize => &mut self.tokenize,
            ActionKind::Translate => &mut self.translate,
        }
    }

    /// Whether any action is in flight
    pub fn is_busy(&self) -> bool {
        self.tokenize.loading || self.translate.loading
    }

    /// Error banners currently shown, one per failed action
    pub fn errors(&self) -> Vec<(ActionKind, &str)> {
        [ActionKind::Tokenize, ActionKind::Translate]
            .into_iter()
            .filter_map(|kind| {
                self.action(kind)
                    .error_message
                    .as_deref()
                    .map(|message| (kind, message))
            })
            .collect()
    }

    fn finish(&mut self, kind: ActionKind, error: Option<String>) {
        let slot = self.action_mut(kind);
        slot.error_message = error;
        slot.completed_at = Some(Utc::now());
    }
}

fn lock(session: &Mutex<ClientSession>) -> MutexGuard<'_, ClientSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears an action's loading flag when dropped, whatever the exit path
struct LoadingGuard {
    session: Arc<Mutex<ClientSession>>,
    kind: ActionKind,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        lock(&self.session).action_mut(self.kind).loading = false;
        debug!("{} finished", self.kind);
    }
}

/// Drives a [`ClientSession`] against a [`ProcessorBackend`]
#[derive(Clone)]
pub struct SessionController {
    backend: Arc<dyn ProcessorBackend>,
    session: Arc<Mutex<ClientSession>>,
}

impl SessionController {
    pub fn new(backend: Arc<dyn ProcessorBackend>) -> Self {
        Self {
            backend,
            session: Arc::new(Mutex::new(ClientSession::default())),
        }
    }

    pub fn set_input(&self, text: impl Into<String>) {
        lock(&self.session).input_text = text.into();
    }

    /// Copy of the current session state
    pub fn snapshot(&self) -> ClientSession {
        lock(&self.session).clone()
    }

    /// Guard the input and mark the action as loading
    fn begin(&self, kind: ActionKind) -> Result<(String, LoadingGuard), ActionOutcome> {
        let mut session = lock(&self.session);

        if session.action(kind).loading {
            debug!("{} already in flight", kind);
            return Err(ActionOutcome::Busy);
        }

        if session.input_text.trim().is_empty() {
            session.action_mut(kind).error_message = Some(EMPTY_INPUT.to_string());
            return Err(ActionOutcome::Skipped);
        }

        let slot = session.action_mut(kind);
        slot.loading = true;
        slot.error_message = None;
        debug!("{} started", kind);

        let guard = LoadingGuard {
            session: Arc::clone(&self.session),
            kind,
        };
        Ok((session.input_text.clone(), guard))
    }

    /// Run the tokenize action once
    pub async fn tokenize(&self) -> ActionOutcome {
        let kind = ActionKind::Tokenize;
        let (text, _loading) = match self.begin(kind) {
            Ok(started) => started,
            Err(outcome) => return outcome,
        };

        let outcome = self.backend.tokenize(&text).await;

        let mut session = lock(&self.session);
        match outcome {
            Ok(result) => {
                session.tokenization_result = Some(result);
                session.finish(kind, None);
                ActionOutcome::Succeeded
            }
            Err(e) => {
                warn!("{} failed: {}", kind, e);
                session.tokenization_result = None;
                session.finish(kind, Some(kind.failure_message().to_string()));
                ActionOutcome::Failed
            }
        }
    }

    /// Run the translate action once
    pub async fn translate(&self) -> ActionOutcome {
        let kind = ActionKind::Translate;
        let (text, _loading) = match self.begin(kind) {
            Ok(started) => started,
            Err(outcome) => return outcome,
        };

        let outcome = self.backend.translate(&text).await;

        let mut session = lock(&self.session);
        match outcome {
            Ok(result) => {
                session.translation_result = Some(result);
                session.finish(kind, None);
                ActionOutcome::Succeeded
            }
            Err(e) => {
                warn!("{} failed: {}", kind, e);
                session.translation_result = None;
                session.finish(kind, Some(kind.failure_message().to_string()));
                ActionOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{TokenizationMode, TokenizationOutput};
    use crate::session::backend::BackendError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    type Reply<T> = Result<T, BackendError>;

    /// Backend whose answers are released by the test
    #[derive(Default)]
    struct ScriptedBackend {
        calls: AtomicUsize,
        tokenize_reply: tokio::sync::Mutex<Option<oneshot::Receiver<Reply<TokenizationResult>>>>,
        translate_reply: tokio::sync::Mutex<Option<oneshot::Receiver<Reply<TranslationResult>>>>,
    }

    impl ScriptedBackend {
        async fn script_tokenize(&self) -> oneshot::Sender<Reply<TokenizationResult>> {
            let (tx, rx) = oneshot::channel();
            *self.tokenize_reply.lock().await = Some(rx);
            tx
        }

        async fn script_translate(&self) -> oneshot::Sender<Reply<TranslationResult>> {
            let (tx, rx) = oneshot::channel();
            *self.translate_reply.lock().await = Some(rx);
            tx
        }
    }

    #[async_trait]
    impl ProcessorBackend for ScriptedBackend {
        async fn tokenize(&self, _text: &str) -> Reply<TokenizationResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let rx = self.tokenize_reply.lock().await.take().expect("tokenize not scripted");
            rx.await.expect("tokenize reply dropped")
        }

        async fn translate(&self, _text: &str) -> Reply<TranslationResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let rx = self.translate_reply.lock().await.take().expect("translate not scripted");
            rx.await.expect("translate reply dropped")
        }
    }

    fn tokens(text: &str) -> TokenizationResult {
        TokenizationResult {
            output: TokenizationOutput::Tokens {
                tokens: vec![text.to_string()],
                ids: vec![json!(1.0)],
            },
            mode: TokenizationMode::SimilarityScores,
            model: "m".to_string(),
            task: "sentence-similarity".to_string(),
            input: text.to_string(),
            success: true,
        }
    }

    fn hello() -> TranslationResult {
        TranslationResult {
            translation_text: "Hello".to_string(),
        }
    }

    fn setup(input: &str) -> (Arc<ScriptedBackend>, SessionController) {
        let backend = Arc::new(ScriptedBackend::default());
        let controller = SessionController::new(backend.clone());
        controller.set_input(input);
        (backend, controller)
    }

    async fn wait_until_loading(controller: &SessionController, kind: ActionKind) {
        while !controller.snapshot().action(kind).loading {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_blank_input_issues_no_request() {
        let (backend, controller) = setup("  \n ");

        assert_eq!(controller.translate().await, ActionOutcome::Skipped);
        assert_eq!(controller.tokenize().await, ActionOutcome::Skipped);

        let session = controller.snapshot();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        for kind in [ActionKind::Tokenize, ActionKind::Translate] {
            assert!(!session.action(kind).loading);
            assert_eq!(session.action(kind).error_message.as_deref(), Some(EMPTY_INPUT));
        }
    }

    #[tokio::test]
    async fn test_success_stores_result_and_clears_loading() {
        let (backend, controller) = setup("你好");
        let reply = backend.script_translate().await;

        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.translate().await }
        });
        wait_until_loading(&controller, ActionKind::Translate).await;
        assert!(controller.snapshot().is_busy());

        reply.send(Ok(hello())).unwrap();
        assert_eq!(task.await.unwrap(), ActionOutcome::Succeeded);

        let session = controller.snapshot();
        assert_eq!(session.translation_result, Some(hello()));
        assert!(!session.is_busy());
        assert!(session.errors().is_empty());
        assert!(session.action(ActionKind::Translate).completed_at.is_some());
    }

    #[tokio::test]
    async fn test_failure_sets_error_and_drops_stale_result() {
        let (backend, controller) = setup("你好");

        let reply = backend.script_tokenize().await;
        reply.send(Ok(tokens("你好"))).unwrap();
        assert_eq!(controller.tokenize().await, ActionOutcome::Succeeded);

        let reply = backend.script_tokenize().await;
        reply.send(Err(BackendError::Status { status: 500 })).unwrap();
        assert_eq!(controller.tokenize().await, ActionOutcome::Failed);

        let session = controller.snapshot();
        assert!(session.tokenization_result.is_none());
        assert_eq!(
            session.errors(),
            vec![(ActionKind::Tokenize, "Failed to tokenize text. Please try again.")]
        );
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_concurrent_actions_keep_their_own_slots() {
        let (backend, controller) = setup("你好");
        let tokenize_reply = backend.script_tokenize().await;
        let translate_reply = backend.script_translate().await;

        let tokenize = tokio::spawn({
            let controller = controller.clone();
            async move { controller.tokenize().await }
        });
        let translate = tokio::spawn({
            let controller = controller.clone();
            async move { controller.translate().await }
        });
        wait_until_loading(&controller, ActionKind::Tokenize).await;
        wait_until_loading(&controller, ActionKind::Translate).await;

        translate_reply
            .send(Err(BackendError::Network("refused".to_string())))
            .unwrap();
        assert_eq!(translate.await.unwrap(), ActionOutcome::Failed);

        let session = controller.snapshot();
        assert!(session.action(ActionKind::Tokenize).loading);
        assert!(!session.action(ActionKind::Translate).loading);

        tokenize_reply.send(Ok(tokens("你好"))).unwrap();
        assert_eq!(tokenize.await.unwrap(), ActionOutcome::Succeeded);

        let session = controller.snapshot();
        assert_eq!(session.tokenization_result, Some(tokens("你好")));
        assert!(session.translation_result.is_none());
        assert_eq!(
            session.action(ActionKind::Translate).error_message.as_deref(),
            Some("Failed to translate text. Please try again.")
        );
        assert!(session.action(ActionKind::Tokenize).error_message.is_none());
        assert!(!session.is_busy());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_run_of_in_flight_action_is_refused() {
        let (backend, controller) = setup("慢");
        let reply = backend.script_translate().await;

        let first = tokio::spawn({
            let controller = controller.clone();
            async move { controller.translate().await }
        });
        wait_until_loading(&controller, ActionKind::Translate).await;

        controller.set_input("快");
        assert_eq!(controller.translate().await, ActionOutcome::Busy);

        let session = controller.snapshot();
        assert!(session.action(ActionKind::Translate).loading);
        assert!(session.action(ActionKind::Translate).error_message.is_none());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        reply.send(Ok(hello())).unwrap();
        assert_eq!(first.await.unwrap(), ActionOutcome::Succeeded);

        let session = controller.snapshot();
        assert_eq!(session.translation_result, Some(hello()));
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_other_action_may_start_while_one_is_in_flight() {
        let (backend, controller) = setup("你好");
        let translate_reply = backend.script_translate().await;
        let tokenize_reply = backend.script_tokenize().await;
        tokenize_reply.send(Ok(tokens("你好"))).unwrap();

        let translate = tokio::spawn({
            let controller = controller.clone();
            async move { controller.translate().await }
        });
        wait_until_loading(&controller, ActionKind::Translate).await;

        assert_eq!(controller.tokenize().await, ActionOutcome::Succeeded);

        translate_reply.send(Ok(hello())).unwrap();
        assert_eq!(translate.await.unwrap(), ActionOutcome::Succeeded);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_action_clears_loading() {
        let (backend, controller) = setup("你好");
        let _reply = backend.script_translate().await;

        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.translate().await }
        });
        wait_until_loading(&controller, ActionKind::Translate).await;

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        let session = controller.snapshot();
        assert!(!session.is_busy());
        assert!(session.translation_result.is_none());
    }

    #[tokio::test]
    async fn test_panicking_backend_clears_loading() {
        let (_backend, controller) = setup("你好");

        // Nothing scripted: the backend panics on the call.
        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.tokenize().await }
        });
        assert!(task.await.unwrap_err().is_panic());

        assert!(!controller.snapshot().action(ActionKind::Tokenize).loading);
    }
}
