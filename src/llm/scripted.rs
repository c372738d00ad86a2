//! In-memory backend that replays canned completions.
//!
//! Used to exercise routing, session lifecycle and parsing without a model.
//! Counts session creations and releases so tests can assert that every
//! session is released exactly once.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::backend::{
    BackendError, BackendKind, CapabilityError, CapabilityState, InferenceBackend,
    InferenceSession, SessionBox,
};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Error(String),
}

#[derive(Default)]
struct Counters {
    probes: AtomicUsize,
    created: AtomicUsize,
    released: AtomicUsize,
    prompts: AtomicUsize,
}

/// Scripted backend returning queued replies in order.
///
/// When the queue is empty the last reply is repeated.
pub struct ScriptedBackend {
    kind: BackendKind,
    name: String,
    capability: Mutex<CapabilityState>,
    probe_error: bool,
    create_error: bool,
    replies: Arc<Mutex<VecDeque<Reply>>>,
    last_reply: Arc<Mutex<Option<Reply>>>,
    prompts_seen: Arc<Mutex<Vec<String>>>,
    instructions_seen: Mutex<Vec<Option<String>>>,
    counters: Arc<Counters>,
}

impl ScriptedBackend {
    pub fn new(kind: BackendKind) -> Self {
        let name = match kind {
            BackendKind::OnDevice => "scripted-local",
            BackendKind::Remote => "scripted-remote",
        };
        Self {
            kind,
            name: name.to_string(),
            capability: Mutex::new(CapabilityState::Available),
            probe_error: false,
            create_error: false,
            replies: Arc::new(Mutex::new(VecDeque::new())),
            last_reply: Arc::new(Mutex::new(None)),
            prompts_seen: Arc::new(Mutex::new(Vec::new())),
            instructions_seen: Mutex::new(Vec::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn with_capability(self, state: CapabilityState) -> Self {
        self.set_capability(state);
        self
    }

    /// Make `probe` fail instead of reporting a state.
    pub fn with_probe_error(mut self) -> Self {
        self.probe_error = true;
        self
    }

    /// Make `create_session` fail.
    pub fn with_create_error(mut self) -> Self {
        self.create_error = true;
        self
    }

    /// Queue a completion.
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push(Reply::Text(text.into()));
        self
    }

    /// Queue a failing prompt call.
    pub fn with_prompt_error(self, message: impl Into<String>) -> Self {
        self.push(Reply::Error(message.into()));
        self
    }

    fn push(&self, reply: Reply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    pub fn set_capability(&self, state: CapabilityState) {
        if let Ok(mut current) = self.capability.lock() {
            *current = state;
        }
    }

    pub fn probe_count(&self) -> usize {
        self.counters.probes.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    pub fn prompt_count(&self) -> usize {
        self.counters.prompts.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts_seen
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// System instructions passed to `create_session`, in order.
    pub fn system_instructions(&self) -> Vec<Option<String>> {
        self.instructions_seen
            .lock()
            .map(|i| i.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> Result<CapabilityState, CapabilityError> {
        self.counters.probes.fetch_add(1, Ordering::SeqCst);
        if self.probe_error {
            return Err(CapabilityError::Unreachable("scripted probe failure".to_string()));
        }
        self.capability
            .lock()
            .map(|s| *s)
            .map_err(|e| CapabilityError::InvalidResponse(e.to_string()))
    }

    async fn create_session(
        &self,
        system_instruction: Option<&str>,
    ) -> Result<SessionBox, BackendError> {
        if self.create_error {
            return Err(BackendError::NotReady {
                state: CapabilityState::Unavailable,
                hint: self.availability_hint(),
            });
        }
        if let Ok(mut seen) = self.instructions_seen.lock() {
            seen.push(system_instruction.map(str::to_string));
        }
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            replies: self.replies.clone(),
            last_reply: self.last_reply.clone(),
            prompts_seen: self.prompts_seen.clone(),
            counters: self.counters.clone(),
            released: false,
        }))
    }

    fn availability_hint(&self) -> String {
        format!("{} is a scripted test backend", self.name)
    }
}

struct ScriptedSession {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    last_reply: Arc<Mutex<Option<Reply>>>,
    prompts_seen: Arc<Mutex<Vec<String>>>,
    counters: Arc<Counters>,
    released: bool,
}

impl ScriptedSession {
    fn next_reply(&self) -> Option<Reply> {
        let next = self.replies.lock().ok()?.pop_front();
        let mut last = self.last_reply.lock().ok()?;
        match next {
            Some(reply) => {
                *last = Some(reply.clone());
                Some(reply)
            }
            None => last.clone(),
        }
    }
}

#[async_trait]
impl InferenceSession for ScriptedSession {
    async fn prompt(&mut self, text: &str) -> Result<String, BackendError> {
        if self.released {
            return Err(BackendError::Released);
        }
        self.counters.prompts.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.prompts_seen.lock() {
            seen.push(text.to_string());
        }
        match self.next_reply() {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Error(message)) => Err(BackendError::Api(message)),
            None => Err(BackendError::InvalidResponse(
                "no scripted reply queued".to_string(),
            )),
        }
    }

    fn release(&mut self) {
        // Counted on every call so double releases show up in tests.
        self.released = true;
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}
