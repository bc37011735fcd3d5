//! Built-in responder used when nothing learned matches.
//!
//! Keyword groups are checked in order; the first group with a trigger
//! contained in the input answers with one of its responses chosen at random.
//! Groups added at runtime with [`StarterEngine::learn`] are checked before
//! the built-in ones.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, RwLock};

use rand_core::{OsRng, RngCore};
use tracing::debug;

use crate::error::AppError;

use super::matcher::normalize;

/// Picks an index in `0..len` (`len > 0`).
pub type Picker = fn(usize) -> usize;

fn random_pick(len: usize) -> usize {
    OsRng.next_u32() as usize % len
}

#[derive(Debug, Clone)]
struct TriggerGroup {
    triggers: Vec<String>,
    responses: Vec<String>,
}

impl TriggerGroup {
    fn new(triggers: &[&str], responses: &[&str]) -> Self {
        Self {
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            responses: responses.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn matches(&self, input: &str) -> bool {
        self.triggers.iter().any(|t| input.contains(t.as_str()))
    }
}

const CODE_WORDS: &[&str] = &[
    "html",
    "css",
    "javascript",
    "code",
    "server",
    "interface",
    "build web",
    "create web",
];

fn builtin_groups() -> Vec<TriggerGroup> {
    vec![
        TriggerGroup::new(
            &["hello", "hi", "hey"],
            &[
                "Hello! I'm the bot you're teaching. What should I learn today?",
                "Hi there! Ready to build something together?",
                "Hey! Let's create something awesome!",
            ],
        ),
        TriggerGroup::new(
            &["help", "build", "create", "web", "interface"],
            &[
                "I can help! Teach me new replies with POST /api/teach, then ask me with POST /api/respond.",
                "Let's build something! Every pattern you teach me is shared with everyone.",
                "I'll help you create that. What should I learn to say?",
            ],
        ),
        TriggerGroup::new(
            &["how", "install", "run", "start"],
            &[
                "To run me: build with cargo, then start the binary. The API listens on port 3000 by default.",
                "Start the server, then open the learning feed at /api/events to watch what I learn.",
                "Set PORT to change where I listen, and OLLAMA_URL or OPENAI_API_KEY to give the assistant a brain.",
            ],
        ),
        TriggerGroup::new(
            &["error", "broken", "not working", "failed"],
            &[
                "Let me help debug that. What error message are you seeing?",
                "Don't worry, we'll fix it! Can you share the error?",
                "Errors are how we learn! Show me what went wrong.",
            ],
        ),
        TriggerGroup::new(
            &["database", "save", "persist", "store"],
            &[
                "Everything I learn is saved in SQLite, so I remember it after a restart.",
                "Patterns, users and chat history all live in one SQLite database.",
                "To save something, teach it to me! It goes straight into the database.",
            ],
        ),
    ]
}

fn code_reply(input: &str) -> String {
    if input.contains("html") || input.contains("interface") {
        return "Any static files in the configured static_dir are served at /, so drop an index.html \
                there that calls POST /api/respond with {\"message\": ...}."
            .to_string();
    }
    if input.contains("server") {
        return "This server already exposes POST /chat and POST /api/respond. Send {\"message\": \"...\"} \
                and read the \"response\" field of the JSON reply."
            .to_string();
    }
    "I can point you at the HTTP API: /api/teach, /api/respond, /api/patterns and /api/events. \
     What would you like to build?"
        .to_string()
}

pub struct StarterEngine {
    builtin: Vec<TriggerGroup>,
    learned: RwLock<Vec<TriggerGroup>>,
    contexts: Mutex<HashMap<String, VecDeque<String>>>,
    max_context: usize,
    picker: Picker,
}

impl StarterEngine {
    pub fn new(max_context: usize) -> Self {
        Self::with_picker(max_context, random_pick)
    }

    /// Engine with a deterministic response picker.
    pub fn with_picker(max_context: usize, picker: Picker) -> Self {
        Self {
            builtin: builtin_groups(),
            learned: RwLock::new(Vec::new()),
            contexts: Mutex::new(HashMap::new()),
            max_context: max_context.max(1),
            picker,
        }
    }

    /// Reply to `input` within conversation `conversation`.
    pub fn respond(&self, conversation: &str, input: &str) -> Result<String, AppError> {
        if input.trim().is_empty() {
            return Ok("I need some input to respond to!".to_string());
        }

        let remembered = self.remember(conversation, input)?;
        let lower = normalize(input);

        if CODE_WORDS.iter().any(|w| lower.contains(w)) {
            debug!(conversation, "starter: code request");
            return Ok(code_reply(&lower));
        }

        {
            let learned = self
                .learned
                .read()
                .map_err(|_| AppError::Runtime("starter engine lock poisoned".into()))?;
            if let Some(group) = learned.iter().rev().find(|g| g.matches(&lower)) {
                return Ok(self.pick(&group.responses));
            }
        }

        if let Some(group) = self.builtin.iter().find(|g| g.matches(&lower)) {
            return Ok(self.pick(&group.responses));
        }

        Ok(default_reply(input, remembered))
    }

    /// Add a runtime pattern group; later groups win over earlier ones.
    pub fn learn(&self, trigger: &str, response: &str) -> Result<(), AppError> {
        let trigger = normalize(trigger);
        if trigger.is_empty() || response.trim().is_empty() {
            return Err(AppError::Invalid("Missing trigger or response".into()));
        }
        let mut learned = self
            .learned
            .write()
            .map_err(|_| AppError::Runtime("starter engine lock poisoned".into()))?;
        learned.push(TriggerGroup {
            triggers: vec![trigger],
            responses: vec![response.to_string()],
        });
        Ok(())
    }

    /// Drop every runtime group learned for `trigger`.
    pub fn forget(&self, trigger: &str) -> Result<usize, AppError> {
        let trigger = normalize(trigger);
        let mut learned = self
            .learned
            .write()
            .map_err(|_| AppError::Runtime("starter engine lock poisoned".into()))?;
        let before = learned.len();
        learned.retain(|g| !g.triggers.iter().any(|t| *t == trigger));
        Ok(before - learned.len())
    }

    /// Push `input` into the conversation window and return its new length.
    fn remember(&self, conversation: &str, input: &str) -> Result<usize, AppError> {
        let mut contexts = self
            .contexts
            .lock()
            .map_err(|_| AppError::Runtime("starter engine lock poisoned".into()))?;
        let window = contexts.entry(conversation.to_string()).or_default();
        window.push_back(input.to_string());
        while window.len() > self.max_context {
            window.pop_front();
        }
        Ok(window.len())
    }

    fn pick(&self, responses: &[String]) -> String {
        if responses.is_empty() {
            return String::new();
        }
        let idx = (self.picker)(responses.len()).min(responses.len() - 1);
        responses[idx].clone()
    }
}

fn default_reply(input: &str, remembered: usize) -> String {
    if remembered > 1 {
        format!(
            "I understand you're asking about \"{input}\". Based on our conversation, \
             I think you might want help teaching me. Can you be more specific?"
        )
    } else {
        format!(
            "You said: \"{input}\". I'm a learning bot! Teach me how to answer that \
             and I'll remember it for everyone."
        )
    }
}
