//! Per-user chat state.
//!
//! A [`Session`] is an explicit value: the orchestrator takes it, updates it, and hands it
//! back.  Nothing lives in ambient storage, so a stale streaming result can be recognized
//! by comparing its ticket against [`Session::generation`].

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{from_reader, to_writer_pretty};

use crate::Error;
use crate::attachment::{Attachment, AttachmentScan, ThumbnailGrid, message_thumbnails, scan_attachments};
use crate::config_store::ModelConfig;
use crate::error::Result;
use crate::memory::ConversationMemory;
use crate::observability::SESSION_RESETS;
use crate::params::{ParameterChange, WidgetValues};
use crate::types::{ChatMessage, MessageRole};

/// Current transcript file format.
const TRANSCRIPT_VERSION: u8 = 1;

/// Range the upload widget epoch is drawn from.
const UPLOAD_EPOCH_MAX: u32 = 100;

/// Range the sidebar widget epoch is drawn from.
const WIDGET_EPOCH_MAX: u32 = 1_000_000;

/// Where the turn driver stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TurnState {
    #[default]
    Idle,
    AwaitingResponse,
}

/// Chat state for one user.
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) messages: Vec<ChatMessage>,
    pub(crate) memory: ConversationMemory,
    pub(crate) model_name: String,
    pub(crate) widget_epoch: u32,
    pub(crate) upload_epoch: u32,
    pub(crate) uploads: Vec<Attachment>,
    pub(crate) widgets: WidgetValues,
    pub(crate) turn: TurnState,
    pub(crate) generation: u64,
    pub(crate) counters: TurnCounters,
}

/// Running totals over the life of a session; survives reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TurnCounters {
    pub(crate) completed: u64,
    pub(crate) failed: u64,
    pub(crate) discarded: u64,
    pub(crate) input_tokens: u64,
    pub(crate) output_tokens: u64,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    /// The selected model.
    pub model: String,
    /// The number of messages in the visible log, greeting included.
    pub message_count: usize,
    /// The number of entries in the conversation memory.
    pub memory_entries: usize,
    /// Uploads not yet carried by any user message.
    pub pending_uploads: usize,
    /// Turns that produced a response.
    pub completed_turns: u64,
    /// Turns that ended in an invocation error.
    pub failed_turns: u64,
    /// Turns whose results were dropped by a new chat.
    pub discarded_turns: u64,
    /// Total input tokens reported by the backend.
    pub total_input_tokens: u64,
    /// Total output tokens reported by the backend.
    pub total_output_tokens: u64,
    /// Live widget values.
    pub widgets: WidgetValues,
}

impl Session {
    /// A fresh session showing only the greeting.
    pub fn initialize(model_name: impl Into<String>, model: &ModelConfig) -> Self {
        Self {
            messages: vec![ChatMessage::greeting()],
            memory: ConversationMemory::new(),
            model_name: model_name.into(),
            widget_epoch: rand::thread_rng().gen_range(1..=WIDGET_EPOCH_MAX),
            upload_epoch: 0,
            uploads: Vec::new(),
            widgets: WidgetValues::from_config(model),
            turn: TurnState::Idle,
            generation: 0,
            counters: TurnCounters::default(),
        }
    }

    /// Start a new chat.  Widget values and the model selection are kept.
    pub fn reset(&mut self) {
        SESSION_RESETS.click();
        self.messages = vec![ChatMessage::greeting()];
        self.memory.clear();
        self.uploads.clear();
        self.upload_epoch = next_upload_epoch(self.upload_epoch);
        self.generation += 1;
        self.turn = TurnState::Idle;
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Opaque key for the sidebar widgets; stable across resets.
    pub fn widget_epoch(&self) -> u32 {
        self.widget_epoch
    }

    /// Opaque key for the upload widget; changes on every reset so the widget comes back empty.
    pub fn upload_epoch(&self) -> u32 {
        self.upload_epoch
    }

    pub fn uploads(&self) -> &[Attachment] {
        &self.uploads
    }

    pub fn widgets(&self) -> &WidgetValues {
        &self.widgets
    }

    pub fn turn(&self) -> TurnState {
        self.turn
    }

    /// Incremented on every reset.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Add files to the upload widget, after any already there.
    pub fn add_uploads(&mut self, uploads: impl IntoIterator<Item = Attachment>) {
        self.uploads.extend(uploads);
    }

    /// Remove the upload at `index` (zero-based), if present.
    pub fn remove_upload(&mut self, index: usize) -> Option<Attachment> {
        if index < self.uploads.len() {
            Some(self.uploads.remove(index))
        } else {
            None
        }
    }

    /// Select another model; the sidebar re-seeds from its defaults.
    pub fn select_model(&mut self, model_name: impl Into<String>, model: &ModelConfig) {
        self.model_name = model_name.into();
        self.widgets = WidgetValues::from_config(model);
    }

    /// Apply a sidebar adjustment.
    pub fn adjust(&mut self, change: ParameterChange) {
        change.apply(&mut self.widgets);
    }

    /// The uploads no user message has carried yet, encoded for the next prompt.
    pub fn scan(&self) -> AttachmentScan {
        scan_attachments(&self.messages, &self.uploads)
    }

    /// Thumbnails to draw next to `message`.
    pub fn thumbnails_for(&self, message: &ChatMessage) -> ThumbnailGrid {
        if message.role == MessageRole::User {
            message_thumbnails(message, &self.uploads)
        } else {
            ThumbnailGrid::new()
        }
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        let consumed = crate::attachment::consumed_ids(&self.messages);
        SessionStats {
            model: self.model_name.clone(),
            message_count: self.messages.len(),
            memory_entries: self.memory.len(),
            pending_uploads: self
                .uploads
                .iter()
                .filter(|upload| !consumed.contains(&upload.id()))
                .count(),
            completed_turns: self.counters.completed,
            failed_turns: self.counters.failed,
            discarded_turns: self.counters.discarded,
            total_input_tokens: self.counters.input_tokens,
            total_output_tokens: self.counters.output_tokens,
            widgets: self.widgets.clone(),
        }
    }

    /// Saves the visible message log to the specified path.
    pub fn save_transcript_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let transcript = TranscriptFile::new(&self.model_name, &self.messages);
        let file = File::create(path.as_ref())
            .map_err(|err| Error::io("failed to create transcript file", err))?;
        let writer = BufWriter::new(file);
        to_writer_pretty(writer, &transcript).map_err(|err| {
            Error::serialization("failed to serialize transcript", Some(Box::new(err)))
        })
    }

    /// Loads a transcript from disk, replacing the conversation as a new chat would.
    ///
    /// The log must be whole user/assistant exchanges after the greeting; anything else is a
    /// validation error and leaves the session untouched.  Memory is rebuilt from the loaded
    /// log.  The model selection is not changed.
    pub fn load_transcript_from<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let file = File::open(path.as_ref())
            .map_err(|err| Error::io("failed to open transcript file", err))?;
        let reader = BufReader::new(file);
        let transcript: TranscriptFile = from_reader(reader).map_err(|err| {
            Error::serialization("failed to parse transcript", Some(Box::new(err)))
        })?;
        if transcript.version != TRANSCRIPT_VERSION {
            return Err(Error::validation(
                format!("unsupported transcript version {}", transcript.version),
                Some("version".to_string()),
            ));
        }

        let loaded: Vec<ChatMessage> = transcript
            .messages
            .into_iter()
            .skip_while(ChatMessage::is_greeting)
            .collect();
        check_exchanges(&loaded)?;

        self.reset();
        self.messages.extend(loaded);
        self.memory = ConversationMemory::from_messages(&self.messages);
        Ok(())
    }
}

/// A loaded log must be whole exchanges: user, assistant, user, assistant.
fn check_exchanges(messages: &[ChatMessage]) -> Result<()> {
    for (position, message) in messages.iter().enumerate() {
        let expected = if position % 2 == 0 {
            MessageRole::User
        } else {
            MessageRole::Assistant
        };
        if message.role != expected {
            return Err(Error::validation(
                format!(
                    "transcript message {} should be from the {expected} role",
                    position + 1
                ),
                Some("messages".to_string()),
            ));
        }
    }
    if messages.len() % 2 != 0 {
        return Err(Error::validation(
            "transcript ends with an unanswered user message",
            Some("messages".to_string()),
        ));
    }
    Ok(())
}

fn next_upload_epoch(previous: u32) -> u32 {
    let mut rng = rand::thread_rng();
    loop {
        let epoch = rng.gen_range(1..=UPLOAD_EPOCH_MAX);
        if epoch != previous {
            return epoch;
        }
    }
}

#[derive(Serialize, Deserialize)]
struct TranscriptFile {
    version: u8,
    #[serde(default)]
    model: Option<String>,
    messages: Vec<ChatMessage>,
}

impl TranscriptFile {
    fn new(model: &str, messages: &[ChatMessage]) -> Self {
        Self {
            version: TRANSCRIPT_VERSION,
            model: Some(model.to_string()),
            messages: messages.to_vec(),
        }
    }
}
