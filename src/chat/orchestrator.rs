//! Event handling and the turn driver.
//!
//! Every UI event goes through [`ChatOrchestrator::handle`], which takes the [`Session`] by
//! value and returns it together with what happened.  A submitted prompt runs as one turn:
//! [`ChatOrchestrator::begin_turn`] records the user message and builds the context, the
//! adapter streams into a [`DisplayBuffer`], and [`ChatOrchestrator::finish_turn`] records the
//! result unless a new chat has started in the meantime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::adapter::{DisplayBuffer, InvokeRequest, ModelAdapter, ModelResponse};
use crate::attachment::{Attachment, AttachmentScan, SkippedAttachment, ThumbnailGrid};
use crate::chat::render::{RenderSink, Renderer};
use crate::chat::session::{Session, TurnState};
use crate::config_store::{ConfigStore, ModelConfig};
use crate::error::{Error, Result};
use crate::memory::ContextMessage;
use crate::observability::{
    ATTACHMENTS_CONSUMED, TURN_DURATION, TURN_TOKENS, TURNS_COMPLETED, TURNS_DISCARDED,
    TURNS_FAILED, TURNS_STARTED,
};
use crate::params::{InferenceParameters, ParameterChange, resolve_parameters};
use crate::types::{ChatMessage, ContentBlock, MessageContent, MessageRole};

/// How often a streaming turn checks for a new-chat request.
const NEW_CHAT_POLL: Duration = Duration::from_millis(25);

/// Something the user did.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// The "new chat" button.
    NewChat,
    /// The model selector.
    SelectModel(String),
    /// Any sidebar widget.
    Adjust(ParameterChange),
    /// Files dropped into the upload widget.
    Upload(Vec<Attachment>),
    /// Remove the upload at this zero-based position.
    RemoveUpload(usize),
    /// The chat input.
    Submit(String),
}

/// What an event did, when it did not fail.
#[derive(Debug, Clone)]
pub enum EventOutcome {
    /// The session was reset.
    Reset,
    /// A different model is selected.
    ModelSelected(String),
    /// A widget value changed.
    Adjusted,
    /// The upload widget changed; `pending` is what the next prompt will carry.
    UploadsChanged {
        pending: ThumbnailGrid,
        skipped: Vec<SkippedAttachment>,
    },
    /// Nothing to send.
    Ignored,
    /// No text, but uploads are waiting for the next prompt.
    Staged { pending: ThumbnailGrid },
    /// The model answered.
    Responded(ModelResponse),
    /// A new chat started while the response streamed; the response was dropped.
    Discarded,
}

/// The session after an event, and what the event did.
#[derive(Debug)]
pub struct Handled {
    pub session: Session,
    pub outcome: Result<EventOutcome>,
}

impl Handled {
    fn new(session: Session, outcome: Result<EventOutcome>) -> Self {
        Self { session, outcome }
    }
}

/// Identifies the session generation a turn was started in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTicket {
    generation: u64,
}

impl TurnTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// A turn that has recorded its user message and is ready to invoke the model.
#[derive(Debug, Clone)]
pub struct PreparedTurn {
    pub ticket: TurnTicket,
    pub model: ModelConfig,
    pub parameters: InferenceParameters,
    /// Memory window followed by `input`.
    pub context: Vec<ContextMessage>,
    /// The new user turn as handed to the model.
    pub input: ContextMessage,
    pub scan: AttachmentScan,
}

/// What [`ChatOrchestrator::begin_turn`] decided.
#[derive(Debug, Clone)]
pub enum TurnStart {
    Started(Box<PreparedTurn>),
    /// Empty text with uploads waiting; nothing was appended.
    Staged(AttachmentScan),
    /// Empty text and nothing waiting.
    Empty,
}

/// How a turn ended.
#[derive(Debug)]
pub enum TurnEnd {
    Completed(ModelResponse),
    Failed(Error),
    Discarded,
}

/// Shape user text plus image blocks into one prompt.
///
/// Returns `None` for empty or whitespace-only text.
pub fn compose_prompt<A: ModelAdapter + ?Sized>(
    adapter: &A,
    model: &ModelConfig,
    text: &str,
    image_blocks: Vec<ContentBlock>,
) -> Option<MessageContent> {
    if text.trim().is_empty() {
        return None;
    }
    let mut blocks = adapter.format_prompt(model, text);
    blocks.extend(image_blocks);
    Some(MessageContent::Blocks(blocks))
}

/// Reacts to UI events against a model table and a backend.
pub struct ChatOrchestrator<A: ModelAdapter> {
    store: ConfigStore,
    adapter: A,
}

impl<A: ModelAdapter> ChatOrchestrator<A> {
    pub fn new(store: ConfigStore, adapter: A) -> Self {
        Self { store, adapter }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// A fresh session on `model_name`, or on the store's first model.
    pub fn initialize_session(&self, model_name: Option<&str>) -> Result<Session> {
        let name = model_name.unwrap_or_else(|| self.store.default_model());
        let model = self.store.get(name)?;
        Ok(Session::initialize(name, model))
    }

    /// Handle one UI event.
    ///
    /// `new_chat` may be set from another thread while a response streams; the turn then
    /// stops forwarding tokens, the session is reset, and the response is discarded.
    pub async fn handle(
        &self,
        mut session: Session,
        event: UiEvent,
        renderer: &mut dyn Renderer,
        new_chat: &AtomicBool,
    ) -> Handled {
        match event {
            UiEvent::NewChat => {
                session.reset();
                Handled::new(session, Ok(EventOutcome::Reset))
            }
            UiEvent::SelectModel(name) => {
                let outcome = self.store.get(&name).map(|model| {
                    session.select_model(name.clone(), model);
                    EventOutcome::ModelSelected(name)
                });
                Handled::new(session, outcome)
            }
            UiEvent::Adjust(change) => {
                session.adjust(change);
                Handled::new(session, Ok(EventOutcome::Adjusted))
            }
            UiEvent::Upload(uploads) => {
                let outcome = self.upload(&mut session, uploads);
                Handled::new(session, outcome)
            }
            UiEvent::RemoveUpload(index) => {
                let outcome = match session.remove_upload(index) {
                    Some(_) => Ok(self.uploads_changed(&session)),
                    None => Err(Error::validation(
                        format!("no upload at position {}", index + 1),
                        Some("upload".to_string()),
                    )),
                };
                Handled::new(session, outcome)
            }
            UiEvent::Submit(text) => self.submit(session, &text, renderer, new_chat).await,
        }
    }

    fn upload(&self, session: &mut Session, uploads: Vec<Attachment>) -> Result<EventOutcome> {
        let model = self.store.get(&session.model_name)?;
        if model.image_upload_disabled {
            return Err(Error::validation(
                format!("{} does not accept image uploads", session.model_name),
                Some("upload".to_string()),
            ));
        }
        session.add_uploads(uploads);
        Ok(self.uploads_changed(session))
    }

    fn uploads_changed(&self, session: &Session) -> EventOutcome {
        let scan = session.scan();
        EventOutcome::UploadsChanged {
            pending: scan.grid,
            skipped: scan.skipped,
        }
    }

    /// Record the user side of a turn and build its context.
    ///
    /// On error the session is untouched.
    pub fn begin_turn(&self, session: &mut Session, text: &str) -> Result<TurnStart> {
        let model = self.store.get(&session.model_name)?;
        let scan = if model.image_upload_disabled {
            AttachmentScan::default()
        } else {
            session.scan()
        };

        let Some(content) = compose_prompt(&self.adapter, model, text, scan.blocks.clone()) else {
            return Ok(if scan.is_empty() {
                TurnStart::Empty
            } else {
                TurnStart::Staged(scan)
            });
        };

        let parameters = resolve_parameters(model, &session.widgets);
        session.memory.normalize();
        let input = ContextMessage::new(MessageRole::User, content.clone());
        let mut context = session.memory.window(parameters.memory_window);
        context.push(input.clone());

        ATTACHMENTS_CONSUMED.count(scan.ids.len() as u64);
        TURNS_STARTED.click();
        session
            .messages
            .push(ChatMessage::user(content, scan.ids.clone()));
        session.turn = TurnState::AwaitingResponse;

        Ok(TurnStart::Started(Box::new(PreparedTurn {
            ticket: TurnTicket {
                generation: session.generation,
            },
            model: model.clone(),
            parameters,
            context,
            input,
            scan,
        })))
    }

    /// Record how a turn ended.
    ///
    /// A ticket from an earlier generation is dropped without touching the session.  A
    /// failure appends `partial` as the assistant's message and leaves memory alone.
    pub fn finish_turn(
        &self,
        session: &mut Session,
        ticket: TurnTicket,
        input: ContextMessage,
        result: Result<ModelResponse>,
        partial: String,
    ) -> TurnEnd {
        if ticket.generation != session.generation {
            TURNS_DISCARDED.click();
            session.counters.discarded += 1;
            return TurnEnd::Discarded;
        }
        session.turn = TurnState::Idle;
        match result {
            Ok(response) => {
                TURNS_COMPLETED.click();
                session.counters.completed += 1;
                if let Some(metadata) = &response.metadata {
                    session.counters.input_tokens += metadata.input_tokens;
                    session.counters.output_tokens += metadata.output_tokens;
                }
                session.messages.push(
                    ChatMessage::assistant(response.text.as_str())
                        .with_metadata(response.metadata.clone()),
                );
                session.memory.record_input(vec![input]);
                session
                    .memory
                    .record_output(MessageContent::PlainText(response.text.clone()));
                TurnEnd::Completed(response)
            }
            Err(err) => {
                TURNS_FAILED.click();
                session.counters.failed += 1;
                session.messages.push(ChatMessage::assistant(partial));
                TurnEnd::Failed(err)
            }
        }
    }

    async fn submit(
        &self,
        mut session: Session,
        text: &str,
        renderer: &mut dyn Renderer,
        new_chat: &AtomicBool,
    ) -> Handled {
        let turn = match self.begin_turn(&mut session, text) {
            Ok(TurnStart::Started(turn)) => turn,
            Ok(TurnStart::Staged(scan)) => {
                report_skipped(renderer, &scan.skipped);
                renderer.show_pending(&scan.grid);
                return Handled::new(session, Ok(EventOutcome::Staged { pending: scan.grid }));
            }
            Ok(TurnStart::Empty) => return Handled::new(session, Ok(EventOutcome::Ignored)),
            Err(err) => return Handled::new(session, Err(err)),
        };

        report_skipped(renderer, &turn.scan.skipped);
        if let Some(message) = session.messages.last() {
            renderer.show_message(message, &turn.scan.grid);
        }
        renderer.start_response();

        let start = Instant::now();
        let (result, partial) = {
            let mut view = RenderSink::new(renderer);
            let mut buffer =
                DisplayBuffer::with_silencer(&mut view, || new_chat.load(Ordering::SeqCst));
            let request = InvokeRequest {
                model: &turn.model,
                context: &turn.context,
                parameters: &turn.parameters,
            };
            let result = tokio::select! {
                result = self.adapter.invoke(request, &mut buffer) => result,
                _ = new_chat_requested(new_chat) => {
                    Err(Error::streaming("response abandoned for a new chat", None))
                }
            };
            TURN_TOKENS.count(buffer.tokens());
            (result, buffer.into_text())
        };
        TURN_DURATION.add(start.elapsed().as_secs_f64());

        if new_chat.swap(false, Ordering::SeqCst) {
            session.reset();
        }

        let PreparedTurn { ticket, input, .. } = *turn;
        let outcome = match self.finish_turn(&mut session, ticket, input, result, partial) {
            TurnEnd::Completed(response) => {
                renderer.finish_response();
                Ok(EventOutcome::Responded(response))
            }
            TurnEnd::Failed(err) => {
                renderer.finish_response();
                Err(err)
            }
            TurnEnd::Discarded => {
                renderer.print_discarded();
                Ok(EventOutcome::Discarded)
            }
        };
        Handled::new(session, outcome)
    }
}

async fn new_chat_requested(flag: &AtomicBool) {
    while !flag.load(Ordering::SeqCst) {
        tokio::time::sleep(NEW_CHAT_POLL).await;
    }
}

fn report_skipped(renderer: &mut dyn Renderer, skipped: &[SkippedAttachment]) {
    for skip in skipped {
        renderer.print_error(&format!("skipping {}: {}", skip.name, skip.error));
    }
}
