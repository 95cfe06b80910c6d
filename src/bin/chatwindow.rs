//! Interactive chat with a configurable model backend.
//!
//! This binary provides a streaming REPL over the chat orchestrator.  Slash commands stand
//! in for the sidebar and the upload widget.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with the built-in model table
//! chatwindow
//!
//! # Select a model and load a custom table
//! chatwindow --model claude-haiku-4-5 --config models.yaml
//!
//! # Disable colors (useful for piping output)
//! chatwindow --no-color
//! ```
//!
//! Ctrl+C while a response streams starts a new chat and drops the response.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use chatwindow::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatOrchestrator, EventOutcome, Handled, PlainTextRenderer,
    Renderer, Session, UiEvent, help_text, parse_command,
};
use chatwindow::{Attachment, MessagesClient, ParameterChange, resolve_parameters};

type Orchestrator = ChatOrchestrator<MessagesClient>;

/// Main entry point for the chatwindow application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("chatwindow [OPTIONS]");
    let config = ChatConfig::from(args);

    let store = config.load_store()?;
    let client = MessagesClient::with_options(None, config.base_url.clone(), None)?;
    let orchestrator = ChatOrchestrator::new(store, client);
    let mut session = orchestrator.initialize_session(config.model.as_deref())?;
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    // Set while a response streams to start a new chat.
    let new_chat = Arc::new(AtomicBool::new(false));
    let new_chat_clone = new_chat.clone();
    ctrlc::set_handler(move || {
        new_chat_clone.store(true, Ordering::SeqCst);
    })?;

    println!("chatwindow (model: {})", session.model_name());
    println!("Type /help for commands, /quit to exit\n");
    show_log(&session, &mut renderer);

    loop {
        new_chat.store(false, Ordering::SeqCst);

        let line = match rl.readline("You: ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            // Flushes staged uploads into a preview.
            session = dispatch(
                &orchestrator,
                session,
                UiEvent::Submit(String::new()),
                &mut renderer,
                &new_chat,
            )
            .await;
            continue;
        }
        let _ = rl.add_history_entry(line);

        let Some(cmd) = parse_command(line) else {
            session = dispatch(
                &orchestrator,
                session,
                UiEvent::Submit(line.to_string()),
                &mut renderer,
                &new_chat,
            )
            .await;
            continue;
        };

        let event = match cmd {
            ChatCommand::Quit => {
                println!("Goodbye!");
                break;
            }
            ChatCommand::Help => {
                for line in help_text().lines() {
                    println!("    {line}");
                }
                None
            }
            ChatCommand::NewChat => Some(UiEvent::NewChat),
            ChatCommand::Model(name) => Some(UiEvent::SelectModel(name)),
            ChatCommand::Models => {
                print_models(&orchestrator, &session);
                None
            }
            ChatCommand::System(prompt) => Some(UiEvent::Adjust(ParameterChange::SystemPrompt(
                prompt.unwrap_or_default(),
            ))),
            ChatCommand::Temperature(value) => {
                Some(UiEvent::Adjust(ParameterChange::Temperature(value)))
            }
            ChatCommand::TopP(value) => Some(UiEvent::Adjust(ParameterChange::TopP(value))),
            ChatCommand::TopK(value) => Some(UiEvent::Adjust(ParameterChange::TopK(value))),
            ChatCommand::MaxTokens(value) => {
                Some(UiEvent::Adjust(ParameterChange::MaxTokens(value)))
            }
            ChatCommand::Memory(value) => {
                Some(UiEvent::Adjust(ParameterChange::MemoryWindow(value)))
            }
            ChatCommand::Attach(paths) => {
                let mut uploads = Vec::with_capacity(paths.len());
                for path in paths {
                    match Attachment::from_path(&path) {
                        Ok(upload) => uploads.push(upload),
                        Err(err) => renderer.print_error(&err.to_string()),
                    }
                }
                (!uploads.is_empty()).then_some(UiEvent::Upload(uploads))
            }
            ChatCommand::Detach(position) => Some(UiEvent::RemoveUpload(position - 1)),
            ChatCommand::Uploads => {
                print_uploads(&session, &mut renderer);
                None
            }
            ChatCommand::SaveTranscript(path) => {
                match session.save_transcript_to(&path) {
                    Ok(()) => renderer.print_info(&format!("Transcript saved to {path}")),
                    Err(err) => {
                        renderer.print_error(&format!("Failed to save transcript: {err}"))
                    }
                }
                None
            }
            ChatCommand::LoadTranscript(path) => {
                match session.load_transcript_from(&path) {
                    Ok(()) => {
                        renderer.print_info(&format!("Transcript loaded from {path}"));
                        show_log(&session, &mut renderer);
                    }
                    Err(err) => {
                        renderer.print_error(&format!("Failed to load transcript: {err}"))
                    }
                }
                None
            }
            ChatCommand::Stats => {
                print_stats(&session);
                None
            }
            ChatCommand::ShowConfig => {
                print_config(&orchestrator, &session, &mut renderer);
                None
            }
            ChatCommand::Invalid(message) => {
                renderer.print_error(&message);
                None
            }
        };

        if let Some(event) = event {
            session = dispatch(&orchestrator, session, event, &mut renderer, &new_chat).await;
        }
    }

    Ok(())
}

async fn dispatch(
    orchestrator: &Orchestrator,
    session: Session,
    event: UiEvent,
    renderer: &mut PlainTextRenderer,
    new_chat: &AtomicBool,
) -> Session {
    let Handled { session, outcome } = orchestrator
        .handle(session, event, renderer, new_chat)
        .await;
    match outcome {
        Ok(EventOutcome::Reset) | Ok(EventOutcome::Discarded) => {
            renderer.print_info("Started a new chat.");
            show_log(&session, renderer);
        }
        Ok(EventOutcome::ModelSelected(name)) => {
            renderer.print_info(&format!("Model changed to: {name}"));
        }
        Ok(EventOutcome::Adjusted) => {
            renderer.print_info("Updated.");
        }
        Ok(EventOutcome::UploadsChanged { pending, skipped }) => {
            for skip in skipped {
                renderer.print_error(&format!("{}: {}", skip.name, skip.error));
            }
            renderer.show_pending(&pending);
        }
        Ok(EventOutcome::Ignored)
        | Ok(EventOutcome::Staged { .. })
        | Ok(EventOutcome::Responded(_)) => {}
        Err(err) => renderer.print_error(&err.to_string()),
    }
    session
}

fn show_log(session: &Session, renderer: &mut dyn Renderer) {
    for message in session.messages() {
        renderer.show_message(message, &session.thumbnails_for(message));
    }
}

fn print_models(orchestrator: &Orchestrator, session: &Session) {
    println!("    Models:");
    for name in orchestrator.store().model_names() {
        let marker = if name == session.model_name() { "*" } else { " " };
        println!("    {marker} {name}");
    }
}

fn print_uploads(session: &Session, renderer: &mut dyn Renderer) {
    if session.uploads().is_empty() {
        println!("    No uploads.");
        return;
    }
    let consumed = chatwindow::attachment::consumed_ids(session.messages());
    println!("    Uploads:");
    for (position, upload) in session.uploads().iter().enumerate() {
        let status = if consumed.contains(&upload.id()) {
            "sent"
        } else {
            "pending"
        };
        println!("      {}. {} ({status})", position + 1, upload.name());
    }
    renderer.show_pending(&session.scan().grid);
}

fn print_stats(session: &Session) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      Model: {}", stats.model);
    println!("      Messages: {}", stats.message_count);
    println!("      Memory entries: {}", stats.memory_entries);
    println!("      Pending uploads: {}", stats.pending_uploads);
    println!(
        "      Turns: {} completed, {} failed, {} discarded",
        stats.completed_turns, stats.failed_turns, stats.discarded_turns
    );
    println!(
        "      Total tokens: {} in / {} out",
        stats.total_input_tokens, stats.total_output_tokens
    );
}

fn print_config(orchestrator: &Orchestrator, session: &Session, renderer: &mut dyn Renderer) {
    let model = match orchestrator.store().get(session.model_name()) {
        Ok(model) => model,
        Err(err) => {
            renderer.print_error(&err.to_string());
            return;
        }
    };
    let params = resolve_parameters(model, session.widgets());
    println!("    Current Configuration:");
    println!("      Model: {} ({})", session.model_name(), model.model_id);
    println!("      Max tokens: {}", params.max_tokens);
    println!("      Temperature: {:.2}", params.temperature);
    println!("      Top-p: {:.2}", params.top_p);
    println!("      Top-k: {}", params.top_k);
    println!("      Memory window: {}", params.memory_window);
    match params.system_prompt.as_deref() {
        Some("") => println!("      System prompt: (none)"),
        Some(prompt) => println!("      System prompt: {prompt}"),
        None => println!("      System prompt: (not supported by this model)"),
    }
    if model.image_upload_disabled {
        println!("      Image uploads: disabled");
    }
}
