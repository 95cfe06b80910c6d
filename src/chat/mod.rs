//! The chat front end's core: session state, the event orchestrator, and the terminal view.
//!
//! This module provides everything the `chatwindow` REPL needs short of reading lines:
//!
//! - Streaming responses with real-time token display
//! - Image uploads that ride along with the next prompt
//! - Slash commands standing in for the sidebar
//! - Transcript save and load
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: Per-user state, passed by value through every handler
//! - [`orchestrator`]: UI events, the turn driver and the prompt composer
//! - [`render`]: The view abstraction and its ANSI implementation
//! - [`commands`]: Slash command parsing

mod commands;
mod config;
mod orchestrator;
mod render;
mod session;

pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use orchestrator::{
    ChatOrchestrator, EventOutcome, Handled, PreparedTurn, TurnEnd, TurnStart, TurnTicket,
    UiEvent, compose_prompt,
};
pub use render::{PlainTextRenderer, RenderSink, Renderer, grid_lines};
pub use session::{Session, SessionStats, TurnState};
