//! Output rendering for the chat application.
//!
//! This module provides a trait-based rendering abstraction so the orchestrator can drive
//! any view.  The default implementation writes to stdout and uses ANSI escape codes to set
//! roles, thumbnails and errors apart from streamed text.

use std::io::{self, Stdout, Write};

use crate::adapter::TokenSink;
use crate::attachment::{Thumbnail, ThumbnailGrid};
use crate::types::{ChatMessage, MessageRole};

/// ANSI escape code for dim text (used for thumbnails and notices).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for role labels).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the assistant label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for green text (used for the user label).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering chat output.
pub trait Renderer: Send {
    /// Print a chunk of streamed response text.
    ///
    /// This is called incrementally as tokens arrive and must display them before returning.
    fn print_text(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Display one entry of the message log along with the thumbnails it carried.
    fn show_message(&mut self, message: &ChatMessage, thumbnails: &ThumbnailGrid);

    /// Display uploads that will ride along with the next prompt.
    fn show_pending(&mut self, pending: &ThumbnailGrid);

    /// Called before the first token of a response.
    fn start_response(&mut self);

    /// Called when a response is complete.
    ///
    /// Used to ensure proper newlines and cleanup after streaming.
    fn finish_response(&mut self);

    /// Called when a response was dropped because the chat was reset mid-stream.
    fn print_discarded(&mut self);
}

/// Forwards streamed tokens to a [`Renderer`].
pub struct RenderSink<'a> {
    renderer: &'a mut dyn Renderer,
}

impl<'a> RenderSink<'a> {
    pub fn new(renderer: &'a mut dyn Renderer) -> Self {
        Self { renderer }
    }
}

impl TokenSink for RenderSink<'_> {
    fn on_token(&mut self, text: &str) {
        self.renderer.print_text(text);
    }
}

/// One printable line per grid row.
pub fn grid_lines(grid: &ThumbnailGrid) -> Vec<String> {
    grid.rows()
        .iter()
        .map(|row| {
            row.iter()
                .map(thumbnail_label)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn thumbnail_label(thumbnail: &Thumbnail) -> String {
    format!(
        "[{} {}x{}]",
        thumbnail.name, thumbnail.display_width, thumbnail.display_height
    )
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
        }
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn label(&self, role: MessageRole) -> String {
        if self.use_color {
            let color = match role {
                MessageRole::User => ANSI_GREEN,
                MessageRole::Assistant => ANSI_CYAN,
            };
            format!("{ANSI_BOLD}{color}{role}>{ANSI_RESET} ")
        } else {
            format!("{role}> ")
        }
    }

    fn print_grid(&mut self, grid: &ThumbnailGrid) {
        for line in grid_lines(grid) {
            if self.use_color {
                println!("  {ANSI_DIM}{line}{ANSI_RESET}");
            } else {
                println!("  {line}");
            }
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_text(&mut self, text: &str) {
        print!("{text}");
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        if self.use_color {
            eprintln!("\n{ANSI_RED}Error:{ANSI_RESET} {error}");
        } else {
            eprintln!("\nError: {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        println!("{info}");
    }

    fn show_message(&mut self, message: &ChatMessage, thumbnails: &ThumbnailGrid) {
        let label = self.label(message.role);
        println!("{label}{}", message.content.display_text());
        self.print_grid(thumbnails);
        self.flush();
    }

    fn show_pending(&mut self, pending: &ThumbnailGrid) {
        if pending.is_empty() {
            return;
        }
        println!("{} image(s) will be sent with your next message:", pending.len());
        self.print_grid(pending);
        self.flush();
    }

    fn start_response(&mut self) {
        let label = self.label(MessageRole::Assistant);
        print!("{label}");
        self.flush();
    }

    fn finish_response(&mut self) {
        println!();
        self.flush();
    }

    fn print_discarded(&mut self) {
        if self.use_color {
            println!("\n{ANSI_DIM}[discarded: new chat started]{ANSI_RESET}");
        } else {
            println!("\n[discarded: new chat started]");
        }
        self.flush();
    }
}
