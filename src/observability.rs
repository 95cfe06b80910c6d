use biometrics::{Collector, Counter, Moments};

pub(crate) static SESSION_RESETS: Counter = Counter::new("chatwindow.session.resets");

pub(crate) static ATTACHMENTS_SCANNED: Counter = Counter::new("chatwindow.attachments.scanned");
pub(crate) static ATTACHMENTS_SKIPPED: Counter = Counter::new("chatwindow.attachments.skipped");
pub(crate) static ATTACHMENTS_CONSUMED: Counter =
    Counter::new("chatwindow.attachments.consumed");

pub(crate) static TURNS_STARTED: Counter = Counter::new("chatwindow.turn.started");
pub(crate) static TURNS_COMPLETED: Counter = Counter::new("chatwindow.turn.completed");
pub(crate) static TURNS_FAILED: Counter = Counter::new("chatwindow.turn.failed");
pub(crate) static TURNS_DISCARDED: Counter = Counter::new("chatwindow.turn.discarded");
pub(crate) static TURN_TOKENS: Counter = Counter::new("chatwindow.turn.tokens");
pub(crate) static TURN_DURATION: Moments = Moments::new("chatwindow.turn.duration_seconds");

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("chatwindow.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter =
    Counter::new("chatwindow.client.request_errors");
pub(crate) static STREAM_EVENTS: Counter = Counter::new("chatwindow.stream.events");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("chatwindow.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("chatwindow.stream.bytes");
pub(crate) static STREAM_TTFB: Moments = Moments::new("chatwindow.stream.ttfb_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&SESSION_RESETS);

    collector.register_counter(&ATTACHMENTS_SCANNED);
    collector.register_counter(&ATTACHMENTS_SKIPPED);
    collector.register_counter(&ATTACHMENTS_CONSUMED);

    collector.register_counter(&TURNS_STARTED);
    collector.register_counter(&TURNS_COMPLETED);
    collector.register_counter(&TURNS_FAILED);
    collector.register_counter(&TURNS_DISCARDED);
    collector.register_counter(&TURN_TOKENS);
    collector.register_moments(&TURN_DURATION);

    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_TTFB);
}
