//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! This module handles parsing of the Messages-style SSE stream a backend sends,
//! converting raw byte streams into [`StreamEvent`]s.  Only what the chat needs survives
//! parsing: text deltas, the stop reason, and token usage.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use crate::error::{Error, Result};

/// One parsed server-sent event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Ping,
    MessageStart {
        model: Option<String>,
        input_tokens: u64,
    },
    ContentBlockStart {
        index: usize,
    },
    TextDelta {
        index: usize,
        text: String,
    },
    /// A delta for a block kind the chat does not display (thinking, tool input).
    OtherDelta {
        index: usize,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        stop_reason: Option<String>,
        output_tokens: u64,
    },
    MessageStop,
}

#[derive(Default, Deserialize)]
struct UsageData {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
}

#[derive(Deserialize)]
struct StartMessage {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: UsageData,
}

#[derive(Deserialize)]
struct MessageStartData {
    message: StartMessage,
}

#[derive(Deserialize)]
struct BlockIndexData {
    index: usize,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum DeltaData {
    #[serde(rename = "text_delta")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct BlockDeltaData {
    index: usize,
    delta: DeltaData,
}

#[derive(Default, Deserialize)]
struct StopData {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct MessageDeltaData {
    #[serde(default)]
    delta: StopData,
    #[serde(default)]
    usage: UsageData,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorData {
    error: ErrorDetail,
}

/// Process a stream of bytes into a stream of server-sent events.
///
/// This function takes a byte stream from an HTTP response and converts it into
/// a stream of parsed [`StreamEvent`]s, handling SSE parsing, buffering, and error
/// conditions.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<StreamEvent>>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin + 'static,
{
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });
    process_event_text(stream)
}

fn process_event_text<S>(stream: S) -> impl Stream<Item = Result<StreamEvent>>
where
    S: Stream<Item = Result<Bytes>> + Unpin + 'static,
{
    let buffer = String::new();

    stream::unfold(
        (stream, buffer, false),
        move |(mut stream, mut buffer, done)| async move {
            if done {
                return None;
            }
            loop {
                if let Some((event, remaining)) = extract_event(&buffer) {
                    buffer = remaining;
                    return Some((event, (stream, buffer, false)));
                }

                match stream.next().await {
                    Some(Ok(bytes)) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => buffer.push_str(&text.replace("\r\n", "\n")),
                        Err(e) => {
                            return Some((
                                Err(Error::encoding(
                                    format!("Invalid UTF-8 in stream: {e}"),
                                    Some(Box::new(e)),
                                )),
                                (stream, buffer, false),
                            ));
                        }
                    },
                    Some(Err(e)) => {
                        return Some((Err(e), (stream, buffer, false)));
                    }
                    None => {
                        // A final event may lack its trailing blank line.
                        if !buffer.trim().is_empty() {
                            let tail = format!("{}\n\n", buffer.trim_end());
                            if let Some((event, _)) = extract_event(&tail) {
                                return Some((event, (stream, String::new(), true)));
                            }
                        }
                        return None;
                    }
                }
            }
        },
    )
}

/// Extract a complete SSE event from a buffer string.
///
/// Events are delimited by blank lines; each has an `event:` line followed by a `data:` line.
fn extract_event(buffer: &str) -> Option<(Result<StreamEvent>, String)> {
    let (event_text, rest) = buffer.split_once("\n\n")?;
    let rest = rest.to_string();

    let Some((event_type, event_data)) = event_text.split_once('\n') else {
        return Some((
            Err(Error::serialization(
                format!("Malformed SSE event: missing newline separator in '{event_text}'"),
                None,
            )),
            rest,
        ));
    };

    let Some(event_data) = event_data.strip_prefix("data:").map(str::trim) else {
        return Some((
            Err(Error::serialization(
                format!("Malformed SSE event: missing 'data:' prefix in '{event_data}'"),
                None,
            )),
            rest,
        ));
    };

    let Some(event_type) = event_type.strip_prefix("event:").map(str::trim) else {
        return Some((
            Err(Error::serialization(
                format!("Malformed SSE event: missing 'event:' prefix in '{event_type}'"),
                None,
            )),
            rest,
        ));
    };

    Some((parse_event(event_type, event_data), rest))
}

fn parse_event(event_type: &str, event_data: &str) -> Result<StreamEvent> {
    match event_type {
        "ping" => Ok(StreamEvent::Ping),
        "message_start" => {
            let data: MessageStartData = serde_json::from_str(event_data)?;
            Ok(StreamEvent::MessageStart {
                model: data.message.model,
                input_tokens: data.message.usage.input_tokens.unwrap_or(0),
            })
        }
        "content_block_start" => {
            let data: BlockIndexData = serde_json::from_str(event_data)?;
            Ok(StreamEvent::ContentBlockStart { index: data.index })
        }
        "content_block_delta" => {
            let data: BlockDeltaData = serde_json::from_str(event_data)?;
            Ok(match data.delta {
                DeltaData::Text { text } => StreamEvent::TextDelta {
                    index: data.index,
                    text,
                },
                DeltaData::Other => StreamEvent::OtherDelta { index: data.index },
            })
        }
        "content_block_stop" => {
            let data: BlockIndexData = serde_json::from_str(event_data)?;
            Ok(StreamEvent::ContentBlockStop { index: data.index })
        }
        "message_delta" => {
            let data: MessageDeltaData = serde_json::from_str(event_data)?;
            Ok(StreamEvent::MessageDelta {
                stop_reason: data.delta.stop_reason,
                output_tokens: data.usage.output_tokens.unwrap_or(0),
            })
        }
        "message_stop" => Ok(StreamEvent::MessageStop),
        "error" => {
            let (error_type, message) = match serde_json::from_str::<ErrorData>(event_data) {
                Ok(data) => (
                    data.error.error_type,
                    data.error.message.unwrap_or_else(|| event_data.to_string()),
                ),
                Err(_) => (None, event_data.to_string()),
            };
            Err(Error::api(
                500,
                Some(error_type.unwrap_or_else(|| "stream_error".to_string())),
                message,
                None,
            ))
        }
        _ => Err(Error::serialization(
            format!("Unknown SSE event type: {event_type}"),
            None,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn events(chunks: Vec<&'static str>) -> impl Stream<Item = Result<StreamEvent>> {
        let stream = stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
                .collect::<Vec<Result<Bytes>>>(),
        );
        process_event_text(stream)
    }

    #[tokio::test]
    async fn parse_ping_event() {
        let mut sse_stream = Box::pin(events(vec!["event: ping\ndata: {}\n\n"]));
        let event = sse_stream.next().await.unwrap();
        assert!(matches!(event, Ok(StreamEvent::Ping)));
        assert!(sse_stream.next().await.is_none());
    }

    #[tokio::test]
    async fn parse_text_conversation() {
        let mut sse_stream = Box::pin(events(vec![
            "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{\"model\":\"m\",\"usage\":{\"input_tokens\":12,\"output_tokens\":1}}}\n\n",
            "event: content_block_start\ndata: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
            "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
            "event: content_block_stop\ndata: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
            "event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":5}}\n\n",
            "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
        ]));

        let mut seen = Vec::new();
        while let Some(event) = sse_stream.next().await {
            seen.push(event.unwrap());
        }
        assert_eq!(
            seen,
            vec![
                StreamEvent::MessageStart {
                    model: Some("m".to_string()),
                    input_tokens: 12
                },
                StreamEvent::ContentBlockStart { index: 0 },
                StreamEvent::TextDelta {
                    index: 0,
                    text: "Hi".to_string()
                },
                StreamEvent::ContentBlockStop { index: 0 },
                StreamEvent::MessageDelta {
                    stop_reason: Some("end_turn".to_string()),
                    output_tokens: 5
                },
                StreamEvent::MessageStop,
            ]
        );
    }

    #[tokio::test]
    async fn non_text_deltas_are_tolerated() {
        let mut sse_stream = Box::pin(events(vec![
            "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":1,\"delta\":{\"type\":\"thinking_delta\",\"thinking\":\"hm\"}}\n\n",
        ]));
        let event = sse_stream.next().await.unwrap().unwrap();
        assert_eq!(event, StreamEvent::OtherDelta { index: 1 });
    }

    #[tokio::test]
    async fn handle_split_event_and_crlf() {
        let mut sse_stream = Box::pin(events(vec!["event: ping\r\n", "data: {}\r\n\r\n"]));
        let event = sse_stream.next().await.unwrap();
        assert!(matches!(event, Ok(StreamEvent::Ping)));
    }

    #[tokio::test]
    async fn final_event_without_blank_line() {
        let mut sse_stream = Box::pin(events(vec!["event: message_stop\ndata: {}"]));
        let event = sse_stream.next().await.unwrap();
        assert!(matches!(event, Ok(StreamEvent::MessageStop)));
        assert!(sse_stream.next().await.is_none());
    }

    #[tokio::test]
    async fn handle_malformed_event() {
        let mut sse_stream = Box::pin(events(vec!["malformed data without proper format\n\n"]));
        assert!(sse_stream.next().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn error_event_becomes_api_error() {
        let mut sse_stream = Box::pin(events(vec![
            "event: error\ndata: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n",
        ]));
        let err = sse_stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "overloaded_error: Overloaded");
    }

    #[tokio::test]
    async fn handle_unknown_event_type() {
        let mut sse_stream = Box::pin(events(vec!["event: unknown_event\ndata: {}\n\n"]));
        let err = sse_stream.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("Unknown SSE event type"));
    }
}
