//! Server-Sent Events decoding for streamed chat completions.

use futures::{StreamExt, stream};
use serde::Deserialize;
use tracing::warn;

use super::{EventStream, LlmError, Usage};

/// One decoded piece of a streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Text(String),
    /// Fragment of a tool call; fragments sharing an `index` belong together.
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },
    Usage(Usage),
}

#[derive(Debug, Deserialize)]
struct ChunkFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkToolCall {
    index: Option<usize>,
    id: Option<String>,
    function: Option<ChunkFunction>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ChunkToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    usage: Option<Usage>,
}

/// Incremental decoder; network frames may split lines anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feeds raw bytes and returns the events completed by them.
    ///
    /// Bytes are only decoded as UTF-8 once a whole line is buffered, so a
    /// frame may end inside a multi-byte character.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if self.done {
                continue;
            }
            let line = String::from_utf8_lossy(&line);
            self.decode_line(line.trim(), &mut events);
        }
        events
    }

    /// Flushes a trailing line that arrived without a newline.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let rest = std::mem::take(&mut self.buffer);
        let mut events = Vec::new();
        if !self.done {
            let rest = String::from_utf8_lossy(&rest);
            self.decode_line(rest.trim(), &mut events);
        }
        events
    }

    fn decode_line(&mut self, line: &str, events: &mut Vec<StreamEvent>) {
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim_start();
        if data == "[DONE]" {
            self.done = true;
            return;
        }

        let chunk: Chunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!(error = %err, "skipping undecodable stream chunk");
                return;
            }
        };

        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                events.push(StreamEvent::Text(text));
            }
            for (position, call) in choice.delta.tool_calls.into_iter().flatten().enumerate() {
                let (name, arguments) = match call.function {
                    Some(f) => (f.name, f.arguments.unwrap_or_default()),
                    None => (None, String::new()),
                };
                events.push(StreamEvent::ToolCallDelta {
                    index: call.index.unwrap_or(position),
                    id: call.id,
                    name,
                    arguments,
                });
            }
        }

        if let Some(usage) = chunk.usage {
            events.push(StreamEvent::Usage(usage));
        }
    }
}

/// Turns a streaming HTTP response body into decoded events.
pub fn event_stream(response: reqwest::Response) -> EventStream {
    let mut decoder = SseDecoder::default();
    let body = response
        .bytes_stream()
        .map(Some)
        .chain(stream::once(async { None }));

    let events = body.flat_map(move |frame| {
        let batch: Vec<Result<StreamEvent, LlmError>> = match frame {
            Some(Ok(bytes)) => decoder.push(&bytes).into_iter().map(Ok).collect(),
            Some(Err(err)) => vec![Err(LlmError::Http(err))],
            None => decoder.finish().into_iter().map(Ok).collect(),
        };
        stream::iter(batch)
    });

    Box::pin(events)
}
