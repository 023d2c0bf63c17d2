// src/inference/stream.rs
//! Server-sent-events decoding for streamed completions.
//!
//! Each event line looks like `data: {...}`; the stream ends with `data: [DONE]`.
//! Deltas live in `choices[0].text` (completions) or `choices[0].delta.content` (chat).

use serde_json::Value;

use crate::error::{BotError, Result};

const DONE: &str = "[DONE]";

/// Incremental line splitter + delta accumulator.
#[derive(Debug, Default)]
pub struct SseAccumulator {
    pending: Vec<u8>,
    text: String,
    done: bool,
    events: usize,
}

impl SseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; complete lines are decoded, a partial tail is kept for the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(chunk);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            self.handle_line(line.trim_end_matches(['\r', '\n']))?;
        }
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Flush any unterminated last line and return the concatenated text.
    pub fn finish(mut self) -> Result<String> {
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            let tail = String::from_utf8_lossy(&tail).to_string();
            self.handle_line(tail.trim())?;
        }
        if !self.done {
            if self.text.trim().is_empty() {
                return Err(BotError::malformed("stream ended without [DONE] or content"));
            }
            tracing::warn!(events = self.events, "stream ended without [DONE]; using partial text");
        }
        Ok(self.text)
    }

    fn handle_line(&mut self, line: &str) -> Result<()> {
        if self.done {
            return Ok(());
        }
        let Some(data) = line.strip_prefix("data:") else {
            // comments (": keep-alive"), event:/id: fields and blank separators
            return Ok(());
        };
        let data = data.trim();
        if data == DONE {
            self.done = true;
            return Ok(());
        }
        if data.is_empty() {
            return Ok(());
        }
        let v: Value = serde_json::from_str(data)
            .map_err(|e| BotError::malformed(format!("stream chunk is not json: {e}")))?;
        self.events += 1;
        if let Some(delta) = delta_text(&v) {
            self.text.push_str(delta);
        }
        Ok(())
    }
}

fn delta_text(v: &Value) -> Option<&str> {
    let choice = v.get("choices")?.get(0)?;
    choice
        .get("text")
        .and_then(Value::as_str)
        .or_else(|| choice.get("delta")?.get("content")?.as_str())
}
