//! Incremental resolution of streamed model output

use crate::error::ResolveError;
use crate::extract::{self, TOOL_CALL_CLOSE, TOOL_CALL_OPEN};
use crate::format::Resolution;
use crate::resolve;
use crate::types::{Action, FinishReason, ResponseMeta, StreamDelta, StreamEvent, Usage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Accumulating plain content
    Plain,
    /// Inside a `<tool_call>` block
    InBlock,
    /// Provider signalled the end of the stream
    Done,
}

/// Folds a provider delta stream into a single action
///
/// Only `<tool_call>` blocks are recognised while streaming. JSON and
/// call-expression payloads are detected on complete text only, so a
/// stream without an XML block always finalizes as plain text.
///
/// Markers may be split across deltas: detection runs over the
/// accumulated buffers, not over individual deltas.
#[derive(Debug)]
pub struct StreamReducer {
    state: State,
    plain: String,
    block: String,
    /// Offset in the active buffer from which the next marker search starts
    scan_from: usize,
    tool_call: Option<Action>,
    meta: Option<ResponseMeta>,
    usage: Option<Usage>,
    finish_reason: Option<FinishReason>,
}

impl Default for StreamReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamReducer {
    pub const fn new() -> Self {
        Self {
            state: State::Plain,
            plain: String::new(),
            block: String::new(),
            scan_from: 0,
            tool_call: None,
            meta: None,
            usage: None,
            finish_reason: None,
        }
    }

    /// Consume the next provider event
    ///
    /// Fails as soon as a completed block cannot be resolved, or when the
    /// provider ends the stream inside a block.
    pub fn push(&mut self, event: StreamEvent) -> Result<(), ResolveError> {
        match event {
            StreamEvent::Delta(delta) => self.push_delta(delta),
            StreamEvent::Usage(usage) => {
                self.usage = Some(usage);
                Ok(())
            }
            StreamEvent::Done => {
                if self.state == State::InBlock {
                    return Err(self.unterminated());
                }
                self.state = State::Done;
                Ok(())
            }
        }
    }

    fn push_delta(&mut self, delta: StreamDelta) -> Result<(), ResolveError> {
        if self.meta.is_none() {
            self.meta = Some(delta.meta);
        }
        if delta.finish_reason.is_some() {
            self.finish_reason = delta.finish_reason;
        }

        let Some(content) = delta.content.filter(|c| !c.is_empty()) else {
            return Ok(());
        };

        match self.state {
            State::Plain => {
                self.plain.push_str(&content);
                self.scan_plain()
            }
            State::InBlock => {
                self.block.push_str(&content);
                self.scan_block()
            }
            State::Done => {
                tracing::debug!("ignoring delta after end of stream");
                Ok(())
            }
        }
    }

    fn scan_plain(&mut self) -> Result<(), ResolveError> {
        if self.tool_call.is_some() {
            return Ok(());
        }

        let Some(start) = find_from(&self.plain, TOOL_CALL_OPEN, self.scan_from) else {
            self.scan_from = rescan_point(&self.plain, TOOL_CALL_OPEN);
            return Ok(());
        };

        self.block = self.plain.split_off(start);
        self.state = State::InBlock;
        self.scan_from = 0;
        self.scan_block()
    }

    fn scan_block(&mut self) -> Result<(), ResolveError> {
        let Some(close) = find_from(&self.block, TOOL_CALL_CLOSE, self.scan_from) else {
            self.scan_from = rescan_point(&self.block, TOOL_CALL_CLOSE);
            return Ok(());
        };

        let rest = self.block.split_off(close + TOOL_CALL_CLOSE.len());
        let block = std::mem::take(&mut self.block);

        let action = resolve::resolve_xml(&block).inspect_err(|error| {
            tracing::warn!(block = %block, error = %error, "failed to resolve streamed tool call");
        })?;

        self.tool_call = Some(action);
        self.state = State::Plain;
        self.plain.push_str(&rest);
        self.scan_from = 0;
        Ok(())
    }

    /// Produce the terminal action
    ///
    /// A resolved tool call wins over any plain text. Ending inside a block
    /// is a malformed response.
    pub fn finish(self) -> Result<Resolution, ResolveError> {
        if self.state == State::InBlock {
            return Err(self.unterminated());
        }

        let action = match self.tool_call {
            Some(action) => action,
            None => Action::text(extract::strip_framing_tags(&self.plain)),
        };

        Ok(Resolution {
            action,
            meta: self.meta.unwrap_or_default(),
            usage: self.usage,
            finish_reason: self.finish_reason,
        })
    }

    /// The error for a stream that broke off here, if it broke off inside
    /// a block
    pub fn interrupted(&self) -> Option<ResolveError> {
        (self.state == State::InBlock).then(|| self.unterminated())
    }

    fn unterminated(&self) -> ResolveError {
        let raw = format!("{}{}", self.plain, self.block);
        tracing::warn!(raw = %raw, "stream ended inside a tool call block");
        ResolveError::MalformedResponse {
            raw,
            candidate: Some(self.block.clone()),
        }
    }
}

/// Find `marker` in `buffer` at or after `from`
fn find_from(buffer: &str, marker: &str, from: usize) -> Option<usize> {
    buffer.get(from..)?.find(marker).map(|i| i + from)
}

/// Earliest offset where a marker split across the next delta could start
fn rescan_point(buffer: &str, marker: &str) -> usize {
    let mut at = buffer.len().saturating_sub(marker.len() - 1);
    while !buffer.is_char_boundary(at) {
        at -= 1;
    }
    at
}
