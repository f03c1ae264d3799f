/// Byte-level handling of terminal traffic in both directions
use tracing::{debug, trace};

use crate::app_state::SessionId;
use crate::protocol::TerminalMessage;
use crate::pty::MAX_READ_CHUNK;

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// What the input loop should do with one client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Write these bytes to the pty master.
    Forward(Vec<u8>),
    /// Nothing to write (empty frame).
    Skip,
    /// The client asked to close.
    Close,
}

/// Turns client frames into pty input for one session
#[derive(Debug, Clone, Copy)]
pub struct MessageHandler {
    session_id: SessionId,
}

impl MessageHandler {
    pub fn new(session_id: SessionId) -> Self {
        Self { session_id }
    }

    /// Handle a terminal message
    pub fn handle_message(&self, message: TerminalMessage) -> InputAction {
        let bytes = match message {
            TerminalMessage::Text(text) => {
                trace!(session_id = %self.session_id, len = text.len(), "Client text frame");
                text.into_bytes()
            }
            TerminalMessage::Binary(bin) => {
                trace!(session_id = %self.session_id, len = bin.len(), "Client binary frame");
                bin
            }
            TerminalMessage::Close => {
                debug!(session_id = %self.session_id, "Client sent close frame");
                return InputAction::Close;
            }
        };
        if bytes.is_empty() {
            return InputAction::Skip;
        }
        InputAction::Forward(expand_carriage_returns(&bytes))
    }
}

/// Rewrites every bare CR into CR LF.
///
/// A CR already followed by LF inside the same frame is left alone, so a client
/// that sends proper CR LF pairs does not get a doubled line feed.
pub fn expand_carriage_returns(frame: &[u8]) -> Vec<u8> {
    let bare = frame
        .iter()
        .enumerate()
        .filter(|&(i, &b)| b == CR && frame.get(i + 1) != Some(&LF))
        .count();
    if bare == 0 {
        return frame.to_vec();
    }

    let mut out = Vec::with_capacity(frame.len() + bare);
    for (i, &b) in frame.iter().enumerate() {
        out.push(b);
        if b == CR && frame.get(i + 1) != Some(&LF) {
            out.push(LF);
        }
    }
    out
}

// ================ 输出解码 ================

/// Incremental UTF-8 decoder for pty output.
///
/// A multi-byte sequence split across two reads is carried over instead of
/// being replaced, so concatenating the emitted text gives back the shell's
/// output. Only genuinely invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct OutputDecoder {
    pending: Vec<u8>,
}

impl OutputDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many bytes the next read may request so that carried bytes plus the
    /// new read still fit in one chunk.
    pub fn read_capacity(&self) -> usize {
        MAX_READ_CHUNK - self.pending.len()
    }

    /// Decode one read. Returns an empty string when everything was carried.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let mut out = String::with_capacity(input.len());
        let mut rest = input.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // truncated sequence at the end
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush whatever is still carried, lossily. Used once the pty hit EOF.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Splits decoded text into frames of at most `max` bytes on char boundaries.
///
/// Valid output never needs splitting; replacement characters can grow a
/// chunk past the read size.
pub fn split_frames(text: String, max: usize) -> Vec<String> {
    if text.len() <= max {
        return vec![text];
    }
    let mut frames = Vec::new();
    let mut rest = text.as_str();
    while !rest.is_empty() {
        let mut end = rest.len().min(max);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let (head, tail) = rest.split_at(end);
        frames.push(head.to_string());
        rest = tail;
    }
    frames
}
