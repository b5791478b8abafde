//! Server-sent event framing for the directory's event stream.

use serde::Deserialize;

use super::{DirectoryError, EventSourceError};
use crate::models::{ActualInstanceRecord, ChangeEvent, DirectoryEvent};

/// One `event:`/`data:` block from the stream
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Upper bound on buffered bytes that do not yet form a complete frame
pub const DEFAULT_MAX_PENDING_BYTES: usize = 1024 * 1024;

/// Incremental splitter: feed raw chunks, take complete frames out
///
/// Buffers bytes rather than text so a chunk boundary inside a multi-byte character is harmless.
#[derive(Debug)]
pub struct SseBuffer {
    pending: Vec<u8>,
    /// Prefix of `pending` already searched without finding a frame terminator
    scanned: usize,
    max_pending: usize,
}

impl Default for SseBuffer {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_PENDING_BYTES)
    }
}

impl SseBuffer {
    pub fn with_limit(max_pending: usize) -> Self {
        Self {
            pending: Vec::new(),
            scanned: 0,
            max_pending,
        }
    }

    /// Append a chunk.
    ///
    /// Fails, discarding the buffered bytes, when an unterminated frame grows past the limit.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), EventSourceError> {
        self.pending
            .extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        if self.pending.len() > self.max_pending && self.find_terminator().is_none() {
            self.pending.clear();
            self.scanned = 0;
            return Err(EventSourceError::Stream(format!(
                "event frame exceeds {} bytes",
                self.max_pending
            )));
        }
        Ok(())
    }

    /// Next complete frame, skipping comment-only and empty blocks
    pub fn next_frame(&mut self) -> Option<SseFrame> {
        while let Some(end) = self.find_terminator() {
            let block: Vec<u8> = self.pending.drain(..end + 2).collect();
            self.scanned = 0;
            if let Some(frame) = parse_frame(&String::from_utf8_lossy(&block)) {
                return Some(frame);
            }
        }
        None
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn find_terminator(&mut self) -> Option<usize> {
        // Step back one byte so a terminator split across chunks is still found
        let start = self.scanned.saturating_sub(1);
        match self.pending[start..].windows(2).position(|w| w == b"\n\n") {
            Some(offset) => Some(start + offset),
            None => {
                self.scanned = self.pending.len();
                None
            }
        }
    }
}

pub fn parse_frame(block: &str) -> Option<SseFrame> {
    let mut frame = SseFrame::default();
    let mut data_lines = Vec::new();

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => frame.event = value.to_string(),
            "data" => data_lines.push(value),
            _ => {}
        }
    }

    if frame.event.is_empty() && data_lines.is_empty() {
        return None;
    }
    frame.data = data_lines.join("\n");
    Some(frame)
}

#[derive(Deserialize)]
struct RecordPayload {
    actual_lrp: ActualInstanceRecord,
}

/// Decode a frame; unknown event names yield `Ok(None)`
pub fn decode_event(frame: &SseFrame) -> Result<Option<DirectoryEvent>, DirectoryError> {
    let decode_err = |e: serde_json::Error| {
        DirectoryError::Decode(format!("{} payload: {e}", frame.event))
    };

    let event = match frame.event.as_str() {
        "actual_lrp_created" => {
            let payload: RecordPayload = serde_json::from_str(&frame.data).map_err(decode_err)?;
            DirectoryEvent::ActualInstanceCreated(payload.actual_lrp)
        }
        "actual_lrp_changed" => {
            let change: ChangeEvent = serde_json::from_str(&frame.data).map_err(decode_err)?;
            DirectoryEvent::ActualInstanceChanged(change)
        }
        "actual_lrp_removed" => {
            let payload: RecordPayload = serde_json::from_str(&frame.data).map_err(decode_err)?;
            DirectoryEvent::ActualInstanceRemoved(payload.actual_lrp)
        }
        _ => return Ok(None),
    };

    Ok(Some(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InstanceState;

    const RECORD: &str = r#"{"process_guid":"guid","index":0,"domain":"cf-apps","instance_guid":"ig","state":"RUNNING","crash_count":0,"since":"2024-01-01T00:00:00Z"}"#;

    #[test]
    fn test_frames_split_across_chunks() {
        let mut buffer = SseBuffer::default();
        buffer.push(b"event: actual_lrp_cre").unwrap();
        assert!(buffer.next_frame().is_none());

        buffer.push(b"ated\r\ndata: {\"a\":1}\r\n\r\n: keepalive\n\nevent: x\ndata: 1\ndata: 2\n\n")
            .unwrap();
        assert_eq!(
            buffer.next_frame(),
            Some(SseFrame {
                event: "actual_lrp_created".to_string(),
                data: "{\"a\":1}".to_string(),
            })
        );
        assert_eq!(
            buffer.next_frame(),
            Some(SseFrame {
                event: "x".to_string(),
                data: "1\n2".to_string(),
            })
        );
        assert!(buffer.next_frame().is_none());
    }

    #[test]
    fn test_terminator_split_across_pushes() {
        let mut buffer = SseBuffer::default();
        buffer.push(b"event: x\ndata: 1\n").unwrap();
        assert!(buffer.next_frame().is_none());

        buffer.push(b"\nevent: y\ndata: 2\n\n").unwrap();
        assert_eq!(buffer.next_frame().map(|f| f.event), Some("x".to_string()));
        assert_eq!(buffer.next_frame().map(|f| f.event), Some("y".to_string()));
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn test_oversized_frame_is_rejected_and_buffer_recovers() {
        let mut buffer = SseBuffer::with_limit(64);
        buffer.push(b"event: x\ndata: ").unwrap();

        let result = buffer.push(&[b'a'; 80]);
        assert!(matches!(result, Err(EventSourceError::Stream(_))));
        assert_eq!(buffer.pending_len(), 0);

        buffer.push(b"event: y\ndata: ok\n\n").unwrap();
        assert_eq!(
            buffer.next_frame(),
            Some(SseFrame {
                event: "y".to_string(),
                data: "ok".to_string(),
            })
        );
    }

    #[test]
    fn test_complete_frames_may_exceed_limit_in_one_chunk() {
        let mut buffer = SseBuffer::with_limit(16);
        buffer
            .push(b"event: first\ndata: 1\n\nevent: second\ndata: 2\n\n")
            .unwrap();
        assert_eq!(buffer.next_frame().map(|f| f.event), Some("first".to_string()));
        assert_eq!(buffer.next_frame().map(|f| f.event), Some("second".to_string()));
    }

    #[test]
    fn test_decode_changed_event() {
        let frame = SseFrame {
            event: "actual_lrp_changed".to_string(),
            data: format!(r#"{{"before":{RECORD},"after":{RECORD}}}"#),
        };
        match decode_event(&frame).unwrap() {
            Some(DirectoryEvent::ActualInstanceChanged(change)) => {
                assert_eq!(change.after.state, InstanceState::Running);
                assert_eq!(change.before.instance_guid, "ig");
            }
            other => panic!("unexpected decode {other:?}"),
        }
    }

    #[test]
    fn test_decode_created_event() {
        let frame = SseFrame {
            event: "actual_lrp_created".to_string(),
            data: format!(r#"{{"actual_lrp":{RECORD}}}"#),
        };
        assert!(matches!(
            decode_event(&frame).unwrap(),
            Some(DirectoryEvent::ActualInstanceCreated(_))
        ));
    }

    #[test]
    fn test_unknown_event_is_skipped() {
        let frame = SseFrame {
            event: "desired_lrp_changed".to_string(),
            data: "{}".to_string(),
        };
        assert_eq!(decode_event(&frame).unwrap(), None);
    }

    #[test]
    fn test_malformed_payload_is_decode_error() {
        let frame = SseFrame {
            event: "actual_lrp_changed".to_string(),
            data: "not json".to_string(),
        };
        assert!(matches!(
            decode_event(&frame),
            Err(DirectoryError::Decode(_))
        ));
    }
}
