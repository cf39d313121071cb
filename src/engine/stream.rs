use crate::engine::logging::emit_frame_parse_error;
use crate::types::{MessagePayload, StreamEntry, UpdatePayload};
use anyhow::Result;

/// Incremental decoder for the engine's SSE-style frame stream.
///
/// Frames are `event: <kind>` + `data: <json>` blocks separated by a blank
/// line; a frame may arrive split across any number of byte chunks, so the
/// parser buffers until a complete frame is available.
#[derive(Default)]
pub struct StreamParser {
    buffer: String,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, chunk: &[u8]) -> Result<Vec<StreamEntry>> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        let mut entries = Vec::new();
        let mut start = 0;

        while let Some(end) = self.buffer[start..].find("\n\n") {
            let frame_end = start + end + 2;
            let frame_text = &self.buffer[start..frame_end];

            let mut frame_kind = None;
            let mut data = None;

            for line in frame_text.lines() {
                if let Some(rest) = line.strip_prefix("event: ") {
                    frame_kind = Some(rest.trim().to_string());
                } else if let Some(rest) = line.strip_prefix("data: ") {
                    data = Some(rest.trim().to_string());
                }
            }

            if let (Some(kind), Some(json_data)) = (frame_kind, data) {
                match decode_frame(&kind, &json_data) {
                    Ok(Some(entry)) => entries.push(entry),
                    Ok(None) => {}
                    Err(parse_error) => {
                        emit_frame_parse_error(&kind, &json_data, &parse_error);
                    }
                }
            }

            start = frame_end;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        Ok(entries)
    }

    pub fn flush(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }
}

/// Decode one frame body. Unknown frame kinds are skipped without error.
fn decode_frame(kind: &str, json_data: &str) -> Result<Option<StreamEntry>, serde_json::Error> {
    match kind {
        "messages" => {
            let payload: MessagePayload = serde_json::from_str(json_data)?;
            Ok(Some(StreamEntry::Messages(payload)))
        }
        "updates" => {
            let payload: UpdatePayload = serde_json::from_str(json_data)?;
            Ok(Some(StreamEntry::Updates(payload)))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_frame_kind_is_skipped() {
        let mut parser = StreamParser::new();
        let entries = parser
            .process(b"event: heartbeat\ndata: {}\n\n")
            .expect("heartbeat frames should not fail the parser");
        assert!(entries.is_empty());
    }

    #[test]
    fn test_flush_drains_partial_frame() {
        let mut parser = StreamParser::new();
        parser.process(b"event: updates\ndata: {\"agent\"").expect("partial frame");
        assert_eq!(parser.flush(), "event: updates\ndata: {\"agent\"");
        assert!(parser.flush().is_empty());
    }
}
