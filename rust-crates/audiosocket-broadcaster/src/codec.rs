//! Newline-delimited JSON framing.
//!
//! One event per line. `serde_json` escapes control characters inside
//! strings, so an encoded frame never contains a raw `\n` before its
//! terminator.

use serde_json::Value;

use crate::error::{FrameError, Result};
use crate::events::Event;

/// Serialize an event to a single `\n` terminated line
pub fn encode_frame(event: &Event) -> Result<String> {
    let json = serde_json::to_string(&event.to_fields())?;
    Ok(format!("{}\n", json))
}

/// Decode a single line (without its terminator)
pub fn decode_line(line: &str) -> std::result::Result<Event, FrameError> {
    let malformed = |reason: String| FrameError::Malformed {
        line: line.to_string(),
        reason,
    };

    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(fields)) => {
            Event::from_fields(&fields, None).map_err(|e| malformed(e.to_string()))
        }
        Ok(_) => Err(malformed("not a JSON object".to_string())),
        Err(e) => Err(malformed(e.to_string())),
    }
}

/// Incremental decoder for a byte stream of frames.
///
/// Bytes after the last newline stay buffered until a later read completes
/// the line, so frames may be split across reads at any byte offset.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return every frame completed by them, in order.
    ///
    /// Blank lines are skipped. A line that fails to decode is returned as
    /// an `Err` in its position; the lines after it are unaffected.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<std::result::Result<Event, FrameError>> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            if let Some(frame) = Self::decode_raw(&self.buffer[start..end]) {
                frames.push(frame);
            }
            start = end + 1;
        }
        self.buffer.drain(..start);

        frames
    }

    /// Bytes of an incomplete trailing line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn decode_raw(raw: &[u8]) -> Option<std::result::Result<Event, FrameError>> {
        match std::str::from_utf8(raw) {
            Ok(text) => {
                let line = text.trim();
                (!line.is_empty()).then(|| decode_line(line))
            }
            Err(e) => Some(Err(FrameError::Malformed {
                line: String::from_utf8_lossy(raw).trim().to_string(),
                reason: e.to_string(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_events() -> Vec<Event> {
        vec![
            Event::point(2498).with_delay(30).with_timestamp(1_700_000_000_000),
            Event::area(8145, 40, 52, 10)
                .with_source_name("Sol Heredit")
                .with_source_animation(10883)
                .with_extra("soundFile", json!("line\nbreak.ogg")),
            Event::other("MUSIC_TRACK", 12),
        ]
    }

    fn stream() -> Vec<u8> {
        sample_events()
            .iter()
            .map(|e| encode_frame(e).unwrap())
            .collect::<String>()
            .into_bytes()
    }

    fn ok_events(frames: Vec<std::result::Result<Event, FrameError>>) -> Vec<Event> {
        frames.into_iter().map(|f| f.unwrap()).collect()
    }

    #[test]
    fn test_encode_single_line() {
        for event in sample_events() {
            let frame = encode_frame(&event).unwrap();
            assert!(frame.ends_with('\n'));
            assert_eq!(frame.matches('\n').count(), 1);
            assert_eq!(decode_line(frame.trim_end()).unwrap(), event);
        }
    }

    #[test]
    fn test_encode_uses_plugin_field_names() {
        let frame = encode_frame(&Event::point(2498)).unwrap();
        assert!(frame.contains("\"type\":\"SOUND_EFFECT\""));
        assert!(frame.contains("\"soundId\":2498"));
        assert!(frame.contains("\"delay\":0"));
    }

    #[test]
    fn test_many_frames_in_one_read() {
        let mut decoder = FrameDecoder::new();
        let events = ok_events(decoder.decode(&stream()));
        assert_eq!(events, sample_events());
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_split_invariance() {
        let bytes = stream();
        for split in 0..=bytes.len() {
            let mut decoder = FrameDecoder::new();
            let mut frames = decoder.decode(&bytes[..split]);
            frames.extend(decoder.decode(&bytes[split..]));
            assert_eq!(ok_events(frames), sample_events(), "split at {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for byte in stream() {
            frames.extend(decoder.decode(&[byte]));
        }
        assert_eq!(ok_events(frames), sample_events());
    }

    #[test]
    fn test_empty_read_and_partial_frame() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.decode(b"").is_empty());
        assert!(decoder.decode(b"{\"type\":\"SOUND_EFFECT\",").is_empty());
        assert!(decoder.pending() > 0);

        let frames = decoder.decode(b"\"soundId\":5}\n");
        assert_eq!(ok_events(frames), vec![Event::point(5)]);
    }

    #[test]
    fn test_malformed_line_does_not_stop_stream() {
        let mut decoder = FrameDecoder::new();
        let mut bytes = b"not json at all\n".to_vec();
        bytes.extend_from_slice(b"[1,2,3]\n");
        bytes.extend_from_slice(b"  \r\n");
        bytes.extend(stream());

        let frames = decoder.decode(&bytes);
        assert_eq!(frames.len(), 2 + sample_events().len());

        match &frames[0] {
            Err(FrameError::Malformed { line, .. }) => assert_eq!(line, "not json at all"),
            other => panic!("expected malformed frame, got {:?}", other),
        }
        assert!(frames[1].is_err());
        assert_eq!(ok_events(frames[2..].to_vec()), sample_events());
    }

    #[test]
    fn test_frame_without_sound_id_is_malformed() {
        assert!(decode_line(r#"{"type":"SOUND_EFFECT"}"#).is_err());
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.decode(b"\xff\xfe\n{\"type\":\"SOUND_EFFECT\",\"soundId\":1}\n");
        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_err());
        assert_eq!(frames[1].as_ref().unwrap(), &Event::point(1));
    }
}
