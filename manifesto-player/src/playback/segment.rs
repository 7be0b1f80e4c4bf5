//! Segment: one unit of generated, playable content plus its source text

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::io::Cursor;
use std::time::Duration;

const WAV_DATA_URI_PREFIX: &str = "data:audio/wav;base64,";

/// Opaque reference to playable content
///
/// Usually a URL or a `data:` URI returned by the generation service. The
/// scheduler never looks inside; sinks may.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PayloadRef(String);

impl PayloadRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// True for inline base64 WAV payloads
    pub fn is_wav_data_uri(&self) -> bool {
        self.0.starts_with(WAV_DATA_URI_PREFIX)
    }

    /// Exact duration of an inline WAV payload
    ///
    /// Returns `None` when the payload is not a WAV data URI or cannot be
    /// decoded. Only the header is parsed; samples are never read.
    pub fn wav_duration(&self) -> Option<Duration> {
        let encoded = self.0.strip_prefix(WAV_DATA_URI_PREFIX)?;
        let bytes = STANDARD.decode(encoded.trim()).ok()?;
        let reader = hound::WavReader::new(Cursor::new(bytes)).ok()?;
        let sample_rate = reader.spec().sample_rate;
        if sample_rate == 0 {
            return None;
        }
        let frames = reader.duration() as u64;
        Some(Duration::from_micros(frames * 1_000_000 / sample_rate as u64))
    }
}

impl std::fmt::Display for PayloadRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Data URIs can be megabytes long
        if self.0.len() > 64 {
            let cut = self.0.char_indices().nth(48).map(|(i, _)| i).unwrap_or(self.0.len());
            write!(f, "{}... ({} bytes)", &self.0[..cut], self.0.len())
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Identity of a segment as seen by a playback sink
///
/// Sinks echo the cue back in their completion events so the scheduler can
/// drop events that belong to a slot's previous occupant or to an earlier
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cue {
    pub epoch: u64,
    pub sequence_index: u64,
}

/// Generated segment
///
/// Immutable once created. Owned by the queue until handed to a buffer
/// slot, then owned by that slot until played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    payload: PayloadRef,
    script_text: String,
    sequence_index: u64,
    epoch: u64,
}

impl Segment {
    pub fn new(
        payload: PayloadRef,
        script_text: impl Into<String>,
        sequence_index: u64,
        epoch: u64,
    ) -> Self {
        Self {
            payload,
            script_text: script_text.into(),
            sequence_index,
            epoch,
        }
    }

    pub fn payload(&self) -> &PayloadRef {
        &self.payload
    }

    pub fn script_text(&self) -> &str {
        &self.script_text
    }

    /// Position in generation order (= play order) within its session
    pub fn sequence_index(&self) -> u64 {
        self.sequence_index
    }

    /// Session epoch that produced this segment
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn cue(&self) -> Cue {
        Cue {
            epoch: self.epoch,
            sequence_index: self.sequence_index,
        }
    }

    /// Rough spoken duration of the script at `words_per_minute`
    pub fn estimated_duration(&self, words_per_minute: u32) -> Duration {
        let words = self.script_text.split_whitespace().count() as u64;
        let wpm = words_per_minute.max(1) as u64;
        Duration::from_millis(words * 60_000 / wpm)
    }
}
