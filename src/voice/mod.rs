//! Voice processing module
//!
//! Handles the audio side of a session: inbound frame assembly, the WAV
//! container, STT dispatch, ordered TTS synthesis and paced playback.

mod ingest;
mod pacer;
pub mod stt;
mod synth;
pub mod tts;
pub mod wav;

pub use ingest::{END_OF_STREAM, Inbound, IngestBuffer, Utterance};
pub use pacer::{AUDIO_STREAM_END, AUDIO_STREAM_START, AudioSink, Delivery, Pacer, SocketClosed};
pub use stt::{SpeechToText, Transcriber, TranscriptionError, transcribe_utterance};
pub use synth::{ReorderBuffer, ResponseSynthesizer, SynthesisOutcome, TextUnit, split_sentences};
pub use tts::{SpeechSynthesizer, TextToSpeech};
