//! Ordered-parallel response synthesis
//!
//! A response is split into sentences, every sentence is synthesized at once,
//! and the finished segments are released strictly in sentence order through a
//! [`ReorderBuffer`]. A sentence whose synthesis fails is skipped without
//! holding up the ones after it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use super::pacer::{AudioSink, Pacer};
use super::tts::SpeechSynthesizer;
use super::wav;
use crate::error::with_timeout;

/// One sentence of a response and its playback position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    pub index: usize,
    pub text: String,
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '?' | '!')
}

/// Split text into sentences on `.`, `?` and `!`
///
/// Punctuation stays with its sentence and runs like `...` or `?!` end a single
/// sentence. A period between two digits is a decimal point, not a boundary.
/// Fragments without any letter or digit are dropped; indices stay dense.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<TextUnit> {
    let chars: Vec<char> = text.chars().collect();
    let mut units = Vec::new();
    let mut current = String::new();

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        current.push(c);

        let decimal = c == '.'
            && i > 0
            && chars[i - 1].is_ascii_digit()
            && chars.get(i + 1).is_some_and(char::is_ascii_digit);

        if is_terminal(c) && !decimal {
            while chars.get(i + 1).copied().is_some_and(is_terminal) {
                i += 1;
                current.push(chars[i]);
            }
            push_unit(&mut units, &mut current);
        }
        i += 1;
    }
    push_unit(&mut units, &mut current);
    units
}

fn push_unit(units: &mut Vec<TextUnit>, current: &mut String) {
    let text = current.trim();
    if text.chars().any(char::is_alphanumeric) {
        units.push(TextUnit {
            index: units.len(),
            text: text.to_string(),
        });
    }
    current.clear();
}

/// Releases items in index order, whatever order they arrive in
///
/// Each index in `0..len` arrives at most once, either as a value or as `None`
/// for a failed unit. Failed units are skipped when the cursor reaches them.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    pending: BTreeMap<usize, Option<T>>,
    next: usize,
    len: usize,
    skipped: usize,
}

impl<T> ReorderBuffer<T> {
    /// Buffer for indices `0..len`
    #[must_use]
    pub const fn new(len: usize) -> Self {
        Self {
            pending: BTreeMap::new(),
            next: 0,
            len,
            skipped: 0,
        }
    }

    /// Record the arrival of `index` and return every item now ready, in order
    ///
    /// Out-of-range and duplicate indices are ignored.
    pub fn insert(&mut self, index: usize, item: Option<T>) -> Vec<T> {
        if index < self.next || index >= self.len || self.pending.contains_key(&index) {
            tracing::warn!(index, next = self.next, len = self.len, "ignoring unexpected unit");
            return Vec::new();
        }
        self.pending.insert(index, item);

        let mut ready = Vec::new();
        while let Some(slot) = self.pending.remove(&self.next) {
            match slot {
                Some(item) => ready.push(item),
                None => self.skipped += 1,
            }
            self.next += 1;
        }
        ready
    }

    /// Give up on units that never arrived and release everything held
    ///
    /// Missing units count as skipped.
    pub fn finish(&mut self) -> Vec<T> {
        let mut ready = Vec::new();
        while self.next < self.len {
            match self.pending.remove(&self.next) {
                Some(Some(item)) => ready.push(item),
                Some(None) | None => self.skipped += 1,
            }
            self.next += 1;
        }
        ready
    }

    /// Index the cursor is waiting for
    #[must_use]
    pub const fn next_index(&self) -> usize {
        self.next
    }

    /// Units skipped so far
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    /// Whether every unit has been released or skipped
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.next >= self.len
    }
}

/// How a spoken response ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisOutcome {
    /// At least one segment was streamed and the response was closed
    Completed { emitted: usize, skipped: usize },
    /// No unit produced audio; nothing was sent
    NothingSynthesized,
    /// The client went away mid-response
    Interrupted,
}

/// Turns response text into ordered, paced audio
pub struct ResponseSynthesizer {
    tts: Arc<dyn SpeechSynthesizer>,
    unit_timeout: Duration,
}

impl ResponseSynthesizer {
    #[must_use]
    pub fn new(tts: Arc<dyn SpeechSynthesizer>, unit_timeout: Duration) -> Self {
        Self { tts, unit_timeout }
    }

    /// Synthesize `text` sentence by sentence and stream it to `sink`
    ///
    /// Sentences are synthesized concurrently on spawned tasks. The start
    /// marker is sent just before the first segment, so a response where every
    /// unit failed leaves the sink untouched. If the sink closes, outstanding
    /// calls are left to finish and their audio is dropped.
    pub async fn speak(
        &self,
        text: &str,
        sink: &mut dyn AudioSink,
        pacer: &Pacer,
    ) -> SynthesisOutcome {
        let units = split_sentences(text);
        if units.is_empty() {
            tracing::debug!("response has no speakable text");
            return SynthesisOutcome::NothingSynthesized;
        }
        tracing::debug!(units = units.len(), "synthesizing response");

        let mut reorder = ReorderBuffer::new(units.len());
        let mut tasks = JoinSet::new();
        for unit in units {
            let tts = Arc::clone(&self.tts);
            let budget = self.unit_timeout;
            tasks.spawn(async move {
                let audio = with_timeout("tts", budget, tts.synthesize(&unit.text)).await;
                (unit.index, audio)
            });
        }

        let mut emitter = Emitter {
            sink,
            pacer,
            started: false,
            emitted: 0,
        };

        while let Some(joined) = tasks.join_next().await {
            let (index, audio) = match joined {
                Ok(done) => done,
                Err(e) => {
                    // the index is lost with the task; finish() accounts for it
                    tracing::warn!(error = %e, "synthesis task failed");
                    continue;
                }
            };

            let segment = match audio {
                Ok(audio) => Some(audio),
                Err(e) => {
                    tracing::warn!(index, error = %e, "skipping unit");
                    None
                }
            };

            for ready in reorder.insert(index, segment) {
                if !emitter.emit(&ready).await {
                    tasks.detach_all();
                    return SynthesisOutcome::Interrupted;
                }
            }
        }

        for ready in reorder.finish() {
            if !emitter.emit(&ready).await {
                return SynthesisOutcome::Interrupted;
            }
        }

        if !emitter.started {
            return SynthesisOutcome::NothingSynthesized;
        }
        if emitter.pacer.finish(emitter.sink).await.is_err() {
            return SynthesisOutcome::Interrupted;
        }

        tracing::debug!(emitted = emitter.emitted, skipped = reorder.skipped(), "response spoken");
        SynthesisOutcome::Completed {
            emitted: emitter.emitted,
            skipped: reorder.skipped(),
        }
    }
}

/// Streams segments, opening the response on the first one
struct Emitter<'a> {
    sink: &'a mut dyn AudioSink,
    pacer: &'a Pacer,
    started: bool,
    emitted: usize,
}

impl Emitter<'_> {
    /// Returns false once the sink has closed
    async fn emit(&mut self, segment: &[u8]) -> bool {
        if !self.started {
            if self.pacer.begin(self.sink).await.is_err() {
                return false;
            }
            self.started = true;
        }
        let pcm = wav::pcm_payload(segment);
        if self.pacer.stream(self.sink, pcm).await.is_err() {
            return false;
        }
        self.emitted += 1;
        true
    }
}
