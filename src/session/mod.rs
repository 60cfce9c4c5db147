//! Per-connection session state
//!
//! A [`Session`] is owned by exactly one connection task. It holds the ingest
//! buffer, the conversation context and the liveness flag, and is torn down at
//! most once.

mod registry;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use uuid::Uuid;

pub use registry::{SessionHandle, SessionRegistry};

use crate::voice::IngestBuffer;

/// Where a session is in its request cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket accepted, welcome not yet played
    Connected,
    /// Collecting frames
    Listening,
    /// End marker received, utterance being transcribed
    Flushing,
    /// Streaming a response
    Responding,
    Closed,
}

/// Who said a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One line of conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Bounded conversation context of one session
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
    max_turns: usize,
}

impl Conversation {
    #[must_use]
    pub const fn new(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns,
        }
    }

    /// Turns so far, oldest first
    #[must_use]
    pub fn history(&self) -> &[Turn] {
        &self.turns
    }

    /// Record a question and its answer, dropping the oldest turns over the cap
    pub fn record_exchange(&mut self, question: &str, answer: &str) {
        self.turns.push(Turn::user(question));
        self.turns.push(Turn::assistant(answer));
        if self.turns.len() > self.max_turns {
            let excess = self.turns.len() - self.max_turns;
            self.turns.drain(..excess);
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Heartbeat bookkeeping shared between a session and its heartbeat task
///
/// Detection only: a stale session is reported, not closed.
#[derive(Debug, Default)]
pub struct Liveness {
    awaiting_pong: AtomicBool,
    stale: AtomicBool,
}

impl Liveness {
    /// A pong arrived
    pub fn record_pong(&self) {
        self.awaiting_pong.store(false, Ordering::Release);
        self.stale.store(false, Ordering::Release);
    }

    /// A ping is about to be sent; returns true if the previous one went unanswered
    pub fn tick(&self) -> bool {
        let missed = self.awaiting_pong.swap(true, Ordering::AcqRel);
        if missed {
            self.stale.store(true, Ordering::Release);
        }
        missed
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.stale.load(Ordering::Acquire)
    }
}

/// State owned by one device connection
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub state: SessionState,
    pub ingest: IngestBuffer,
    pub conversation: Conversation,
    pub liveness: Arc<Liveness>,
    torn_down: bool,
}

impl Session {
    #[must_use]
    pub fn new(ingest: IngestBuffer, max_history_turns: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Connected,
            ingest,
            conversation: Conversation::new(max_history_turns),
            liveness: Arc::new(Liveness::default()),
            torn_down: false,
        }
    }

    /// Release buffered audio and context; returns false if already torn down
    pub fn teardown(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;
        self.ingest.clear();
        self.conversation.clear();
        self.state = SessionState::Closed;
        tracing::debug!(session_id = %self.id, "session torn down");
        true
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.torn_down
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}
