//! Structured engine events.
//!
//! Coarse lifecycle events for operators, separate from the per-game event
//! log. Written as JSONL with a sequence number per emitter.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::game::types::{ActionKind, ActorId, Alignment, ArenaId, Phase};

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete engine event, tagged with `"type"` on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A game left setup.
    GameStarted {
        /// When it started.
        timestamp: DateTime<Utc>,
        /// Hosting arena.
        arena: ArenaId,
        /// Game id.
        game_id: Uuid,
        /// Mode id.
        mode: String,
        /// Seated players.
        players: usize,
        /// RNG seed.
        seed: u64,
    },

    /// A playable phase began.
    PhaseEntered {
        /// When it began.
        timestamp: DateTime<Utc>,
        /// Hosting arena.
        arena: ArenaId,
        /// Phase entered.
        phase: Phase,
        /// Its cycle.
        cycle: u32,
        /// When it ends on its own.
        deadline: Option<DateTime<Utc>>,
    },

    /// A submission was turned down.
    SubmissionRejected {
        /// When it was refused.
        timestamp: DateTime<Utc>,
        /// Hosting arena.
        arena: ArenaId,
        /// Submitter.
        actor: ActorId,
        /// Requested kind.
        kind: ActionKind,
        /// Rejection label.
        reason: &'static str,
    },

    /// A phase was resolved.
    ResolutionCompleted {
        /// Resolution instant.
        timestamp: DateTime<Utc>,
        /// Hosting arena.
        arena: ArenaId,
        /// Phase resolved.
        phase: Phase,
        /// Its cycle.
        cycle: u32,
        /// Records appended.
        records: usize,
        /// Records marked void.
        voided: usize,
    },

    /// A game reached its end.
    GameEnded {
        /// When it ended.
        timestamp: DateTime<Utc>,
        /// Hosting arena.
        arena: ArenaId,
        /// Game id.
        game_id: Uuid,
        /// Winning alignment.
        winner: Alignment,
        /// Last cycle played.
        cycles: u32,
    },
}

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Serialization and I/O failures are dropped; a broken event sink never
/// stops a game.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Discards everything.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Writes to a file at `path`, truncating it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits one event as a JSONL line.
    pub fn emit(&self, event: Event) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope { sequence, event };

        if let Ok(mut w) = self.writer.lock()
            && let Ok(line) = serde_json::to_string(&envelope)
        {
            let _ = writeln!(w, "{line}");
            let _ = w.flush();
        }
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::noop()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    #[derive(Clone)]
    struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        fn new() -> Self {
            Self(Arc::new(StdMutex::new(Vec::new())))
        }

        fn lines(&self) -> Vec<serde_json::Value> {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf)
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-12-24T18:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn envelope_is_flat_and_sequenced() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(Event::PhaseEntered {
            timestamp: ts(),
            arena: "general".into(),
            phase: Phase::Night,
            cycle: 0,
            deadline: None,
        });
        emitter.emit(Event::SubmissionRejected {
            timestamp: ts(),
            arena: "general".into(),
            actor: "bob".into(),
            kind: ActionKind::Shoot,
            reason: "not_permitted",
        });

        assert_eq!(emitter.event_count(), 2);
        let lines = tw.lines();
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[0]["type"], "PhaseEntered");
        assert_eq!(lines[0]["phase"], "night");
        assert!(lines[0].get("event").is_none());
        assert_eq!(lines[1]["sequence"], 1);
        assert_eq!(lines[1]["kind"], "shoot");
        assert_eq!(lines[1]["reason"], "not_permitted");
    }

    #[test]
    fn game_events_carry_ids() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(Event::GameEnded {
            timestamp: ts(),
            arena: "general".into(),
            game_id: id,
            winner: Alignment::Baddie,
            cycles: 3,
        })
        .unwrap();
        assert_eq!(json["type"], "GameEnded");
        assert_eq!(json["game_id"], id.to_string());
        assert_eq!(json["winner"], "baddie");
    }

    #[test]
    fn noop_counts_but_writes_nothing() {
        let emitter = EventEmitter::noop();
        emitter.emit(Event::ResolutionCompleted {
            timestamp: ts(),
            arena: "a".into(),
            phase: Phase::Day,
            cycle: 1,
            records: 4,
            voided: 0,
        });
        assert_eq!(emitter.event_count(), 1);
    }
}
