use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── KEYS ──────────────────────────────────────────────────────────────────────
//

/// Location of a module within a test: `(section, module)`.
///
/// Also serves as the session position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleKey {
    pub section: usize,
    pub module: usize,
}

impl ModuleKey {
    #[must_use]
    pub const fn new(section: usize, module: usize) -> Self {
        Self { section, module }
    }

    #[must_use]
    pub const fn question(self, question: usize) -> QuestionKey {
        QuestionKey {
            module: self,
            question,
        }
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section, self.module)
    }
}

/// Location of a single question: `(section, module, question)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionKey {
    pub module: ModuleKey,
    pub question: usize,
}

//
// ─── STATUS / PHASE ────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Paused,
    Completed,
}

/// What the countdown is currently measuring.
///
/// A break keeps `SessionStatus::InProgress`; it only suspends the module timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Module,
    Break,
    /// Every module has been submitted; waiting for scoring to confirm.
    AwaitingScore,
}

/// How strictly `answer` checks the submitted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerPolicy {
    /// Any string is accepted.
    #[default]
    Permissive,
    /// The value must equal one of the question's options (or be empty to clear).
    MatchOption,
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("session already completed")]
    Completed,

    #[error("session is paused")]
    Paused,

    #[error("expected phase {expected:?}, session is in {actual:?}")]
    WrongPhase {
        expected: SessionPhase,
        actual: SessionPhase,
    },

    #[error("question index {index} out of range (module has {len})")]
    QuestionOutOfRange { index: usize, len: usize },

    #[error("option index {index} out of range (question has {len})")]
    OptionOutOfRange { index: usize, len: usize },

    #[error("{value:?} is not an option of question {question}")]
    InvalidAnswer { question: usize, value: String },

    #[error("position {key} does not exist in the test")]
    PositionOutOfRange { key: ModuleKey },

    #[error("module {key} stores {actual} answers but has {expected} questions")]
    AnswerSlotMismatch {
        key: ModuleKey,
        expected: usize,
        actual: usize,
    },
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Mutable state of one user's attempt at one test.
///
/// Transitions live in [`crate::machine`]; this type only holds data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub(crate) position: ModuleKey,
    pub(crate) question: usize,
    pub(crate) answers: BTreeMap<ModuleKey, Vec<String>>,
    pub(crate) review_flags: BTreeMap<ModuleKey, BTreeSet<usize>>,
    pub(crate) strike_outs: BTreeMap<QuestionKey, BTreeSet<usize>>,
    pub(crate) remaining_seconds: u32,
    pub(crate) elapsed_seconds: u32,
    pub(crate) status: SessionStatus,
    pub(crate) phase: SessionPhase,
    pub(crate) last_updated: DateTime<Utc>,
}

/// Plain parts of a persisted session, handed over by store adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSession {
    pub position: ModuleKey,
    pub question: usize,
    pub answers: BTreeMap<ModuleKey, Vec<String>>,
    pub review_flags: BTreeMap<ModuleKey, BTreeSet<usize>>,
    pub strike_outs: BTreeMap<QuestionKey, BTreeSet<usize>>,
    pub remaining_seconds: u32,
    pub elapsed_seconds: u32,
    pub status: SessionStatus,
    pub phase: SessionPhase,
    pub last_updated: DateTime<Utc>,
}

impl SessionState {
    /// Rehydrate a session from persisted storage.
    ///
    /// Structural consistency with a test definition is checked separately by
    /// `SessionState::reconcile`.
    #[must_use]
    pub fn from_persisted(parts: PersistedSession) -> Self {
        Self {
            position: parts.position,
            question: parts.question,
            answers: parts.answers,
            review_flags: parts.review_flags,
            strike_outs: parts.strike_outs,
            remaining_seconds: parts.remaining_seconds,
            elapsed_seconds: parts.elapsed_seconds,
            status: parts.status,
            phase: parts.phase,
            last_updated: parts.last_updated,
        }
    }

    /// Snapshot the state into plain parts for persistence.
    #[must_use]
    pub fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            position: self.position,
            question: self.question,
            answers: self.answers.clone(),
            review_flags: self.review_flags.clone(),
            strike_outs: self.strike_outs.clone(),
            remaining_seconds: self.remaining_seconds,
            elapsed_seconds: self.elapsed_seconds,
            status: self.status,
            phase: self.phase,
            last_updated: self.last_updated,
        }
    }

    #[must_use]
    pub fn position(&self) -> ModuleKey {
        self.position
    }

    /// Navigation cursor within the current module.
    #[must_use]
    pub fn current_question(&self) -> usize {
        self.question
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    /// Module time consumed so far; break time is not counted.
    #[must_use]
    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed_seconds
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn is_on_break(&self) -> bool {
        self.phase == SessionPhase::Break
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    #[must_use]
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    #[must_use]
    pub fn answers(&self, key: ModuleKey) -> Option<&[String]> {
        self.answers.get(&key).map(Vec::as_slice)
    }

    /// Answers of the module at the current position.
    #[must_use]
    pub fn current_answers(&self) -> &[String] {
        self.answers(self.position).unwrap_or_default()
    }

    #[must_use]
    pub fn is_flagged(&self, key: ModuleKey, question: usize) -> bool {
        self.review_flags
            .get(&key)
            .is_some_and(|flags| flags.contains(&question))
    }

    #[must_use]
    pub fn review_flags(&self, key: ModuleKey) -> Option<&BTreeSet<usize>> {
        self.review_flags.get(&key)
    }

    #[must_use]
    pub fn struck_options(&self, key: QuestionKey) -> Option<&BTreeSet<usize>> {
        self.strike_outs.get(&key)
    }

    #[must_use]
    pub fn is_struck(&self, key: QuestionKey, option: usize) -> bool {
        self.strike_outs
            .get(&key)
            .is_some_and(|struck| struck.contains(&option))
    }

    /// Record the time this state was last persisted or reconciled.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn persisted_parts_round_trip() {
        let key = ModuleKey::new(1, 0);
        let mut flags = BTreeMap::new();
        flags.insert(key, BTreeSet::from([2, 0]));
        let mut strikes = BTreeMap::new();
        strikes.insert(key.question(2), BTreeSet::from([3]));

        let parts = PersistedSession {
            position: key,
            question: 2,
            answers: BTreeMap::from([(key, vec!["A".into(), String::new(), "C".into()])]),
            review_flags: flags,
            strike_outs: strikes,
            remaining_seconds: 42,
            elapsed_seconds: 8,
            status: SessionStatus::Paused,
            phase: SessionPhase::Module,
            last_updated: fixed_now(),
        };

        let state = SessionState::from_persisted(parts.clone());
        assert_eq!(state.current_answers(), ["A", "", "C"]);
        assert!(state.is_flagged(key, 0));
        assert!(!state.is_flagged(key, 1));
        assert!(state.is_struck(key.question(2), 3));
        assert_eq!(state.to_persisted(), parts);
    }

    #[test]
    fn module_key_orders_by_section_then_module() {
        let mut keys = vec![ModuleKey::new(1, 0), ModuleKey::new(0, 1), ModuleKey::new(0, 0)];
        keys.sort();
        assert_eq!(
            keys,
            vec![ModuleKey::new(0, 0), ModuleKey::new(0, 1), ModuleKey::new(1, 0)]
        );
        assert_eq!(ModuleKey::new(2, 3).to_string(), "2.3");
    }
}
