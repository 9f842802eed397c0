//! Persisted shapes and their encode/decode functions.
//!
//! The session keeps review flags and strike-outs as sets keyed by composite
//! positions. Stores only ever see the flat, array-based records below;
//! `ProgressRecord::from_state` and `ProgressRecord::into_state` are the single
//! conversion point in both directions.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use prep_core::model::{
    ModuleKey, PersistedSession, SessionPhase, SessionState, SessionStatus, TestId, UserId,
};
use serde::{Deserialize, Serialize};

use crate::repository::StorageError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleAnswersRecord {
    pub section: usize,
    pub module: usize,
    pub answers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFlagsRecord {
    pub section: usize,
    pub module: usize,
    pub questions: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrikeOutRecord {
    pub section: usize,
    pub module: usize,
    pub question: usize,
    pub options: Vec<usize>,
}

/// One resumable snapshot per (user, test).
///
/// `version` is owned by the store: it starts at 1 on insert and increases by
/// one on every accepted save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: UserId,
    pub test_id: TestId,
    pub version: u64,
    pub section_index: usize,
    pub module_index: usize,
    pub question_index: usize,
    pub answers: Vec<ModuleAnswersRecord>,
    pub review_flags: Vec<ModuleFlagsRecord>,
    pub strike_outs: Vec<StrikeOutRecord>,
    pub remaining_seconds: u32,
    pub elapsed_seconds: u32,
    pub status: String,
    pub phase: String,
    pub last_updated: DateTime<Utc>,
}

impl ProgressRecord {
    /// Encode a session; sets become sorted arrays.
    #[must_use]
    pub fn from_state(user_id: UserId, test_id: TestId, state: &SessionState) -> Self {
        let parts = state.to_persisted();

        let answers = parts
            .answers
            .into_iter()
            .map(|(key, answers)| ModuleAnswersRecord {
                section: key.section,
                module: key.module,
                answers,
            })
            .collect();

        let review_flags = parts
            .review_flags
            .into_iter()
            .map(|(key, flags)| ModuleFlagsRecord {
                section: key.section,
                module: key.module,
                questions: flags.into_iter().collect(),
            })
            .collect();

        let strike_outs = parts
            .strike_outs
            .into_iter()
            .map(|(key, options)| StrikeOutRecord {
                section: key.module.section,
                module: key.module.module,
                question: key.question,
                options: options.into_iter().collect(),
            })
            .collect();

        Self {
            user_id,
            test_id,
            version: 0,
            section_index: parts.position.section,
            module_index: parts.position.module,
            question_index: parts.question,
            answers,
            review_flags,
            strike_outs,
            remaining_seconds: parts.remaining_seconds,
            elapsed_seconds: parts.elapsed_seconds,
            status: status_to_str(parts.status).to_string(),
            phase: phase_to_str(parts.phase).to_string(),
            last_updated: parts.last_updated,
        }
    }

    /// Decode back into a session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for unknown status/phase strings or
    /// duplicated module entries.
    pub fn into_state(self) -> Result<SessionState, StorageError> {
        let mut answers = BTreeMap::new();
        for entry in self.answers {
            let key = ModuleKey::new(entry.section, entry.module);
            if answers.insert(key, entry.answers).is_some() {
                return Err(StorageError::Serialization(format!(
                    "duplicate answers for module {key}"
                )));
            }
        }

        let mut review_flags: BTreeMap<ModuleKey, BTreeSet<usize>> = BTreeMap::new();
        for entry in self.review_flags {
            review_flags
                .entry(ModuleKey::new(entry.section, entry.module))
                .or_default()
                .extend(entry.questions);
        }

        let mut strike_outs = BTreeMap::new();
        for entry in self.strike_outs {
            let key = ModuleKey::new(entry.section, entry.module).question(entry.question);
            let options: BTreeSet<usize> = entry.options.into_iter().collect();
            strike_outs.insert(key, options);
        }

        Ok(SessionState::from_persisted(PersistedSession {
            position: ModuleKey::new(self.section_index, self.module_index),
            question: self.question_index,
            answers,
            review_flags,
            strike_outs,
            remaining_seconds: self.remaining_seconds,
            elapsed_seconds: self.elapsed_seconds,
            status: parse_status(&self.status)?,
            phase: parse_phase(&self.phase)?,
            last_updated: self.last_updated,
        }))
    }
}

pub(crate) fn status_to_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::InProgress => "in_progress",
        SessionStatus::Paused => "paused",
        SessionStatus::Completed => "completed",
    }
}

pub(crate) fn parse_status(s: &str) -> Result<SessionStatus, StorageError> {
    match s {
        "in_progress" => Ok(SessionStatus::InProgress),
        "paused" => Ok(SessionStatus::Paused),
        "completed" => Ok(SessionStatus::Completed),
        _ => Err(StorageError::Serialization(format!("invalid status: {s}"))),
    }
}

pub(crate) fn phase_to_str(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Module => "module",
        SessionPhase::Break => "break",
        SessionPhase::AwaitingScore => "awaiting_score",
    }
}

pub(crate) fn parse_phase(s: &str) -> Result<SessionPhase, StorageError> {
    match s {
        "module" => Ok(SessionPhase::Module),
        "break" => Ok(SessionPhase::Break),
        "awaiting_score" => Ok(SessionPhase::AwaitingScore),
        _ => Err(StorageError::Serialization(format!("invalid phase: {s}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prep_core::model::{
        AnswerPolicy, ModuleDraft, QuestionDraft, SectionDraft, TestDefinition,
        TestDefinitionDraft,
    };
    use prep_core::time::fixed_now;

    fn test_def() -> TestDefinition {
        TestDefinitionDraft {
            id: TestId::new(3),
            title: "Encoding".into(),
            kind: Default::default(),
            sections: vec![SectionDraft {
                name: "S".into(),
                break_seconds: 0,
                modules: vec![ModuleDraft {
                    name: "M".into(),
                    timer_seconds: 60,
                    questions: vec![
                        QuestionDraft::new("1", &["A", "B", "C"], "A"),
                        QuestionDraft::new("2", &["A", "B", "C"], "B"),
                        QuestionDraft::new("3", &["A", "B", "C"], "C"),
                    ],
                }],
            }],
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn sets_encode_as_sorted_arrays() {
        let test = test_def();
        let mut state = SessionState::start(&test, fixed_now()).unwrap();
        state.toggle_review(&test, 2).unwrap();
        state.toggle_review(&test, 0).unwrap();
        state.toggle_strike(&test, 1, 2).unwrap();
        state.toggle_strike(&test, 1, 0).unwrap();
        state.answer(&test, 1, "B", AnswerPolicy::Permissive).unwrap();

        let record = ProgressRecord::from_state(UserId::new(1), TestId::new(3), &state);
        assert_eq!(record.review_flags[0].questions, vec![0, 2]);
        assert_eq!(record.strike_outs[0].options, vec![0, 2]);
        assert_eq!(record.status, "in_progress");
        assert_eq!(record.phase, "module");

        let back = record.into_state().unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn unknown_status_is_a_serialization_error() {
        let test = test_def();
        let state = SessionState::start(&test, fixed_now()).unwrap();
        let mut record = ProgressRecord::from_state(UserId::new(1), TestId::new(3), &state);
        record.status = "archived".into();
        assert!(matches!(
            record.into_state(),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn record_survives_json() {
        let test = test_def();
        let state = SessionState::start(&test, fixed_now()).unwrap();
        let record = ProgressRecord::from_state(UserId::new(9), TestId::new(3), &state);
        let json = serde_json::to_string(&record).unwrap();
        let back: ProgressRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
