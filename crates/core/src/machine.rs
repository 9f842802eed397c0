//! Transitions of the test-taking session.
//!
//! Every transition is local and synchronous. Time only moves through
//! [`SessionState::tick`] and [`SessionState::break_tick`], which a single
//! external scheduler calls once per second; navigation never touches timers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::model::{
    AnswerPolicy, ModuleKey, SessionPhase, SessionState, SessionStateError, SessionStatus,
    TestDefinition,
};
use crate::time::elapsed_whole_seconds;

/// Where `submit_module` (or the end of a break) moved the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    NextModule(ModuleKey),
    BreakStarted { seconds: u32 },
    NextSection(ModuleKey),
    /// Every module is submitted; the attempt can be finalized.
    ReadyToFinalize,
}

/// Result of one timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running { remaining: u32 },
    /// The module countdown hit zero; the caller runs `on_timer_expired`.
    Expired,
    /// A break ended and the session moved on.
    Advanced(Transition),
}

/// Per-question status of the current module, for the pre-submit review grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionStatus {
    pub index: usize,
    pub answered: bool,
    pub flagged: bool,
    pub struck: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOverview {
    pub key: ModuleKey,
    pub questions: Vec<QuestionStatus>,
    pub answered: usize,
    pub flagged: usize,
    pub remaining_seconds: u32,
}

impl SessionState {
    /// Fresh session at the first module of `test`.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::PositionOutOfRange` if the test has no first module.
    pub fn start(test: &TestDefinition, now: DateTime<Utc>) -> Result<Self, SessionStateError> {
        let mut state = Self {
            position: ModuleKey::new(0, 0),
            question: 0,
            answers: BTreeMap::new(),
            review_flags: BTreeMap::new(),
            strike_outs: BTreeMap::new(),
            remaining_seconds: 0,
            elapsed_seconds: 0,
            status: SessionStatus::InProgress,
            phase: SessionPhase::Module,
            last_updated: now,
        };
        state.enter_module(test, ModuleKey::new(0, 0))?;
        Ok(state)
    }

    /// Restore a saved session at `now`.
    ///
    /// An in-progress snapshot loses the wall-clock time since `last_updated`
    /// (floored, clamped at zero). A paused snapshot keeps its countdown and
    /// becomes in-progress again. Completed snapshots come back unchanged.
    #[must_use]
    pub fn resume(saved: &SessionState, now: DateTime<Utc>) -> SessionState {
        let mut state = saved.clone();
        match saved.status {
            SessionStatus::Completed => return state,
            SessionStatus::Paused => {
                state.status = SessionStatus::InProgress;
            }
            SessionStatus::InProgress => {
                let away = elapsed_whole_seconds(saved.last_updated, now);
                match saved.phase {
                    SessionPhase::Module => {
                        let consumed = away.min(saved.remaining_seconds);
                        state.remaining_seconds = saved.remaining_seconds - consumed;
                        state.elapsed_seconds = saved.elapsed_seconds.saturating_add(consumed);
                    }
                    SessionPhase::Break => {
                        state.remaining_seconds = saved.remaining_seconds.saturating_sub(away);
                    }
                    SessionPhase::AwaitingScore => {}
                }
            }
        }
        state.last_updated = now;
        state
    }

    /// Check the state fits `test` and create the current module's slots if absent.
    ///
    /// # Errors
    ///
    /// Returns `PositionOutOfRange` or `AnswerSlotMismatch` when the saved state
    /// was built against a different test layout.
    pub fn reconcile(&mut self, test: &TestDefinition) -> Result<(), SessionStateError> {
        for (key, slots) in &self.answers {
            let module = test
                .module(*key)
                .ok_or(SessionStateError::PositionOutOfRange { key: *key })?;
            if slots.len() != module.question_count() {
                return Err(SessionStateError::AnswerSlotMismatch {
                    key: *key,
                    expected: module.question_count(),
                    actual: slots.len(),
                });
            }
        }
        let module = test
            .module(self.position)
            .ok_or(SessionStateError::PositionOutOfRange { key: self.position })?;
        if self.question >= module.question_count() {
            self.question = 0;
        }
        self.init_slots(test, self.position)
    }

    /// True when the countdown already hit zero and the expiry path must run.
    #[must_use]
    pub fn needs_expiry(&self) -> bool {
        self.status == SessionStatus::InProgress
            && self.remaining_seconds == 0
            && matches!(self.phase, SessionPhase::Module | SessionPhase::Break)
    }

    //
    // ─── ANSWERS / MARKERS ─────────────────────────────────────────────────────
    //

    /// Set the answer of `question` in the current module, overwriting any prior value.
    ///
    /// # Errors
    ///
    /// Fails when the session is not accepting input, the index is out of
    /// range, or `policy` rejects the value.
    pub fn answer(
        &mut self,
        test: &TestDefinition,
        question: usize,
        value: impl Into<String>,
        policy: AnswerPolicy,
    ) -> Result<(), SessionStateError> {
        self.ensure_phase(SessionPhase::Module)?;
        let value = value.into();
        let len = self.current_len(test)?;
        if question >= len {
            return Err(SessionStateError::QuestionOutOfRange { index: question, len });
        }
        if policy == AnswerPolicy::MatchOption && !value.is_empty() {
            let known = test
                .module(self.position)
                .and_then(|m| m.questions().get(question))
                .is_some_and(|q| q.has_option(&value));
            if !known {
                return Err(SessionStateError::InvalidAnswer { question, value });
            }
        }
        self.init_slots(test, self.position)?;
        if let Some(slot) = self
            .answers
            .get_mut(&self.position)
            .and_then(|slots| slots.get_mut(question))
        {
            *slot = value;
        }
        Ok(())
    }

    /// Reset `question` in the current module to unanswered.
    ///
    /// # Errors
    ///
    /// Same as [`SessionState::answer`].
    pub fn clear_answer(
        &mut self,
        test: &TestDefinition,
        question: usize,
    ) -> Result<(), SessionStateError> {
        self.answer(test, question, String::new(), AnswerPolicy::Permissive)
    }

    /// Flip the review flag of `question`; returns whether it is now flagged.
    ///
    /// # Errors
    ///
    /// Fails when the session is not accepting input or the index is out of range.
    pub fn toggle_review(
        &mut self,
        test: &TestDefinition,
        question: usize,
    ) -> Result<bool, SessionStateError> {
        self.ensure_phase(SessionPhase::Module)?;
        let len = self.current_len(test)?;
        if question >= len {
            return Err(SessionStateError::QuestionOutOfRange { index: question, len });
        }
        let flags = self.review_flags.entry(self.position).or_default();
        if flags.remove(&question) {
            Ok(false)
        } else {
            flags.insert(question);
            Ok(true)
        }
    }

    /// Flip the strike-out of `option` on `question`; returns whether it is now struck.
    ///
    /// Strike-outs are advisory: a struck option can still be answered.
    ///
    /// # Errors
    ///
    /// Fails when the session is not accepting input or either index is out of range.
    pub fn toggle_strike(
        &mut self,
        test: &TestDefinition,
        question: usize,
        option: usize,
    ) -> Result<bool, SessionStateError> {
        self.ensure_phase(SessionPhase::Module)?;
        let module = test
            .module(self.position)
            .ok_or(SessionStateError::PositionOutOfRange { key: self.position })?;
        let q = module
            .questions()
            .get(question)
            .ok_or(SessionStateError::QuestionOutOfRange {
                index: question,
                len: module.question_count(),
            })?;
        if option >= q.options().len() {
            return Err(SessionStateError::OptionOutOfRange {
                index: option,
                len: q.options().len(),
            });
        }

        let key = self.position.question(question);
        let struck = self.strike_outs.entry(key).or_default();
        let now_struck = if struck.remove(&option) {
            false
        } else {
            struck.insert(option);
            true
        };
        if struck.is_empty() {
            self.strike_outs.remove(&key);
        }
        Ok(now_struck)
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────────
    //

    /// Move the cursor to `question` of the current module.
    ///
    /// # Errors
    ///
    /// Returns `QuestionOutOfRange` for an invalid index.
    pub fn go_to_question(
        &mut self,
        test: &TestDefinition,
        question: usize,
    ) -> Result<(), SessionStateError> {
        self.ensure_phase(SessionPhase::Module)?;
        let len = self.current_len(test)?;
        if question >= len {
            return Err(SessionStateError::QuestionOutOfRange { index: question, len });
        }
        self.question = question;
        Ok(())
    }

    /// Advance the cursor, stopping at the last question. Returns the new index.
    ///
    /// # Errors
    ///
    /// Fails when the session is not accepting input.
    pub fn next_question(&mut self, test: &TestDefinition) -> Result<usize, SessionStateError> {
        self.ensure_phase(SessionPhase::Module)?;
        let len = self.current_len(test)?;
        if self.question + 1 < len {
            self.question += 1;
        }
        Ok(self.question)
    }

    /// Move the cursor back, stopping at the first question. Returns the new index.
    ///
    /// # Errors
    ///
    /// Fails when the session is not accepting input.
    pub fn previous_question(&mut self) -> Result<usize, SessionStateError> {
        self.ensure_phase(SessionPhase::Module)?;
        self.question = self.question.saturating_sub(1);
        Ok(self.question)
    }

    //
    // ─── TIMERS ────────────────────────────────────────────────────────────────
    //

    /// One second of module time.
    ///
    /// # Errors
    ///
    /// Fails outside an in-progress module phase.
    pub fn tick(&mut self) -> Result<TickOutcome, SessionStateError> {
        self.ensure_phase(SessionPhase::Module)?;
        if self.remaining_seconds > 0 {
            self.remaining_seconds -= 1;
            self.elapsed_seconds = self.elapsed_seconds.saturating_add(1);
        }
        if self.remaining_seconds == 0 {
            Ok(TickOutcome::Expired)
        } else {
            Ok(TickOutcome::Running {
                remaining: self.remaining_seconds,
            })
        }
    }

    /// Module time ran out: submit with whatever answers exist.
    ///
    /// # Errors
    ///
    /// Same as [`SessionState::submit_module`].
    pub fn on_timer_expired(
        &mut self,
        test: &TestDefinition,
    ) -> Result<Transition, SessionStateError> {
        self.remaining_seconds = 0;
        self.submit_module(test)
    }

    /// One second of break time; moves on when the break is over.
    ///
    /// # Errors
    ///
    /// Fails outside an in-progress break.
    pub fn break_tick(&mut self, test: &TestDefinition) -> Result<TickOutcome, SessionStateError> {
        self.ensure_phase(SessionPhase::Break)?;
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            return self.advance_section(test).map(TickOutcome::Advanced);
        }
        Ok(TickOutcome::Running {
            remaining: self.remaining_seconds,
        })
    }

    /// End the break early and move to the next section.
    ///
    /// # Errors
    ///
    /// Fails outside an in-progress break.
    pub fn skip_break(&mut self, test: &TestDefinition) -> Result<Transition, SessionStateError> {
        self.ensure_phase(SessionPhase::Break)?;
        self.advance_section(test)
    }

    //
    // ─── PROGRESSION ───────────────────────────────────────────────────────────
    //

    /// Submit the current module and move to whatever comes next.
    ///
    /// Unanswered slots stay empty. A break is only entered when another
    /// section follows.
    ///
    /// # Errors
    ///
    /// Fails outside an in-progress module phase or when the position is not in `test`.
    pub fn submit_module(&mut self, test: &TestDefinition) -> Result<Transition, SessionStateError> {
        self.ensure_phase(SessionPhase::Module)?;
        let position = self.position;
        let section = test
            .section(position.section)
            .ok_or(SessionStateError::PositionOutOfRange { key: position })?;
        self.init_slots(test, position)?;

        if position.module + 1 < section.modules().len() {
            let next = ModuleKey::new(position.section, position.module + 1);
            self.enter_module(test, next)?;
            return Ok(Transition::NextModule(next));
        }

        let has_next_section = position.section + 1 < test.sections().len();
        if has_next_section && section.break_seconds() > 0 {
            self.phase = SessionPhase::Break;
            self.remaining_seconds = section.break_seconds();
            return Ok(Transition::BreakStarted {
                seconds: section.break_seconds(),
            });
        }

        self.advance_section(test)
    }

    /// Status becomes paused; the countdown is kept as is.
    ///
    /// # Errors
    ///
    /// Returns `Completed` for a finished session.
    pub fn pause(&mut self) -> Result<(), SessionStateError> {
        match self.status {
            SessionStatus::Completed => Err(SessionStateError::Completed),
            SessionStatus::Paused | SessionStatus::InProgress => {
                self.status = SessionStatus::Paused;
                Ok(())
            }
        }
    }

    /// Every answer in section → module → question order; missing slots are empty.
    #[must_use]
    pub fn flatten_answers(&self, test: &TestDefinition) -> Vec<String> {
        let mut flat = Vec::with_capacity(test.total_questions());
        for key in test.module_keys() {
            let count = test.module(key).map_or(0, |m| m.question_count());
            let slots = self.answers.get(&key);
            for q in 0..count {
                flat.push(
                    slots
                        .and_then(|s| s.get(q))
                        .cloned()
                        .unwrap_or_default(),
                );
            }
        }
        flat
    }

    /// Terminal transition once scoring confirmed the submission.
    ///
    /// # Errors
    ///
    /// Fails unless every module has been submitted.
    pub fn mark_completed(&mut self) -> Result<(), SessionStateError> {
        self.ensure_phase(SessionPhase::AwaitingScore)?;
        self.status = SessionStatus::Completed;
        Ok(())
    }

    /// Answered / flagged grid of the current module.
    #[must_use]
    pub fn module_overview(&self, test: &TestDefinition) -> ModuleOverview {
        let key = self.position;
        let count = test.module(key).map_or(0, |m| m.question_count());
        let answers = self.answers.get(&key);
        let questions: Vec<QuestionStatus> = (0..count)
            .map(|index| QuestionStatus {
                index,
                answered: answers
                    .and_then(|a| a.get(index))
                    .is_some_and(|v| !v.is_empty()),
                flagged: self.is_flagged(key, index),
                struck: self
                    .struck_options(key.question(index))
                    .map_or(0, |s| s.len()),
            })
            .collect();

        ModuleOverview {
            key,
            answered: questions.iter().filter(|q| q.answered).count(),
            flagged: questions.iter().filter(|q| q.flagged).count(),
            questions,
            remaining_seconds: self.remaining_seconds,
        }
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    fn ensure_phase(&self, expected: SessionPhase) -> Result<(), SessionStateError> {
        match self.status {
            SessionStatus::Completed => return Err(SessionStateError::Completed),
            SessionStatus::Paused => return Err(SessionStateError::Paused),
            SessionStatus::InProgress => {}
        }
        if self.phase != expected {
            return Err(SessionStateError::WrongPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn current_len(&self, test: &TestDefinition) -> Result<usize, SessionStateError> {
        test.module(self.position)
            .map(|m| m.question_count())
            .ok_or(SessionStateError::PositionOutOfRange { key: self.position })
    }

    fn advance_section(&mut self, test: &TestDefinition) -> Result<Transition, SessionStateError> {
        let next_section = self.position.section + 1;
        if next_section < test.sections().len() {
            let key = ModuleKey::new(next_section, 0);
            self.enter_module(test, key)?;
            return Ok(Transition::NextSection(key));
        }
        self.phase = SessionPhase::AwaitingScore;
        self.remaining_seconds = 0;
        self.question = 0;
        Ok(Transition::ReadyToFinalize)
    }

    fn enter_module(&mut self, test: &TestDefinition, key: ModuleKey) -> Result<(), SessionStateError> {
        let module = test
            .module(key)
            .ok_or(SessionStateError::PositionOutOfRange { key })?;
        self.init_slots(test, key)?;
        self.position = key;
        self.question = 0;
        self.phase = SessionPhase::Module;
        self.remaining_seconds = module.timer_seconds();
        Ok(())
    }

    // Create-if-absent: existing answers are never reset.
    fn init_slots(&mut self, test: &TestDefinition, key: ModuleKey) -> Result<(), SessionStateError> {
        let expected = test
            .module(key)
            .ok_or(SessionStateError::PositionOutOfRange { key })?
            .question_count();
        let slots = self
            .answers
            .entry(key)
            .or_insert_with(|| vec![String::new(); expected]);
        if slots.len() != expected {
            return Err(SessionStateError::AnswerSlotMismatch {
                key,
                expected,
                actual: slots.len(),
            });
        }
        self.review_flags.entry(key).or_default();
        Ok(())
    }
}
