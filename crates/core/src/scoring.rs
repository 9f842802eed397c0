//! Grading of a flattened answer list.
//!
//! Answers are compared to the correct option by exact string value. Slots that
//! are empty or missing count as incorrect.

use crate::model::{QuestionReview, ScoreReport, TestDefinition};

/// Grade `answers` (section → module → question order) against `test`.
///
/// Extra trailing answers beyond the test's question count are ignored.
#[must_use]
pub fn grade(test: &TestDefinition, answers: &[String], time_taken_secs: u32) -> ScoreReport {
    let mut reviews = Vec::with_capacity(test.total_questions());
    let mut slots = answers.iter();

    for key in test.module_keys() {
        let Some(module) = test.module(key) else {
            continue;
        };
        for (index, question) in module.questions().iter().enumerate() {
            let selected = slots.next().cloned().unwrap_or_default();
            let is_correct = !selected.is_empty() && selected == question.correct_answer();
            reviews.push(QuestionReview {
                key: key.question(index),
                prompt: question.prompt().to_string(),
                selected,
                correct_answer: question.correct_answer().to_string(),
                is_correct,
                explanation: question.explanation().map(ToString::to_string),
            });
        }
    }

    let score = u32::try_from(reviews.iter().filter(|r| r.is_correct).count()).unwrap_or(u32::MAX);
    let total_questions = u32::try_from(reviews.len()).unwrap_or(u32::MAX);

    ScoreReport {
        score,
        total_questions,
        percentage: percentage(score, total_questions),
        time_taken_secs,
        reviews,
    }
}

/// Percentage rounded to two decimals; 0 for an empty test.
#[must_use]
pub fn percentage(score: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = f64::from(score) * 100.0 / f64::from(total);
    (raw * 100.0).round() / 100.0
}
