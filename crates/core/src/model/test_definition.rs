use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::TestId;
use crate::model::session::ModuleKey;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TestDefinitionError {
    #[error("test title cannot be empty")]
    EmptyTitle,

    #[error("test must contain at least one section")]
    NoSections,

    #[error("section {section} has no modules")]
    EmptySection { section: usize },

    #[error("module {module} of section {section} has no questions")]
    EmptyModule { section: usize, module: usize },

    #[error("module {module} of section {section} must have a timer > 0")]
    ZeroTimer { section: usize, module: usize },

    #[error("question {question} in section {section} module {module} has an empty prompt")]
    EmptyPrompt {
        section: usize,
        module: usize,
        question: usize,
    },

    #[error("question {question} in section {section} module {module} needs at least two options")]
    TooFewOptions {
        section: usize,
        module: usize,
        question: usize,
    },

    #[error(
        "correct answer of question {question} in section {section} module {module} is not one of its options"
    )]
    CorrectAnswerNotAnOption {
        section: usize,
        module: usize,
        question: usize,
    },
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

/// Which exam a test is modelled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    #[default]
    Sat,
    Gre,
}

/// Unvalidated, serializable shape of a test as authored by an admin.
///
/// Stores persist drafts and rehydrate through [`TestDefinitionDraft::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDefinitionDraft {
    pub id: TestId,
    pub title: String,
    #[serde(default)]
    pub kind: TestKind,
    pub sections: Vec<SectionDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDraft {
    pub name: String,
    /// Break after this section, in seconds. 0 means no break.
    #[serde(default)]
    pub break_seconds: u32,
    pub modules: Vec<ModuleDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDraft {
    pub name: String,
    pub timer_seconds: u32,
    pub questions: Vec<QuestionDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl QuestionDraft {
    /// Convenience constructor for a question without explanation or image.
    #[must_use]
    pub fn new(
        prompt: impl Into<String>,
        options: &[&str],
        correct_answer: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            options: options.iter().map(|o| (*o).to_string()).collect(),
            correct_answer: correct_answer.into(),
            explanation: None,
            image: None,
        }
    }
}

impl TestDefinitionDraft {
    /// Validate the draft into an immutable [`TestDefinition`].
    ///
    /// # Errors
    ///
    /// Returns `TestDefinitionError` naming the first structural problem found.
    pub fn validate(self) -> Result<TestDefinition, TestDefinitionError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(TestDefinitionError::EmptyTitle);
        }
        if self.sections.is_empty() {
            return Err(TestDefinitionError::NoSections);
        }

        let mut sections = Vec::with_capacity(self.sections.len());
        for (s, section) in self.sections.into_iter().enumerate() {
            if section.modules.is_empty() {
                return Err(TestDefinitionError::EmptySection { section: s });
            }
            let mut modules = Vec::with_capacity(section.modules.len());
            for (m, module) in section.modules.into_iter().enumerate() {
                if module.questions.is_empty() {
                    return Err(TestDefinitionError::EmptyModule { section: s, module: m });
                }
                if module.timer_seconds == 0 {
                    return Err(TestDefinitionError::ZeroTimer { section: s, module: m });
                }
                let mut questions = Vec::with_capacity(module.questions.len());
                for (q, question) in module.questions.into_iter().enumerate() {
                    questions.push(validate_question(question, s, m, q)?);
                }
                modules.push(Module {
                    name: module.name,
                    timer_seconds: module.timer_seconds,
                    questions,
                });
            }
            sections.push(Section {
                name: section.name,
                break_seconds: section.break_seconds,
                modules,
            });
        }

        Ok(TestDefinition {
            id: self.id,
            title,
            kind: self.kind,
            sections,
        })
    }
}

fn validate_question(
    draft: QuestionDraft,
    section: usize,
    module: usize,
    question: usize,
) -> Result<Question, TestDefinitionError> {
    if draft.prompt.trim().is_empty() {
        return Err(TestDefinitionError::EmptyPrompt {
            section,
            module,
            question,
        });
    }
    if draft.options.len() < 2 {
        return Err(TestDefinitionError::TooFewOptions {
            section,
            module,
            question,
        });
    }
    // Compared by value, exactly as scoring compares answers.
    if !draft.options.iter().any(|o| *o == draft.correct_answer) {
        return Err(TestDefinitionError::CorrectAnswerNotAnOption {
            section,
            module,
            question,
        });
    }

    Ok(Question {
        prompt: draft.prompt,
        options: draft.options,
        correct_answer: draft.correct_answer,
        explanation: normalize_optional(draft.explanation),
        image: normalize_optional(draft.image),
    })
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

//
// ─── VALIDATED DEFINITION ──────────────────────────────────────────────────────
//

/// A validated test: sections → modules → questions. Immutable during a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDefinition {
    id: TestId,
    title: String,
    kind: TestKind,
    sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    break_seconds: u32,
    modules: Vec<Module>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    name: String,
    timer_seconds: u32,
    questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    prompt: String,
    options: Vec<String>,
    correct_answer: String,
    explanation: Option<String>,
    image: Option<String>,
}

impl TestDefinition {
    #[must_use]
    pub fn id(&self) -> TestId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn kind(&self) -> TestKind {
        self.kind
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    #[must_use]
    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    #[must_use]
    pub fn module(&self, key: ModuleKey) -> Option<&Module> {
        self.sections
            .get(key.section)
            .and_then(|s| s.modules.get(key.module))
    }

    /// Total number of questions across every module.
    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.module_keys()
            .filter_map(|key| self.module(key))
            .map(|m| m.questions.len())
            .sum()
    }

    /// Every module position in section → module order.
    pub fn module_keys(&self) -> impl Iterator<Item = ModuleKey> + '_ {
        self.sections.iter().enumerate().flat_map(|(s, section)| {
            (0..section.modules.len()).map(move |m| ModuleKey::new(s, m))
        })
    }

    /// Convert back into the serializable draft shape.
    #[must_use]
    pub fn to_draft(&self) -> TestDefinitionDraft {
        TestDefinitionDraft {
            id: self.id,
            title: self.title.clone(),
            kind: self.kind,
            sections: self
                .sections
                .iter()
                .map(|s| SectionDraft {
                    name: s.name.clone(),
                    break_seconds: s.break_seconds,
                    modules: s
                        .modules
                        .iter()
                        .map(|m| ModuleDraft {
                            name: m.name.clone(),
                            timer_seconds: m.timer_seconds,
                            questions: m
                                .questions
                                .iter()
                                .map(|q| QuestionDraft {
                                    prompt: q.prompt.clone(),
                                    options: q.options.clone(),
                                    correct_answer: q.correct_answer.clone(),
                                    explanation: q.explanation.clone(),
                                    image: q.image.clone(),
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

impl Section {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn break_seconds(&self) -> u32 {
        self.break_seconds
    }

    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }
}

impl Module {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn timer_seconds(&self) -> u32 {
        self.timer_seconds
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }
}

impl Question {
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    #[must_use]
    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|o| o == value)
    }
}
