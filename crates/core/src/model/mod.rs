mod ids;
mod score;
mod session;
mod test_definition;

pub use ids::{ParseIdError, TestId, UserId};
pub use score::{QuestionReview, ScoreReport, Submission};
pub use session::{
    AnswerPolicy, ModuleKey, PersistedSession, QuestionKey, SessionPhase, SessionState,
    SessionStateError, SessionStatus,
};
pub use test_definition::{
    Module, ModuleDraft, Question, QuestionDraft, Section, SectionDraft, TestDefinition,
    TestDefinitionDraft, TestDefinitionError, TestKind,
};
