use thiserror::Error;

use crate::model::{SessionStateError, TestDefinitionError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Definition(#[from] TestDefinitionError),
    #[error(transparent)]
    Session(#[from] SessionStateError),
}
