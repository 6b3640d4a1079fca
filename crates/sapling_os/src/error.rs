#![forbid(unsafe_code)]

use sapling_engines::slug::SlugAllocError;
use sapling_kernel_contracts::ContractViolation;
use sapling_storage::petition_store::StorageError;

/// Failures surfaced to callers. `NotFound` covers both a missing petition and a caller
/// who may not see it; the two are never told apart.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PetitionError {
    #[error("validation failed: {0}")]
    Validation(ContractViolation),
    #[error("unable to allocate a unique slug after {attempts} attempts")]
    ConflictExhausted { attempts: u32 },
    #[error("petition not found")]
    NotFound,
    #[error("authentication required")]
    Unauthenticated,
    #[error("{message}")]
    Integration {
        message: &'static str,
        detail: Option<String>,
    },
    #[error("internal error: {0}")]
    Internal(&'static str),
    #[error("storage failure: {0}")]
    Store(StorageError),
}

impl PetitionError {
    pub fn integration(message: &'static str, detail: Option<String>) -> Self {
        PetitionError::Integration { message, detail }
    }
}

impl From<ContractViolation> for PetitionError {
    fn from(v: ContractViolation) -> Self {
        PetitionError::Validation(v)
    }
}

impl From<StorageError> for PetitionError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::ContractViolation(v) => PetitionError::Validation(v),
            other => PetitionError::Store(other),
        }
    }
}

impl From<SlugAllocError<StorageError>> for PetitionError {
    fn from(e: SlugAllocError<StorageError>) -> Self {
        match e {
            SlugAllocError::ConflictExhausted { attempts } => {
                PetitionError::ConflictExhausted { attempts }
            }
            SlugAllocError::InvalidCandidate(v) => PetitionError::Validation(v),
            SlugAllocError::Store(e) => e.into(),
        }
    }
}
