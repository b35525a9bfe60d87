use thiserror::Error;

#[derive(Debug, Error)]
pub enum GrouperError {
    #[error("Grouping gap must be positive, got {0}s")]
    ZeroGap(u64),
    #[error("Grouping gap out of range: {0}s")]
    GapOutOfRange(u64),
}

pub type Result<T> = std::result::Result<T, GrouperError>;
