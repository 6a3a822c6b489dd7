use crate::envelope::CheckError;

/// An error during the verification of a token.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("jwt failed check: {0}")]
    Check(#[source] CheckError),

    #[error("invalid token audience")]
    InvalidAudience,

    #[error("token time is not valid")]
    TimeNotValid,
}
