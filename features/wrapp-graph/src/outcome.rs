use crate::errors::ResolveError;

/// Result of a synchronous graph operation
///
/// Merges return an [Outcome] instead of panicking, so callers can branch on the failure.
pub type Outcome<T> = Result<T, ResolveError>;

/// Builds an [Outcome] - success if a value is given, the failure otherwise
pub fn make_outcome<T>(success: Option<T>, failure: ResolveError) -> Outcome<T> {
    match success {
        Some(value) => Ok(value),
        None => Err(failure),
    }
}

/// Unwrap-or-raise for outcomes
pub trait OrThrow<T> {
    /// Returns the success value
    ///
    /// # Panics
    /// With the failure's message if the outcome is a failure
    fn or_throw(self) -> T;
}
impl<T> OrThrow<T> for Outcome<T> {
    #[track_caller]
    fn or_throw(self) -> T {
        match self {
            Ok(value) => value,
            Err(failure) => panic!("{failure}"),
        }
    }
}
