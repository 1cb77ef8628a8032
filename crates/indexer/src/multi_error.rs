//! Joining independent failures from a fan-out step into one error.

use std::fmt;

/// Two or more independent failures, in the order they were recorded.
#[derive(Debug)]
pub struct MultiError<E>(Vec<E>);

impl<E> MultiError<E> {
    #[must_use]
    pub fn errors(&self) -> &[E] {
        &self.0
    }

    #[must_use]
    pub fn into_errors(self) -> Vec<E> {
        self.0
    }
}

impl<E: fmt::Display> fmt::Display for MultiError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("multiple errors:")?;
        for err in &self.0 {
            write!(f, "\n\t{err}")?;
        }
        Ok(())
    }
}

impl<E: std::error::Error> std::error::Error for MultiError<E> {}

/// Combine fan-out results. No failures yields `Ok(())`, a single failure is
/// returned unchanged, two or more become a [`MultiError`].
pub fn combine<E, I>(results: I) -> Result<(), E>
where
    I: IntoIterator<Item = Result<(), E>>,
    E: From<MultiError<E>>,
{
    let mut errors: Vec<E> = results.into_iter().filter_map(Result::err).collect();
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(MultiError(errors).into()),
    }
}

/// Accumulates failures of sibling operations without short-circuiting.
#[derive(Debug)]
pub struct ErrorAggregator<E> {
    errors: Vec<E>,
}

impl<E> Default for ErrorAggregator<E> {
    fn default() -> Self {
        Self { errors: Vec::new() }
    }
}

impl<E> ErrorAggregator<E>
where
    E: From<MultiError<E>>,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: E) {
        self.errors.push(err);
    }

    /// Record the failure of `result`, if any, and hand back its value.
    pub fn capture<T>(&mut self, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.errors.push(err);
                None
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), E> {
        combine(self.errors.into_iter().map(Err))
    }
}
