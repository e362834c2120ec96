//! Results that can succeed with caveats.

/// Result of an operation that completed, possibly after skipping or
/// failing non-essential steps. Hard failures are `Err(CoreError)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Partial { value: T, warnings: Vec<String> },
}

impl<T> Outcome<T> {
    pub fn new(value: T, warnings: Vec<String>) -> Self {
        if warnings.is_empty() {
            Outcome::Success(value)
        } else {
            Outcome::Partial { value, warnings }
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Outcome::Success(value) | Outcome::Partial { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Outcome::Success(value) | Outcome::Partial { value, .. } => value,
        }
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            Outcome::Success(_) => &[],
            Outcome::Partial { warnings, .. } => warnings,
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}
