use std::fmt::Display;

/// Log the error side of a result and keep going.
pub trait LogError {
    fn log_error(self, context: &str) -> Self;
}

impl<T, E> LogError for Result<T, E>
where
    E: Display,
{
    fn log_error(self, context: &str) -> Self {
        if let Some(e) = self.as_ref().err() {
            tracing::error!(error = %e, "{}", context);
        }
        self
    }
}
