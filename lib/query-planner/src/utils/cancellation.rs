use std::time::{Duration, Instant};

/// Cancellation signal for planning, optionally bounded by a deadline.
#[derive(Debug, Default, Clone)]
pub struct CancellationToken(tokio_util::sync::CancellationToken, Option<Instant>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(tokio_util::sync::CancellationToken::new(), None)
    }

    pub fn with_timeout(duration: Duration) -> Self {
        let deadline = Instant::now() + duration;
        Self(tokio_util::sync::CancellationToken::new(), Some(deadline))
    }

    /// Wraps an existing token, e.g. the one of the request being planned.
    pub fn from_token(token: tokio_util::sync::CancellationToken, timeout: Option<Duration>) -> Self {
        Self(token, timeout.map(|timeout| Instant::now() + timeout))
    }

    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.bail_if_cancelled().is_err()
    }

    #[inline]
    pub fn bail_if_cancelled(&self) -> Result<(), CancellationError> {
        self.bail_if_timedout()?;

        if self.0.is_cancelled() {
            return Err(CancellationError::Cancelled);
        }

        Ok(())
    }

    fn bail_if_timedout(&self) -> Result<(), CancellationError> {
        if let Some(deadline) = self.1 {
            if deadline <= Instant::now() {
                self.cancel();
                return Err(CancellationError::TimedOut);
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CancellationError {
    #[error("cancelled")]
    Cancelled,
    #[error("timed out")]
    TimedOut,
}
