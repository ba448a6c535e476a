use crate::error::{DbrError, DbrResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token and deadline of one execution call.
#[derive(Debug, Clone, Default)]
pub(crate) struct Guard {
    token: Option<CancellationToken>,
    deadline: Option<(Instant, Duration)>,
}

impl Guard {
    /// The deadline starts counting now.
    pub(crate) fn new(token: Option<&CancellationToken>, timeout: Option<Duration>) -> Self {
        Self {
            token: token.cloned(),
            deadline: timeout.map(|t| (Instant::now() + t, t)),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.token.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Resolves once the token fires or the deadline passes.
    pub(crate) async fn stopped(&self) -> DbrError {
        let cancelled = async {
            match &self.token {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some((at, _)) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            _ = cancelled => DbrError::cancelled("operation cancelled"),
            _ = expired => self.expired(),
        }
    }

    /// Run `fut` unless the token fires or the deadline passes first.
    pub(crate) async fn run<T, F>(&self, fut: F) -> DbrResult<T>
    where
        F: Future<Output = DbrResult<T>>,
    {
        tokio::select! {
            biased;
            err = self.stopped() => Err(err),
            result = fut => result,
        }
    }

    fn expired(&self) -> DbrError {
        match self.deadline {
            Some((_, timeout)) => DbrError::cancelled(format!("deadline of {timeout:?} exceeded")),
            None => DbrError::cancelled("deadline exceeded"),
        }
    }
}
