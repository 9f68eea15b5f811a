//! Cancellable, deadline-carrying context passed to health checks and
//! initialization hooks.
//!
//! A [`Context`] is cheap to clone. Children derived with
//! [`Context::with_timeout`] share the cancellation signal of their parent and
//! never outlive its deadline. Work driven through [`Context::run`] is
//! abandoned (dropped) as soon as the context expires.

use std::fmt;
use std::future::{pending, Future};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Why a context stopped admitting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    DeadlineExceeded,
    Cancelled,
}

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupted::DeadlineExceeded => write!(f, "deadline exceeded"),
            Interrupted::Cancelled => write!(f, "context cancelled"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Trips every [`Context`] cloned from the one returned alongside it.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Context {
            deadline: None,
            cancel: None,
        }
    }

    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Context {
                deadline: None,
                cancel: Some(rx),
            },
            CancelHandle { tx },
        )
    }

    /// Derives a child expiring after `timeout`, or at the parent's deadline
    /// if that comes first. A timeout too large to represent adds no deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = match (self.deadline, Instant::now().checked_add(timeout)) {
            (Some(parent), Some(candidate)) => Some(parent.min(candidate)),
            (parent, candidate) => parent.or(candidate),
        };
        Context {
            deadline,
            cancel: self.cancel.clone(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Returns the reason this context is done, if it already is.
    pub fn err(&self) -> Option<Interrupted> {
        if self.is_cancelled() {
            return Some(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Some(Interrupted::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled. A dropped [`CancelHandle`]
    /// that never fired means the context is never cancelled.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.cancel else {
            return pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return pending().await;
            }
        }
    }

    /// Resolves once the context is done, for either reason.
    pub async fn done(&self) -> Interrupted {
        let expiry = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => pending().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancelled() => Interrupted::Cancelled,
            _ = expiry => Interrupted::DeadlineExceeded,
        }
    }

    /// Drives `fut` to completion unless the context finishes first, in which
    /// case `fut` is dropped.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        if let Some(reason) = self.err() {
            return Err(reason);
        }
        tokio::select! {
            biased;
            reason = self.done() => Err(reason),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn background_runs_to_completion() {
        let ctx = Context::background();
        let out = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                7
            })
            .await;
        assert_eq!(out, Ok(7));
        assert!(ctx.remaining().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_future_is_abandoned_at_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_secs(2));
        let out = ctx.run(pending::<()>()).await;
        assert_eq!(out, Err(Interrupted::DeadlineExceeded));
        assert_eq!(ctx.err(), Some(Interrupted::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn child_never_outlives_parent() {
        let parent = Context::background().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::from_secs(10));
        assert_eq!(child.deadline(), parent.deadline());

        let shorter = parent.with_timeout(Duration::from_millis(100));
        assert!(shorter.deadline() < parent.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_timeout_adds_no_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_secs(u64::MAX));
        assert!(ctx.deadline().is_none());
        assert!(ctx.err().is_none());

        let parent = Context::background().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::MAX);
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_reaches_derived_contexts() {
        let (ctx, handle) = Context::with_cancel();
        let child = ctx.with_timeout(Duration::from_secs(60));

        let task = tokio::spawn(async move { child.run(pending::<()>()).await });
        tokio::task::yield_now().await;
        handle.cancel();

        assert_eq!(task.await.unwrap(), Err(Interrupted::Cancelled));
        assert!(ctx.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_handle_does_not_cancel() {
        let (ctx, handle) = Context::with_cancel();
        drop(handle);
        let ctx = ctx.with_timeout(Duration::from_millis(50));
        assert_eq!(
            ctx.run(pending::<()>()).await,
            Err(Interrupted::DeadlineExceeded)
        );
    }
}
