//! Readiness detection for backends whose "wait for data" primitive is itself
//! asynchronous.
//!
//! On Windows, `WaitCommEvent` on an overlapped handle may not finish within
//! the call that issued it, so answering "is a byte ready?" without blocking
//! takes a completion context that outlives a single `poll`. `WaitState` owns
//! that context and never issues a second wait while one is outstanding.

use std::fmt;
use std::io;

/// Outcome of issuing a wait.
pub enum WaitStart<P> {
    /// The wait finished inside the call; `true` if data arrived.
    Completed(bool),
    /// The wait is outstanding; its context must be kept alive.
    Pending(P),
}

/// The OS operations `WaitState` drives.
pub trait EventSource {
    /// Completion context of an outstanding wait.
    type Pending;

    /// Bytes already sitting in the receive queue.
    fn queued_bytes(&mut self) -> io::Result<usize>;

    /// Issue a new "notify me when a byte arrives" wait.
    fn start_wait(&mut self) -> io::Result<WaitStart<Self::Pending>>;

    /// Check an outstanding wait without blocking.
    ///
    /// `Ok(None)` while it is still in flight, `Ok(Some(ready))` once it finished.
    fn check_wait(&mut self, pending: &mut Self::Pending) -> io::Result<Option<bool>>;

    /// Abort an outstanding wait and reap it so its context may be freed.
    fn abandon(&mut self, pending: Self::Pending);
}

/// Idle, or waiting on exactly one outstanding context.
pub enum WaitState<P> {
    Idle,
    WaitPending(P),
}

impl<P> Default for WaitState<P> {
    fn default() -> Self {
        WaitState::Idle
    }
}

impl<P> fmt::Debug for WaitState<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitState::Idle => f.write_str("Idle"),
            WaitState::WaitPending(_) => f.write_str("WaitPending"),
        }
    }
}

impl<P> WaitState<P> {
    pub fn is_pending(&self) -> bool {
        matches!(self, WaitState::WaitPending(_))
    }

    /// Whether a read would return data now.
    ///
    /// Queued bytes answer immediately. Otherwise an idle state issues a wait
    /// (reporting `false` unless it completed on the spot) and a pending state
    /// checks its wait, dropping the context once it has finished.
    pub fn poll<S>(&mut self, source: &mut S) -> io::Result<bool>
    where
        S: EventSource<Pending = P>,
    {
        if source.queued_bytes()? > 0 {
            return Ok(true);
        }

        match std::mem::replace(self, WaitState::Idle) {
            WaitState::Idle => match source.start_wait()? {
                WaitStart::Completed(ready) => Ok(ready),
                WaitStart::Pending(pending) => {
                    *self = WaitState::WaitPending(pending);
                    Ok(false)
                }
            },
            WaitState::WaitPending(mut pending) => match source.check_wait(&mut pending)? {
                None => {
                    *self = WaitState::WaitPending(pending);
                    Ok(false)
                }
                Some(ready) => Ok(ready),
            },
        }
    }

    /// Abort and release any outstanding wait.
    pub fn cancel<S>(&mut self, source: &mut S)
    where
        S: EventSource<Pending = P>,
    {
        if let WaitState::WaitPending(pending) = std::mem::replace(self, WaitState::Idle) {
            source.abandon(pending);
        }
    }
}
