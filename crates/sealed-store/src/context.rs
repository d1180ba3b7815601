use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use rusqlite::Connection;

use crate::StoreError;

/// Shared cancellation signal; clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Execution context for one call chain: the caller's connection (or
/// transaction) plus an optional deadline and cancellation flag.
///
/// Every blocking store or crypto step checks [`Ctx::ensure_active`] first.
#[derive(Debug, Clone)]
pub struct Ctx<'c> {
    conn: &'c Connection,
    deadline: Option<Instant>,
    cancel: Option<CancelFlag>,
}

impl<'c> Ctx<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            deadline: None,
            cancel: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn conn(&self) -> &'c Connection {
        self.conn
    }

    pub fn ensure_active(&self) -> Result<(), StoreError> {
        if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
            return Err(StoreError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(StoreError::DeadlineExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_is_active() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(Ctx::new(&conn).ensure_active().is_ok());
    }

    #[test]
    fn cancelled_context_stops() {
        let conn = Connection::open_in_memory().unwrap();
        let flag = CancelFlag::new();
        let ctx = Ctx::new(&conn).with_cancel(flag.clone());
        flag.cancel();
        assert!(matches!(ctx.ensure_active(), Err(StoreError::Cancelled)));
    }

    #[test]
    fn expired_deadline_stops() {
        let conn = Connection::open_in_memory().unwrap();
        let ctx = Ctx::new(&conn).with_deadline(Instant::now());
        assert!(matches!(
            ctx.ensure_active(),
            Err(StoreError::DeadlineExceeded)
        ));
    }
}
