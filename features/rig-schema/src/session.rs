use std::{cell::RefCell, collections::HashMap, fmt::Debug, marker::PhantomData, sync::Arc};

use parking_lot::Mutex;

use crate::{engine::Engine, errors::SchemaError};

type AfterCommit = Box<dyn FnOnce() + Send>;

/// A session handed out to everyone working on a schema within one [SessionContext]
pub type SharedSession = Arc<Mutex<Session>>;

thread_local! {
    static CONTEXTS: RefCell<Vec<HashMap<String, SharedSession>>> = const { RefCell::new(Vec::new()) };
}

/// A unit of work against one engine
///
/// Statements are buffered until [commit](Session::commit). Callbacks
/// registered with [call_after_commit](Session::call_after_commit) run once
/// the next commit succeeded and are dropped on rollback or close.
pub struct Session {
    engine: Arc<dyn Engine>,
    statements: Vec<String>,
    after_commit: Vec<AfterCommit>,
    closed: bool,
}
impl Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("url", &self.engine.url())
            .field("statements", &self.statements.len())
            .field("after_commit", &self.after_commit.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl Session {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Session {
            engine,
            statements: Vec::new(),
            after_commit: Vec::new(),
            closed: false,
        }
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    pub fn execute(&mut self, statement: impl Into<String>) -> Result<(), SchemaError> {
        if self.closed {
            return Err(SchemaError::SessionClosed);
        }
        self.statements.push(statement.into());
        Ok(())
    }

    pub fn call_after_commit(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.after_commit.push(Box::new(callback));
    }

    /// Commits buffered statements, then runs the after commit callbacks
    ///
    /// On failure statements and callbacks are kept until the session is rolled back.
    pub fn commit(&mut self) -> Result<(), SchemaError> {
        if self.closed {
            return Err(SchemaError::SessionClosed);
        }

        self.engine
            .transaction(&self.statements)
            .map_err(SchemaError::database("commit", self.engine.url()))?;
        self.statements.clear();

        for callback in std::mem::take(&mut self.after_commit) {
            callback();
        }
        Ok(())
    }

    pub fn rollback(&mut self) {
        self.statements.clear();
        self.after_commit.clear();
    }

    /// Discards uncommitted work, the session can not be used afterwards
    pub fn close(&mut self) {
        self.rollback();
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.statements.is_empty() {
            tracing::debug!(
                "Discarding {} uncommitted statements for '{}'",
                self.statements.len(),
                self.engine.url()
            );
        }
    }
}

/// Scope sharing one session per schema on the calling thread
///
/// While a context is alive, [SchemaInterface::get_session](crate::SchemaInterface::get_session)
/// returns the same session for the same schema. Dropping the context closes
/// those sessions. Contexts nest, an inner context opens its own sessions.
#[must_use = "sessions are only shared while the context is alive"]
pub struct SessionContext {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl SessionContext {
    pub fn enter() -> SessionContext {
        let depth = CONTEXTS.with(|contexts| {
            let mut contexts = contexts.borrow_mut();
            contexts.push(HashMap::new());
            contexts.len()
        });
        SessionContext {
            depth,
            _not_send: PhantomData,
        }
    }

    /// Checks if a context is open on the calling thread
    pub fn is_active() -> bool {
        CONTEXTS.with(|contexts| !contexts.borrow().is_empty())
    }

    /// The session for `schema` in the innermost context, opened with `open` on first use
    ///
    /// `None` when no context is open.
    pub(crate) fn session(
        schema: &str,
        open: impl FnOnce() -> Result<Session, SchemaError>,
    ) -> Result<Option<SharedSession>, SchemaError> {
        let existing = CONTEXTS.with(|contexts| {
            contexts
                .borrow()
                .last()
                .map(|context| context.get(schema).cloned())
        });
        match existing {
            None => Ok(None),
            Some(Some(session)) => Ok(Some(session)),
            Some(None) => {
                let session = Arc::new(Mutex::new(open()?));
                CONTEXTS.with(|contexts| {
                    if let Some(context) = contexts.borrow_mut().last_mut() {
                        context.insert(schema.to_owned(), session.clone());
                    }
                });
                Ok(Some(session))
            }
        }
    }
}

impl Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("depth", &self.depth)
            .finish()
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        let closing: Vec<HashMap<String, SharedSession>> = CONTEXTS
            .try_with(|contexts| {
                let mut contexts = contexts.borrow_mut();
                let keep = contexts.len().min(self.depth.saturating_sub(1));
                contexts.split_off(keep)
            })
            .unwrap_or_default();

        for (schema, session) in closing.into_iter().flatten() {
            tracing::trace!("Closing session of schema '{schema}'");
            session.lock().close();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::engine::{Connector, MemoryConnector};

    fn session() -> (Session, Arc<MemoryConnector>) {
        let connector = Arc::new(MemoryConnector::new());
        let engine = connector.connect("memory:///example", false).unwrap();
        (Session::new(engine), connector)
    }

    #[test]
    fn test_after_commit_runs_once() {
        let (mut session, connector) = session();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        session.call_after_commit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        session.execute("insert into a values (1)").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        session.commit().unwrap();
        session.commit().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(connector.engines()[0].statements(), vec!["insert into a values (1)"]);
    }

    #[test]
    fn test_rollback_discards_callbacks() {
        let (mut session, connector) = session();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        session.call_after_commit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        session.execute("insert into a values (1)").unwrap();
        session.rollback();
        session.commit().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(connector.engines()[0].statements().is_empty());
    }

    #[test]
    fn test_closed_session() {
        let (mut session, _) = session();
        session.call_after_commit(|| panic!("must not run"));
        session.close();

        assert!(session.is_closed());
        assert!(matches!(session.execute("select 1"), Err(SchemaError::SessionClosed)));
        assert!(matches!(session.commit(), Err(SchemaError::SessionClosed)));
    }

    #[test]
    fn test_failed_commit_keeps_callbacks() {
        let (mut session, _) = session();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        session.call_after_commit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        session.engine().dispose();

        assert!(matches!(session.commit(), Err(SchemaError::Database { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_context_scopes_sessions() {
        let (session, _) = session();
        let engine = session.engine().clone();
        let open = || Ok(Session::new(engine.clone()));

        assert!(!SessionContext::is_active());
        assert!(SessionContext::session("example", open).unwrap().is_none());

        let outer = SessionContext::enter();
        let first = SessionContext::session("example", open).unwrap().unwrap();
        let again = SessionContext::session("example", open).unwrap().unwrap();
        let other = SessionContext::session("other", open).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));

        {
            let _inner = SessionContext::enter();
            let inner = SessionContext::session("example", open).unwrap().unwrap();
            assert!(!Arc::ptr_eq(&first, &inner));
        }
        assert!(!first.lock().is_closed());

        drop(outer);
        assert!(first.lock().is_closed());
        assert!(other.lock().is_closed());
        assert!(!SessionContext::is_active());
    }
}
