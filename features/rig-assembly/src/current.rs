use std::{cell::RefCell, marker::PhantomData, sync::Arc, sync::OnceLock};

use serde_json::{Map, Value};

use crate::{assembly::Assembly, errors::AssemblyError, unit::Unit};

thread_local! {
    static CURRENT: RefCell<Option<Assembly>> = const { RefCell::new(None) };
}

static STANDARD: OnceLock<Assembly> = OnceLock::new();

impl Assembly {
    /// The process-wide fallback assembly, created on first use
    pub fn standard() -> Assembly {
        STANDARD.get_or_init(Assembly::new).clone()
    }

    /// The assembly promoted on this thread, or the [standard](Assembly::standard) one
    pub fn current() -> Assembly {
        CURRENT
            .with(|current| current.borrow().clone())
            .unwrap_or_else(Assembly::standard)
    }

    /// Checks if this assembly is promoted on the calling thread
    pub fn is_current(&self) -> bool {
        CURRENT.with(|current| current.borrow().as_ref() == Some(self))
    }

    /// Makes this assembly current on the calling thread
    pub fn promote(&self) -> Assembly {
        tracing::trace!("Promoting {self:?}");
        CURRENT.with(|current| *current.borrow_mut() = Some(self.clone()));
        self.clone()
    }

    /// Clears the current assembly of the calling thread, if it is this one
    pub fn demote(&self) -> Assembly {
        CURRENT.with(|current| {
            let mut current = current.borrow_mut();
            if current.as_ref() == Some(self) {
                tracing::trace!("Demoting {self:?}");
                *current = None;
            }
        });
        self.clone()
    }

    /// Promotes this assembly until the returned guard is dropped
    ///
    /// # Example
    /// ```rust
    /// use rig_assembly::Assembly;
    ///
    /// let assembly = Assembly::new();
    /// {
    ///     let _promotion = assembly.enter();
    ///     assert_eq!(Assembly::current(), assembly);
    /// }
    /// assert!(!assembly.is_current());
    /// ```
    pub fn enter(&self) -> Promotion {
        let previous = CURRENT.with(|current| current.replace(Some(self.clone())));
        tracing::trace!("Entered {self:?}");
        Promotion {
            assembly: self.clone(),
            previous,
            _not_send: PhantomData,
        }
    }
}

/// Scope of an [Assembly::enter] call
///
/// Restores the previously current assembly on drop, unless something else
/// was promoted in the meantime. Bound to the thread it was created on.
#[must_use = "the assembly is only current while the promotion is alive"]
pub struct Promotion {
    assembly: Assembly,
    previous: Option<Assembly>,
    _not_send: PhantomData<*const ()>,
}

impl Promotion {
    pub fn assembly(&self) -> &Assembly {
        &self.assembly
    }
}

impl std::fmt::Debug for Promotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promotion")
            .field("assembly", &self.assembly)
            .field("previous", &self.previous)
            .finish()
    }
}

impl Drop for Promotion {
    fn drop(&mut self) {
        let previous = self.previous.take();
        // The thread local may already be gone during thread teardown
        let _ = CURRENT.try_with(|current| {
            let mut current = current.borrow_mut();
            if current.as_ref() == Some(&self.assembly) {
                *current = previous;
            }
        });
    }
}

/// Merges `configuration` into the current assembly
pub fn adhoc_configure(configuration: Map<String, Value>) -> Result<(), AssemblyError> {
    Assembly::current().configure(configuration)
}

/// Instantiates `U` on the current assembly
pub fn get_unit<U: Unit>() -> Result<Arc<U>, AssemblyError> {
    Assembly::current().instantiate::<U>()
}
