//! Process-wide symbol table.
//!
//! Symbols with identical text are always the same instance, so symbol
//! equality (and `eq?` between symbols) is a pointer comparison. Interned
//! names are never released.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

static SYMBOLS: LazyLock<Mutex<HashMap<Arc<str>, Symbol>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// An interned identifier
#[derive(Clone)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Return the unique symbol for `name`, creating it on first use
    pub fn intern(name: &str) -> Symbol {
        // A poisoned table still holds only fully inserted entries.
        let mut table = SYMBOLS.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(symbol) = table.get(name) {
            return symbol.clone();
        }
        let text: Arc<str> = Arc::from(name);
        let symbol = Symbol(text.clone());
        table.insert(text, symbol.clone());
        symbol
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identity comparison; equivalent to `==` for interned symbols
    pub fn ptr_eq(&self, other: &Symbol) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0) as *const u8, state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", &*self.0)
    }
}
