//! Utils which are used internally

use std::{
    collections::HashSet,
    fmt,
    sync::{Mutex, OnceLock},
};

pub mod math;

static WARNED: OnceLock<Mutex<HashSet<&'static str>>> = OnceLock::new();

/// Logs `message` as a warning, but only the first time `key` is seen by this process.
/// Returns whether the warning was logged.
pub fn warn_once(key: &'static str, message: fmt::Arguments<'_>) -> bool {
    let warned = WARNED.get_or_init(|| Mutex::new(HashSet::new()));
    let mut warned = match warned.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let first = warned.insert(key);
    if first {
        log::warn!("{message}");
    }
    first
}
