//! Run-log interface. §1 lists "log formatting" as an external collaborator —
//! the core only depends on this trait, never on a concrete formatter or file.
//! The default `StderrLog` deduplicates first-occurrence-only warnings
//! (§7 NumericWarning) that a bare `println!` call site cannot track on its own.

use std::collections::HashSet;
use std::sync::Mutex;

pub trait RunLog: Send + Sync {
    fn info(&self, msg: &str);
    fn warn(&self, msg: &str);
    /// Emits `msg` the first time `key` is seen, silently drops later calls.
    fn once_warn(&self, key: &str, msg: &str);
}

pub struct StderrLog {
    seen: Mutex<HashSet<String>>,
}

impl StderrLog {
    pub fn new() -> Self {
        Self { seen: Mutex::new(HashSet::new()) }
    }
}

impl Default for StderrLog {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLog for StderrLog {
    fn info(&self, msg: &str) {
        eprintln!("[info] {msg}");
    }

    fn warn(&self, msg: &str) {
        eprintln!("[warn] {msg}");
    }

    fn once_warn(&self, key: &str, msg: &str) {
        let mut seen = self.seen.lock().unwrap();
        if seen.insert(key.to_string()) {
            eprintln!("[warn] {msg}");
        }
    }
}

/// Discards everything; useful in tests where stderr noise is unwanted.
pub struct NullLog;

impl RunLog for NullLog {
    fn info(&self, _msg: &str) {}
    fn warn(&self, _msg: &str) {}
    fn once_warn(&self, _key: &str, _msg: &str) {}
}
