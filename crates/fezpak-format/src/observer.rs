//! Progress notifications for pack and unpack operations.

/// Receives one notification per processed entry.
pub trait EntryObserver {
    /// Called just before an entry is written to the archive or to disk.
    fn entry_processed(&mut self, name: &str);
}

impl<F: FnMut(&str)> EntryObserver for F {
    #[inline]
    fn entry_processed(&mut self, name: &str) {
        self(name)
    }
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl EntryObserver for Silent {
    #[inline]
    fn entry_processed(&mut self, _name: &str) {}
}
