use chrono::Utc;

use super::data::{ProductRecord, SelectionEntry};

/// Result of adding a product to the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

/// The user's current working set of scanned products.
///
/// Entries are unique by code and keep first-insertion order. The store is
/// owned by the application state and lives only as long as the window.
#[derive(Debug, Default)]
pub struct SelectionStore {
    entries: Vec<SelectionEntry>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a product unless one with the same code is already selected
    pub fn add(&mut self, product: ProductRecord) -> AddOutcome {
        if self.contains(&product.code) {
            return AddOutcome::AlreadyPresent;
        }

        self.entries.push(SelectionEntry {
            code: product.code.clone(),
            product,
            scanned_at: Utc::now(),
        });
        AddOutcome::Added
    }

    /// Remove the entry with this code. Returns whether anything was removed.
    pub fn remove(&mut self, code: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.code != code);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Current entries in insertion order
    pub fn current(&self) -> &[SelectionEntry] {
        &self.entries
    }

    pub fn contains(&self, code: &str) -> bool {
        self.entries.iter().any(|entry| entry.code == code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
