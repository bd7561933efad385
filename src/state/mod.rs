/// State management module
///
/// This module handles all application state, including:
/// - Shared data structures (data.rs)
/// - The product selection being compared (selection.rs)
/// - Client-local key/value storage (storage.rs)
/// - The light/dark preference (preference.rs)

pub mod data;
pub mod preference;
pub mod selection;
pub mod storage;
