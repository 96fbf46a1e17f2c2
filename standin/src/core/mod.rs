//! Pure logic shared by the broker and its generators.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and are safe to exercise directly in tests.

pub mod hints;
pub mod id;
pub mod registry;
pub mod types;
