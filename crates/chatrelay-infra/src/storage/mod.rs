//! Durable storage adapters.

pub mod atomic;

pub use atomic::{atomic_write, AtomicFileStore};
