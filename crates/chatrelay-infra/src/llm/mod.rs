//! AI backend adapters.

pub mod gemini;
