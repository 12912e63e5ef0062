//! Concrete [`super::provider::GenerativeClient`] implementations.

pub mod gemini;
