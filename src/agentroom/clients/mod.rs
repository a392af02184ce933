//! Concrete [`CompletionProvider`](crate::provider::CompletionProvider) implementations.

pub mod common;
pub mod openai;
