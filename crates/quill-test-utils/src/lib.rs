//! Mocks and fixtures shared by Quill's tests.

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::{ScriptedLlm, StaticFetcher, StaticSearcher};
