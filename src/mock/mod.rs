//! Mock collaborators
//!
//! Configurable test doubles for the two interfaces the engine consumes:
//! a scripted remote fetcher (call counting, injectable latency and
//! failures) and an in-memory snapshot store (save counting, injectable
//! save latency). Used by the engine's unit tests and the integration
//! suites under `tests/`.

mod fetcher;
mod storage;

pub use fetcher::MockFetcher;
pub use storage::MemoryStorage;
