// Test Helpers Module
//
// Shared doubles for unit and integration tests: an in-memory tracker,
// scripted remote collaborators, and the sqlx migrator for Postgres tests.

pub mod memory_tracker;
pub mod scripted;
pub mod test_utils;

pub use memory_tracker::MemoryTracker;
pub use scripted::{
    MemorySnapshot, MemorySource, RecordingSleeper, ScriptedCompiler, ScriptedRemote,
    ScriptedTransport,
};
pub use test_utils::{get_test_database_url, MIGRATOR};
