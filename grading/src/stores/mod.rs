pub mod memory;

pub use memory::{InMemoryMarksStore, InMemoryResultStore, InMemoryRuleStore};
