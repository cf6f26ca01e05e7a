//! Ready-made storage backends.

#[cfg(feature = "memory-store")]
mod memory_storage;

#[cfg(feature = "memory-store")]
pub use memory_storage::MemoryStorage;
