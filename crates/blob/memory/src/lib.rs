pub mod store;

pub use store::MemoryFileStore;
