pub mod store;

pub use store::MemoryLaporanStore;
