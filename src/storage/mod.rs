pub mod fs_backend;
pub mod record_store;

pub use fs_backend::FsBackend;
pub use record_store::RecordStoreBackend;

/// Shared across both backends: whether a POST created a new resource or
/// overwrote an existing one, which the method engine maps onto 201 vs 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Overwritten,
}
