//! Dataset, batching and loading

pub mod cache;
pub mod collate;
pub mod dataset;
pub mod loader;
pub mod records;
pub mod resolver;
pub mod sampler;

pub use cache::GraphCache;
pub use collate::{collate, Batch};
pub use dataset::CrystalDataset;
pub use loader::{DataLoader, Epoch};
pub use records::{read_id_prop, CrystalRecord, RecordTable, StructureSource};
pub use resolver::{resolver_for, GraphResolver, ParallelResolver, SequentialResolver};
pub use sampler::BatchSampler;
