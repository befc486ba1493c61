//! CSV adapters used to seed the store.

pub mod record_reader;
pub mod seed;

pub use record_reader::RecordReader;
pub use seed::{SeedReport, Seeder};
