pub mod db;
pub mod engine;
pub mod models;

pub use engine::{FinaleIndexer, IndexedContracts};
