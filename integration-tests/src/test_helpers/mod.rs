pub mod fake_reader;
pub mod fixtures;
