#[path = "../../src/test_support.rs"]
mod fixtures;

pub use fixtures::write_dataset;
