pub mod operations;
pub mod tracking;
