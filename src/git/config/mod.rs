pub mod operations;
pub mod parse;
