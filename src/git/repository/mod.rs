pub mod core;
pub mod status;

pub(crate) mod cache;
