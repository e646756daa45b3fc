#![forbid(unsafe_code)]

pub mod client;
pub mod errors;
pub mod export;
pub mod model;
