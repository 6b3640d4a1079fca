#![forbid(unsafe_code)]

pub mod petition_store;
pub mod repo;
