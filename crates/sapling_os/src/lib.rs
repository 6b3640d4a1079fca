#![forbid(unsafe_code)]

pub mod error;
pub mod petition_access;
pub mod petition_create;
pub mod petition_images;
pub mod signature;

pub use error::PetitionError;
