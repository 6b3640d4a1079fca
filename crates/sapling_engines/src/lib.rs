#![forbid(unsafe_code)]

pub mod esign;
pub mod slug;
