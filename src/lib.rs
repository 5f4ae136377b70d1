pub mod archive;
pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod slug;
pub mod store;
pub mod sweep;
pub mod tree;

#[macro_use]
extern crate log;
