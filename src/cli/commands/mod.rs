pub mod ask;
pub mod chat;
pub mod config;
pub mod keys;
pub mod tools;
