//! Browse a Google Drive folder tree and copy selected files from one folder
//! into another.

pub mod app;
pub mod auth;
pub mod config;
pub mod copy;
pub mod copy_request;
pub mod error;
pub mod lister;
pub mod models;
pub mod progress;
pub mod resolve;
pub mod retry;
pub mod session;
pub mod transport;
pub mod tree;

#[cfg(test)]
mod testing;
