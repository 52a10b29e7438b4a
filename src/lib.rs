pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod http;
pub mod services;
pub mod session;
pub mod storage;
pub mod tenant;

pub use error::SessionError;
pub use session::Session;

#[cfg(test)]
pub mod testing;
