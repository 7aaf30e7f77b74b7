pub mod config;
pub mod db;
pub mod error;
pub mod grid;
pub mod ident;
pub mod model;
pub mod oracle;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod store;

#[cfg(test)]
mod testing;

pub use error::{Error, QueryError, Result};
