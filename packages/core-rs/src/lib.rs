pub mod artifacts;
pub mod config;
pub mod error;
pub mod flows;
pub mod gateway;
pub mod session;
pub mod snapshot;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use artifacts::*;
pub use config::*;
pub use error::*;
pub use flows::*;
pub use gateway::*;
pub use session::*;
pub use snapshot::*;
pub use types::*;
