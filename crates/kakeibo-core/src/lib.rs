pub mod error;
pub mod import;
pub mod ledger;
pub mod migrations;
pub mod model;
pub mod normalize;
pub mod state;
pub mod stores;

pub use error::{ClientError, ClientResult};
pub use ledger::SqliteLedger;

pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");
