//! SQLite persistence for the processed-recordings ledger.

pub mod init;
pub mod ledger;


pub use init::{init_db, migrate, open_db};
pub use ledger::{LedgerEntry, LedgerRepository};
