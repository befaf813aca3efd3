pub mod account_ledger;
pub mod result_writer;

pub use account_ledger::{AccountLedger, LedgerSnapshot};
pub use result_writer::ResultWriter;
