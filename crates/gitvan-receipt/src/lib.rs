//! Canonical receipt serialization, Git-notes merge-write, and a
//! query/index API over a repository's receipt history.

pub mod error;
pub mod index;
pub mod types;
pub mod writer;

pub use error::{ReceiptError, ReceiptResult};
pub use index::{ReceiptIndex, ReceiptQuery, ReceiptRecord, ReceiptStats};
pub use types::{HookReceipt, Receipt, StepErrorInfo, StepReceipt, SCHEMA};
pub use writer::ReceiptWriter;
