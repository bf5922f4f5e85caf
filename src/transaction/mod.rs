/// Transfer builder and pending transactions
pub mod builder;
/// Transaction assembly and signing
pub mod construct;
pub mod extra;
/// Commit of pending transactions
pub mod sender;
pub mod split;
pub mod types;

pub use builder::{PendingTransaction, TransactionError, TransferBuilder};
pub use construct::{TxDestinationEntry, TxSourceEntry};
pub use split::{DustPolicy, SplitStrategy};
pub use types::*;
