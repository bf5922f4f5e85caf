pub mod account;
pub mod address;
mod balance;
pub mod light_wallet;
pub mod sync;
pub mod tracker;
pub mod types;

pub use account::Account;
pub use address::AccountAddress;
pub use light_wallet::LightWallet;
pub use types::*;
