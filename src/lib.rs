pub mod config;
pub mod crypto;
pub mod daemon;
pub mod rpc;
pub mod transaction;
pub mod utils;
pub mod wallet;

#[cfg(test)]
mod test_utils;
