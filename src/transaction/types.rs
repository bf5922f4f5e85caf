//! Ledger data types: transactions, blocks and their binary encoding.
//!
//! Blobs are the bincode encoding of these types; ids are the Keccak-256 of the blob.

use crate::crypto::{Hash, KeyImage, PublicKey, Signature, cn_fast_hash};
use serde::{Deserialize, Serialize};

pub const CURRENT_TRANSACTION_VERSION: u8 = 1;

/// Transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxIn {
    /// Coinbase input carrying the block height.
    Gen { height: u64 },
    /// Spend of one output out of a ring of same-amount outputs.
    ToKey {
        amount: u64,
        /// Global output indices of the ring, relative to the previous entry.
        key_offsets: Vec<u64>,
        key_image: KeyImage,
    },
}

impl TxIn {
    pub fn key_image(&self) -> Option<&KeyImage> {
        match self {
            TxIn::ToKey { key_image, .. } => Some(key_image),
            TxIn::Gen { .. } => None,
        }
    }

    pub fn amount(&self) -> u64 {
        match self {
            TxIn::ToKey { amount, .. } => *amount,
            TxIn::Gen { .. } => 0,
        }
    }
}

/// Output paying `amount` to a one-time key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub amount: u64,
    pub key: PublicKey,
}

/// The signed part of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPrefix {
    pub version: u8,
    /// Block height (below the max block number) or Unix time before which outputs are locked.
    pub unlock_time: u64,
    pub vin: Vec<TxIn>,
    pub vout: Vec<TxOut>,
    pub extra: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub prefix: TransactionPrefix,
    /// One ring signature per input.
    pub signatures: Vec<Vec<Signature>>,
}

impl TransactionPrefix {
    pub fn hash(&self) -> Result<Hash, bincode::Error> {
        Ok(cn_fast_hash(&bincode::serialize(self)?))
    }
}

impl Transaction {
    pub fn hash(&self) -> Result<Hash, bincode::Error> {
        Ok(cn_fast_hash(&self.to_blob()?))
    }

    pub fn prefix_hash(&self) -> Result<Hash, bincode::Error> {
        self.prefix.hash()
    }

    pub fn to_blob(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_blob(blob: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(blob)
    }

    pub fn unlock_time(&self) -> u64 {
        self.prefix.unlock_time
    }

    pub fn outputs_amount(&self) -> u64 {
        self.prefix
            .vout
            .iter()
            .fold(0u64, |acc, out| acc.saturating_add(out.amount))
    }

    pub fn inputs_amount(&self) -> u64 {
        self.prefix
            .vin
            .iter()
            .fold(0u64, |acc, input| acc.saturating_add(input.amount()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub major_version: u8,
    pub minor_version: u8,
    pub timestamp: u64,
    pub prev_id: Hash,
    pub nonce: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub miner_tx: Transaction,
    pub tx_hashes: Vec<Hash>,
}

impl Block {
    pub fn hash(&self) -> Result<Hash, bincode::Error> {
        Ok(cn_fast_hash(&self.to_blob()?))
    }

    pub fn to_blob(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_blob(blob: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(blob)
    }

    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }
}

/// Convert sorted absolute global indices into the relative form stored in inputs.
pub fn absolute_output_offsets_to_relative(offsets: &[u64]) -> Vec<u64> {
    let mut previous = 0u64;
    offsets
        .iter()
        .map(|&offset| {
            let relative = offset.saturating_sub(previous);
            previous = offset;
            relative
        })
        .collect()
}

pub fn relative_output_offsets_to_absolute(offsets: &[u64]) -> Vec<u64> {
    let mut total = 0u64;
    offsets
        .iter()
        .map(|&offset| {
            total = total.saturating_add(offset);
            total
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx(unlock_time: u64) -> Transaction {
        Transaction {
            prefix: TransactionPrefix {
                version: CURRENT_TRANSACTION_VERSION,
                unlock_time,
                vin: vec![TxIn::Gen { height: 7 }],
                vout: vec![
                    TxOut {
                        amount: 10,
                        key: PublicKey([1; 32]),
                    },
                    TxOut {
                        amount: 32,
                        key: PublicKey([2; 32]),
                    },
                ],
                extra: vec![],
            },
            signatures: vec![],
        }
    }

    #[test]
    fn test_hash_depends_on_content() {
        let tx = sample_tx(0);
        let blob = tx.to_blob().unwrap();
        assert_eq!(Transaction::from_blob(&blob).unwrap(), tx);
        assert_eq!(tx.hash().unwrap(), cn_fast_hash(&blob));
        assert_ne!(tx.hash().unwrap(), sample_tx(1).hash().unwrap());
        assert_eq!(tx.outputs_amount(), 42);
        assert_eq!(tx.inputs_amount(), 0);
    }

    #[test]
    fn test_truncated_blob_rejected() {
        let blob = sample_tx(0).to_blob().unwrap();
        assert!(Transaction::from_blob(&blob[..blob.len() - 3]).is_err());
    }

    #[test]
    fn test_output_offsets() {
        let absolute = vec![3, 10, 11, 40];
        let relative = absolute_output_offsets_to_relative(&absolute);
        assert_eq!(relative, vec![3, 7, 1, 29]);
        assert_eq!(relative_output_offsets_to_absolute(&relative), absolute);
    }
}
