//! Underlying (foreign) chains the attestation network can prove facts about.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TypesError;

/// Identifier of a source chain, as used in attestation requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceId {
    Btc,
    Ltc,
    Doge,
    Xrp,
    Algo,
}

/// Transaction-format family of a source chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChainFamily {
    /// Inputs reference previous outputs (BTC, LTC, DOGE).
    Utxo,
    /// Single-sender ledger payments with result codes (XRP).
    LedgerAccount,
    /// Plain account-to-account transfers (ALGO).
    Account,
}

impl SourceId {
    pub const ALL: [SourceId; 5] = [
        SourceId::Btc,
        SourceId::Ltc,
        SourceId::Doge,
        SourceId::Xrp,
        SourceId::Algo,
    ];

    /// Numeric id used in the canonical request encoding.
    pub fn code(self) -> u32 {
        match self {
            Self::Btc => 0,
            Self::Ltc => 1,
            Self::Doge => 2,
            Self::Xrp => 3,
            Self::Algo => 4,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn family(self) -> ChainFamily {
        match self {
            Self::Btc | Self::Ltc | Self::Doge => ChainFamily::Utxo,
            Self::Xrp => ChainFamily::LedgerAccount,
            Self::Algo => ChainFamily::Account,
        }
    }

    /// Confirmations required before a transaction is trusted.
    pub fn finalization_blocks(self) -> u64 {
        match self {
            Self::Btc => 6,
            Self::Ltc => 12,
            Self::Doge => 60,
            Self::Xrp => 3,
            Self::Algo => 1,
        }
    }

    pub fn seconds_per_block(self) -> u64 {
        match self {
            Self::Btc => 600,
            Self::Ltc => 150,
            Self::Doge => 60,
            Self::Xrp => 4,
            Self::Algo => 4,
        }
    }

    /// XRP transaction ids are conventionally upper-case hex.
    pub fn requires_uppercase_hashes(self) -> bool {
        matches!(self, Self::Xrp)
    }

    /// Normalize a transaction id to the form the chain's indexer expects.
    pub fn normalize_tx_hash(self, hash: &str) -> String {
        let body = hash.strip_prefix("0x").unwrap_or(hash);
        match self.family() {
            ChainFamily::Utxo => body.to_ascii_lowercase(),
            ChainFamily::LedgerAccount => body.to_ascii_uppercase(),
            // Base32 ids are case-sensitive.
            ChainFamily::Account => body.to_string(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Btc => "BTC",
            Self::Ltc => "LTC",
            Self::Doge => "DOGE",
            Self::Xrp => "XRP",
            Self::Algo => "ALGO",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        // Test networks share the format of their main chain.
        let base = upper
            .strip_prefix("TEST")
            .unwrap_or(&upper)
            .trim_start_matches('_');
        Self::ALL
            .into_iter()
            .find(|id| id.name() == base)
            .ok_or_else(|| TypesError::UnknownSource(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for id in SourceId::ALL {
            assert_eq!(SourceId::from_code(id.code()), Some(id));
        }
        assert_eq!(SourceId::from_code(99), None);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("xrp".parse::<SourceId>().unwrap(), SourceId::Xrp);
        assert_eq!("testBTC".parse::<SourceId>().unwrap(), SourceId::Btc);
        assert!("ETH".parse::<SourceId>().is_err());
    }

    #[test]
    fn test_families() {
        assert_eq!(SourceId::Doge.family(), ChainFamily::Utxo);
        assert_eq!(SourceId::Xrp.family(), ChainFamily::LedgerAccount);
        assert_eq!(SourceId::Algo.family(), ChainFamily::Account);
    }

    #[test]
    fn test_normalize_tx_hash() {
        assert_eq!(SourceId::Xrp.normalize_tx_hash("0xabCD"), "ABCD");
        assert_eq!(SourceId::Btc.normalize_tx_hash("ABcd"), "abcd");
        assert_eq!(SourceId::Algo.normalize_tx_hash("TXALGO"), "TXALGO");
    }
}
