//! Payment references: the 32-byte tag an underlying payment carries
//! (OP_RETURN, memo, note) so the contract can match it to a request.
//!
//! Layout (big-endian): 6-byte protocol prefix, 2-byte kind, 24-byte id.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TypesError;
use crate::hash::Bytes32;

const PREFIX: [u8; 6] = [0x46, 0x42, 0x50, 0x52, 0x66, 0x41];

/// What a payment reference pays for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Minting,
    Redemption,
    AnnouncedWithdrawal,
}

impl ReferenceKind {
    fn code(self) -> u16 {
        match self {
            Self::Minting => 1,
            Self::Redemption => 2,
            Self::AnnouncedWithdrawal => 3,
        }
    }

    fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::Minting),
            2 => Some(Self::Redemption),
            3 => Some(Self::AnnouncedWithdrawal),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentReference(Bytes32);

impl PaymentReference {
    pub fn new(kind: ReferenceKind, id: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..6].copy_from_slice(&PREFIX);
        bytes[6..8].copy_from_slice(&kind.code().to_be_bytes());
        bytes[24..].copy_from_slice(&id.to_be_bytes());
        Self(Bytes32::new(bytes))
    }

    pub fn minting(collateral_reservation_id: u64) -> Self {
        Self::new(ReferenceKind::Minting, collateral_reservation_id)
    }

    pub fn redemption(request_id: u64) -> Self {
        Self::new(ReferenceKind::Redemption, request_id)
    }

    pub fn announced_withdrawal(announcement_id: u64) -> Self {
        Self::new(ReferenceKind::AnnouncedWithdrawal, announcement_id)
    }

    /// Wrap raw bytes observed on chain. The result may not be a valid reference.
    pub fn from_bytes32(raw: Bytes32) -> Self {
        Self(raw)
    }

    pub fn parse(s: &str) -> Result<Self, TypesError> {
        let raw = Bytes32::from_hex(s).map_err(|e| TypesError::InvalidReference(e.to_string()))?;
        Ok(Self(raw))
    }

    /// True when the protocol prefix is present.
    pub fn is_valid(&self) -> bool {
        self.0.as_bytes()[..6] == PREFIX
    }

    pub fn kind(&self) -> Option<ReferenceKind> {
        if !self.is_valid() {
            return None;
        }
        let b = self.0.as_bytes();
        ReferenceKind::from_code(u16::from_be_bytes([b[6], b[7]]))
    }

    /// The low 64 bits of the id field.
    pub fn id(&self) -> u64 {
        let mut low = [0u8; 8];
        low.copy_from_slice(&self.0.as_bytes()[24..]);
        u64::from_be_bytes(low)
    }

    pub fn as_bytes32(&self) -> &Bytes32 {
        &self.0
    }
}

impl fmt::Debug for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PaymentReference({})", self.0)
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
