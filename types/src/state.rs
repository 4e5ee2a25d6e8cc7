//! Closed state enumerations for lifecycle records and agents.
//!
//! Transition validity lives in one table per enum (`can_transition_to`);
//! callers never compare states by convention.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a minting record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MintingState {
    /// Reservation observed; waiting for payment or its deadline.
    Start,
    /// Executed, defaulted or unstuck. Immutable.
    Done,
}

impl MintingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn can_transition_to(&self, next: MintingState) -> bool {
        matches!((self, next), (Self::Start, Self::Done))
    }
}

/// State of a redemption record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedemptionState {
    /// Request observed; the agent still has to pay.
    Start,
    /// Underlying payment sent; waiting for finalization.
    Paid,
    /// Payment or non-payment proof requested; waiting for the round.
    RequestedProof,
    /// Confirmed or defaulted. Immutable.
    Done,
}

impl RedemptionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn can_transition_to(&self, next: RedemptionState) -> bool {
        use RedemptionState::*;
        matches!(
            (self, next),
            (Start, Paid)
                | (Start, RequestedProof)
                | (Start, Done)
                | (Paid, RequestedProof)
                | (Paid, Done)
                | (RequestedProof, Done)
        )
    }
}

/// Agent status as tracked by the contract and mirrored off-chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    Normal,
    /// Collateral call band: below the CCB threshold, liquidation pending.
    Ccb,
    Liquidation,
    /// Liquidation triggered by a successful challenge; never ends.
    FullLiquidation,
    /// Agent announced exit. Terminal.
    Destroying,
}

impl AgentStatus {
    pub fn code(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Ccb => 1,
            Self::Liquidation => 2,
            Self::FullLiquidation => 3,
            Self::Destroying => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Normal),
            1 => Some(Self::Ccb),
            2 => Some(Self::Liquidation),
            3 => Some(Self::FullLiquidation),
            4 => Some(Self::Destroying),
            _ => None,
        }
    }

    pub fn is_liquidating(&self) -> bool {
        matches!(self, Self::Liquidation | Self::FullLiquidation)
    }

    /// Whether new minting against this agent is allowed.
    pub fn accepts_minting(&self) -> bool {
        matches!(self, Self::Normal)
    }

    pub fn can_transition_to(&self, next: AgentStatus) -> bool {
        use AgentStatus::*;
        if *self == next {
            return false;
        }
        match (self, next) {
            (Destroying, _) => false,
            (_, Destroying) => true,
            (Normal, Ccb) | (Normal, Liquidation) | (Normal, FullLiquidation) => true,
            (Ccb, Normal) | (Ccb, Liquidation) | (Ccb, FullLiquidation) => true,
            (Liquidation, Normal) | (Liquidation, FullLiquidation) => true,
            (FullLiquidation, _) => false,
            _ => false,
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Normal => "NORMAL",
            Self::Ccb => "CCB",
            Self::Liquidation => "LIQUIDATION",
            Self::FullLiquidation => "FULL_LIQUIDATION",
            Self::Destroying => "DESTROYING",
        };
        f.write_str(s)
    }
}
