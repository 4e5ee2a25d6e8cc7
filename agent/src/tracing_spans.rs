//! Span constructors shared by the actors, so log lines from one agent or
//! one request can be filtered together.

use synth_types::Address;
use tracing::{info_span, Span};

/// One agent bot step.
pub fn agent_span(vault: &Address) -> Span {
    info_span!("agent", vault = %vault)
}

pub fn minting_span(request_id: u64) -> Span {
    info_span!("minting", request_id)
}

pub fn redemption_span(request_id: u64) -> Span {
    info_span!("redemption", request_id)
}

/// One challenger step.
pub fn challenger_span(address: &Address) -> Span {
    info_span!("challenger", address = %address)
}

pub fn system_keeper_span(address: &Address) -> Span {
    info_span!("system_keeper", address = %address)
}

pub fn health_span(vault: &Address) -> Span {
    info_span!("health", vault = %vault)
}
