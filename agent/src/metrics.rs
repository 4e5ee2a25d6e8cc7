//! Prometheus metrics for the agent and challenger actors.
//!
//! [`BotMetrics`] owns its own [`Registry`]; [`BotMetrics::render`] encodes it
//! in the text exposition format.

use prometheus::{
    register_int_counter_vec_with_registry, register_int_gauge_with_registry, Encoder, IntCounterVec,
    IntGauge, Opts, Registry, TextEncoder,
};

pub struct BotMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Actor steps, by actor.
    pub steps: IntCounterVec,
    /// Steps that ended in an error, by actor.
    pub step_errors: IntCounterVec,
    /// Attestation requests submitted, by attestation type.
    pub proofs_requested: IntCounterVec,
    /// Verified proofs retrieved, by attestation type.
    pub proofs_obtained: IntCounterVec,
    /// Record state transitions, by record kind and target state.
    pub transitions: IntCounterVec,
    /// Challenges sent, by challenge kind.
    pub challenges: IntCounterVec,
    /// Challenge attempts that failed and were queued or dropped, by kind.
    pub challenge_failures: IntCounterVec,
    /// Collateral deposits made to avoid liquidation, by collateral class.
    pub top_ups: IntCounterVec,
    /// Liquidation calls sent by the system keeper, by action.
    pub liquidation_calls: IntCounterVec,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Last known agent status code.
    pub agent_status: IntGauge,
}

impl BotMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let steps = register_int_counter_vec_with_registry!(
            Opts::new("synth_agent_steps_total", "Actor steps run"),
            &["actor"],
            registry
        )?;
        let step_errors = register_int_counter_vec_with_registry!(
            Opts::new("synth_agent_step_errors_total", "Actor steps that failed"),
            &["actor"],
            registry
        )?;
        let proofs_requested = register_int_counter_vec_with_registry!(
            Opts::new(
                "synth_agent_proofs_requested_total",
                "Attestation requests submitted"
            ),
            &["type"],
            registry
        )?;
        let proofs_obtained = register_int_counter_vec_with_registry!(
            Opts::new(
                "synth_agent_proofs_obtained_total",
                "Verified attestation proofs retrieved"
            ),
            &["type"],
            registry
        )?;
        let transitions = register_int_counter_vec_with_registry!(
            Opts::new(
                "synth_agent_transitions_total",
                "Minting and redemption record transitions"
            ),
            &["record", "state"],
            registry
        )?;
        let challenges = register_int_counter_vec_with_registry!(
            Opts::new("synth_agent_challenges_total", "Challenges sent"),
            &["kind"],
            registry
        )?;
        let challenge_failures = register_int_counter_vec_with_registry!(
            Opts::new(
                "synth_agent_challenge_failures_total",
                "Challenge attempts that failed"
            ),
            &["kind"],
            registry
        )?;
        let top_ups = register_int_counter_vec_with_registry!(
            Opts::new("synth_agent_top_ups_total", "Collateral top-up deposits"),
            &["class"],
            registry
        )?;
        let liquidation_calls = register_int_counter_vec_with_registry!(
            Opts::new(
                "synth_agent_liquidation_calls_total",
                "startLiquidation and endLiquidation calls sent"
            ),
            &["action"],
            registry
        )?;
        let agent_status = register_int_gauge_with_registry!(
            Opts::new("synth_agent_status", "Agent status code"),
            registry
        )?;

        Ok(Self {
            registry,
            steps,
            step_errors,
            proofs_requested,
            proofs_obtained,
            transitions,
            challenges,
            challenge_failures,
            top_ups,
            liquidation_calls,
            agent_status,
        })
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
