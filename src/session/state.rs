//! Negotiation state machine
//!
//! Tracks a camera session from an incoming offer to the delivered result.
//! Terminal phases are recorded as the last outcome and the session drops
//! straight back to idle, ready for the next offer.

/// Negotiation lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationPhase {
    /// No offer in flight
    Idle,
    /// Working out which providers support the camera
    Resolving,
    /// The selected provider is handling the offer
    Negotiating,
    /// The provider produced an answer
    Answered,
    /// No provider, or the provider declined the offer
    Ineligible,
    /// Selection or the provider failed
    Failed,
}

impl NegotiationPhase {
    /// Whether this phase ends a negotiation
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NegotiationPhase::Answered | NegotiationPhase::Ineligible | NegotiationPhase::Failed
        )
    }
}

/// Per-session negotiation state
///
/// The phase is derived from what is in flight: any offer with a provider
/// makes the session `Negotiating`, otherwise any pending offer or refresh
/// makes it `Resolving`. Overlapping offers and refreshes never reset each
/// other's phase.
#[derive(Debug)]
pub struct NegotiationState {
    /// Current phase
    pub phase: NegotiationPhase,

    /// Terminal phase of the most recent negotiation
    pub last_outcome: Option<NegotiationPhase>,

    /// Offers received
    pub offers: u64,

    /// Offers answered
    pub answers: u64,

    refreshing: usize,
    resolving_offers: usize,
    negotiating_offers: usize,
}

impl Default for NegotiationState {
    fn default() -> Self {
        Self::new()
    }
}

impl NegotiationState {
    /// Create an idle state
    pub fn new() -> Self {
        Self {
            phase: NegotiationPhase::Idle,
            last_outcome: None,
            offers: 0,
            answers: 0,
            refreshing: 0,
            resolving_offers: 0,
            negotiating_offers: 0,
        }
    }

    fn update_phase(&mut self) {
        self.phase = if self.negotiating_offers > 0 {
            NegotiationPhase::Negotiating
        } else if self.resolving_offers > 0 || self.refreshing > 0 {
            NegotiationPhase::Resolving
        } else {
            NegotiationPhase::Idle
        };
    }

    /// An offer arrived
    pub fn begin_offer(&mut self) {
        self.offers += 1;
        self.resolving_offers += 1;
        self.update_phase();
    }

    /// Providers are known, hand the offer to the first one
    pub fn begin_negotiating(&mut self) {
        self.resolving_offers = self.resolving_offers.saturating_sub(1);
        self.negotiating_offers += 1;
        self.update_phase();
    }

    /// An offer failed before reaching a provider
    pub fn fail_resolving(&mut self) {
        self.resolving_offers = self.resolving_offers.saturating_sub(1);
        self.record(NegotiationPhase::Failed);
    }

    /// Record the result of an offer that reached [`begin_negotiating`](Self::begin_negotiating)
    pub fn finish(&mut self, outcome: NegotiationPhase) {
        self.negotiating_offers = self.negotiating_offers.saturating_sub(1);
        self.record(outcome);
    }

    fn record(&mut self, outcome: NegotiationPhase) {
        debug_assert!(outcome.is_terminal(), "{outcome:?} is not terminal");

        if outcome == NegotiationPhase::Answered {
            self.answers += 1;
        }
        self.last_outcome = Some(outcome);
        self.update_phase();
    }

    /// A provider refresh started
    pub fn begin_refresh(&mut self) {
        self.refreshing += 1;
        self.update_phase();
    }

    /// A refresh started by [`begin_refresh`](Self::begin_refresh) finished
    pub fn end_refresh(&mut self) {
        self.refreshing = self.refreshing.saturating_sub(1);
        self.update_phase();
    }

    /// Whether an offer is being handled
    pub fn is_negotiating(&self) -> bool {
        self.phase == NegotiationPhase::Negotiating
    }
}
