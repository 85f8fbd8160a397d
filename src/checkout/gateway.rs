use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Authorized,
    Declined,
}

/// Source of payment verdicts. Production uses [`SimulatedGateway`]; tests
/// swap in [`FixedGateway`].
pub trait PaymentGateway: Send + Sync {
    fn attempt(&self) -> PaymentOutcome;
}

/// Stand-in for a card processor: authorizes a fixed share of attempts,
/// independently per call and regardless of what is being paid for.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    approval_percent: u32,
}

impl SimulatedGateway {
    pub const DEFAULT_APPROVAL_PERCENT: u32 = 80;

    pub fn new(approval_percent: u32) -> Self {
        Self {
            approval_percent: approval_percent.min(100),
        }
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(Self::DEFAULT_APPROVAL_PERCENT)
    }
}

impl PaymentGateway for SimulatedGateway {
    fn attempt(&self) -> PaymentOutcome {
        let roll: u32 = rand::thread_rng().gen_range(0..100);
        if roll < self.approval_percent {
            PaymentOutcome::Authorized
        } else {
            PaymentOutcome::Declined
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedGateway(pub PaymentOutcome);

impl PaymentGateway for FixedGateway {
    fn attempt(&self) -> PaymentOutcome {
        self.0
    }
}
