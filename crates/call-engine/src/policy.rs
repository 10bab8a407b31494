//! Per-channel call policies.
//!
//! The three call channels share one ledger and one orchestrator; what
//! differs between them (credit checks for lead-generating calls, nothing
//! for support calls) is injected here as strategy objects.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use roadcall_call_ledger::{Call, Party, PartyId, PartyKind};

use crate::error::{EngineError, Result};

/// Credit ledger capability, owned elsewhere in the marketplace. The voice
/// core only ever asks two questions of it.
#[async_trait]
pub trait CreditAuthority: Send + Sync {
    /// Can this party cover `amount` credits?
    async fn has_balance(&self, party: &PartyId, amount: u32) -> Result<bool>;

    /// Debit `amount` credits from the party.
    async fn debit(&self, party: &PartyId, amount: u32) -> Result<()>;
}

/// Credit authority that never says no. Default for tests and deployments
/// that bill out-of-band.
pub struct UnlimitedCredit;

#[async_trait]
impl CreditAuthority for UnlimitedCredit {
    async fn has_balance(&self, _party: &PartyId, _amount: u32) -> Result<bool> {
        Ok(true)
    }

    async fn debit(&self, party: &PartyId, amount: u32) -> Result<()> {
        debug!("Debit of {} credits from {} (unlimited authority)", amount, party);
        Ok(())
    }
}

/// Channel-specific hooks around the shared call lifecycle.
#[async_trait]
pub trait CallPolicy: Send + Sync {
    /// Gate call creation. Runs before the ledger row exists.
    async fn authorize(&self, caller: &Party, receiver: &Party) -> Result<()>;

    /// Runs once, on the call's first transition into connected.
    async fn on_connected(&self, call: &Call) -> Result<()>;
}

/// Policy for the direct customer↔partner channel: the partner leg pays for
/// the lead, checked up front and debited on connect.
pub struct DirectCallPolicy {
    credits: Arc<dyn CreditAuthority>,
    lead_price: u32,
}

impl DirectCallPolicy {
    pub fn new(credits: Arc<dyn CreditAuthority>, lead_price: u32) -> Self {
        Self {
            credits,
            lead_price,
        }
    }

    fn paying_party<'a>(caller: &'a Party, receiver: &'a Party) -> Option<&'a Party> {
        [receiver, caller]
            .into_iter()
            .find(|p| p.kind == PartyKind::Partner)
    }
}

#[async_trait]
impl CallPolicy for DirectCallPolicy {
    async fn authorize(&self, caller: &Party, receiver: &Party) -> Result<()> {
        let Some(partner) = Self::paying_party(caller, receiver) else {
            return Ok(());
        };

        if self.credits.has_balance(&partner.id, self.lead_price).await? {
            Ok(())
        } else {
            Err(EngineError::insufficient_credit(format!(
                "partner {} cannot cover the {}-credit lead price",
                partner.id, self.lead_price
            )))
        }
    }

    async fn on_connected(&self, call: &Call) -> Result<()> {
        let Some(partner) = Self::paying_party(&call.caller, &call.receiver) else {
            return Ok(());
        };

        self.credits.debit(&partner.id, self.lead_price).await?;
        info!(
            "💳 Debited {} credits from partner {} for call {}",
            self.lead_price, partner.id, call.id
        );
        Ok(())
    }
}

/// Policy for support-bound calls: no charge, queueing handles the rest.
pub struct SupportCallPolicy;

#[async_trait]
impl CallPolicy for SupportCallPolicy {
    async fn authorize(&self, _caller: &Party, _receiver: &Party) -> Result<()> {
        Ok(())
    }

    async fn on_connected(&self, _call: &Call) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingCredit {
        balance: AtomicU32,
    }

    #[async_trait]
    impl CreditAuthority for CountingCredit {
        async fn has_balance(&self, _party: &PartyId, amount: u32) -> Result<bool> {
            Ok(self.balance.load(Ordering::SeqCst) >= amount)
        }

        async fn debit(&self, _party: &PartyId, amount: u32) -> Result<()> {
            self.balance.fetch_sub(amount, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn broke_partner_is_rejected_up_front() {
        let credits = Arc::new(CountingCredit {
            balance: AtomicU32::new(0),
        });
        let policy = DirectCallPolicy::new(credits, 1);

        let err = policy
            .authorize(&Party::customer("cust-1"), &Party::partner("part-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientCredit(_)));
    }

    #[tokio::test]
    async fn admin_to_customer_call_needs_no_credit() {
        let credits = Arc::new(CountingCredit {
            balance: AtomicU32::new(0),
        });
        let policy = DirectCallPolicy::new(credits, 1);

        policy
            .authorize(&Party::admin("ops-1"), &Party::customer("cust-1"))
            .await
            .expect("no partner leg, no charge");
    }
}
