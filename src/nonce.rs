//! Authorization nonce reservations.
//!
//! Concurrent submissions of the same account must not build authorizations for the same nonce.
//! Reservations are serialized per `(chain, address)` and never hand out a nonce twice, even if
//! the chain has not caught up with earlier reservations yet.

use std::{future::Future, sync::Arc};

use alloy::primitives::{Address, ChainId};
use dashmap::DashMap;
use futures_util::lock::Mutex;
use tracing::trace;

/// [`NonceReservations`] hands out authorization nonces for multiple chains and addresses.
#[derive(Clone, Debug, Default)]
pub struct NonceReservations {
    /// The last reserved nonce per account, `None` if the next reservation should trust the
    /// chain.
    #[allow(clippy::type_complexity)]
    nonces: Arc<DashMap<(ChainId, Address), Arc<Mutex<Option<u64>>>>>,
}

impl NonceReservations {
    /// Reserves the next nonce of `address` on `chain_id`.
    ///
    /// `fetch` reads the current on-chain nonce. The reservation is the greater of the on-chain
    /// nonce and the last reservation plus one.
    pub async fn reserve<F, Fut, E>(
        &self,
        chain_id: ChainId,
        address: Address,
        fetch: F,
    ) -> Result<u64, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<u64, E>>,
    {
        let slot = self.slot(chain_id, address);

        // Held across the fetch, so concurrent reservations observe each other.
        let mut last = slot.lock().await;
        let onchain = fetch().await?;
        let nonce = match *last {
            Some(last) => onchain.max(last + 1),
            None => onchain,
        };
        *last = Some(nonce);

        trace!(chain_id, %address, onchain, nonce, "reserved nonce");
        Ok(nonce)
    }

    /// Releases `nonce` if it is the latest reservation of the account.
    ///
    /// Called when the authorization carrying it never left the client, so the nonce is not
    /// skipped by the next reservation.
    pub async fn release(&self, chain_id: ChainId, address: Address, nonce: u64) {
        let slot = self.slot(chain_id, address);
        let mut last = slot.lock().await;
        if *last == Some(nonce) {
            *last = nonce.checked_sub(1);
            trace!(chain_id, %address, nonce, "released nonce");
        }
    }

    fn slot(&self, chain_id: ChainId, address: Address) -> Arc<Mutex<Option<u64>>> {
        // Locks dashmap internally for a short duration to clone the `Arc`.
        // We also don't want to hold the dashmap lock through any await point.
        let rm = self
            .nonces
            .entry((chain_id, address))
            .or_insert_with(|| Arc::new(Mutex::new(None)));
        Arc::clone(rm.value())
    }
}
