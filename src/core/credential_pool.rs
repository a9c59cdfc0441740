//! Credential pool with per-credential quota enforcement.
//!
//! Credential order is shuffled once when the pool is built, then jobs are
//! assigned round-robin over that fixed order. All quota trackers sit behind a
//! single `parking_lot::Mutex`; every check and mutation happens inside it, so
//! a capacity check and the matching reservation can never be split by another
//! attempt.

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::{DispatchError, QuotaTracker};
use crate::util::CredentialId;

/// Position of a credential inside a pool's (post-shuffle) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CredentialSlot(usize);

impl CredentialSlot {
    /// Index into the pool order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A sender identity together with its quota.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Opaque identity handed to the transport.
    pub id: CredentialId,
    /// Quota state for this run.
    pub quota: QuotaTracker,
}

/// Per-credential usage line for run reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialUsage {
    /// Credential identity.
    pub id: CredentialId,
    /// Successful sends.
    pub used: u32,
    /// Ceiling.
    pub limit: u32,
}

/// Set of credentials available to one dispatch run.
pub struct CredentialPool {
    ids: Vec<CredentialId>,
    quotas: Mutex<Vec<QuotaTracker>>,
}

impl CredentialPool {
    /// Build a pool from credential sources, shuffling their order once.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NoCredentials`] when `sources` is empty.
    pub fn initialize<R>(
        mut sources: Vec<CredentialId>,
        limit: u32,
        rng: &mut R,
    ) -> Result<Self, DispatchError>
    where
        R: Rng + ?Sized,
    {
        sources.shuffle(rng);
        Self::from_ordered(sources, limit)
    }

    /// Build a pool keeping the given order.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NoCredentials`] when `sources` is empty.
    pub fn from_ordered(sources: Vec<CredentialId>, limit: u32) -> Result<Self, DispatchError> {
        if sources.is_empty() {
            return Err(DispatchError::NoCredentials);
        }
        let quotas = sources.iter().map(|_| QuotaTracker::new(limit)).collect();
        tracing::debug!(credentials = sources.len(), limit, "credential pool initialized");
        Ok(Self {
            ids: sources,
            quotas: Mutex::new(quotas),
        })
    }

    /// Number of credentials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Always false for a constructed pool; present for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Credential identities in pool order.
    #[must_use]
    pub fn ids(&self) -> &[CredentialId] {
        &self.ids
    }

    /// Round-robin slot for the job at `job_index` of the original list.
    #[must_use]
    pub fn select_for(&self, job_index: usize) -> CredentialSlot {
        CredentialSlot(job_index % self.ids.len())
    }

    /// Identity at `slot`.
    #[must_use]
    pub fn credential(&self, slot: CredentialSlot) -> &CredentialId {
        &self.ids[slot.0]
    }

    /// Reserve one unit of `slot`'s quota if any remains.
    pub fn try_reserve(&self, slot: CredentialSlot) -> bool {
        self.quotas.lock()[slot.0].try_reserve()
    }

    /// Record a confirmed successful send against `slot`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::QuotaExhausted`] if the send was not covered by
    /// a reservation and the limit is already reached.
    pub fn record_sent(&self, slot: CredentialSlot) -> Result<(), DispatchError> {
        if self.quotas.lock()[slot.0].commit() {
            Ok(())
        } else {
            Err(DispatchError::QuotaExhausted(self.ids[slot.0].clone()))
        }
    }

    /// Give back a reservation for a job that ended without sending.
    pub fn release(&self, slot: CredentialSlot) {
        self.quotas.lock()[slot.0].release();
    }

    /// Reserve capacity on the first credential at or after `from` (wrapping)
    /// that still has some.
    pub fn reserve_next_usable(&self, from: CredentialSlot) -> Option<CredentialSlot> {
        let mut quotas = self.quotas.lock();
        let n = quotas.len();
        (0..n)
            .map(|offset| (from.0 + offset) % n)
            .find(|&i| quotas[i].try_reserve())
            .map(CredentialSlot)
    }

    /// First credential at or after `from` (wrapping) with remaining capacity,
    /// without reserving it.
    #[must_use]
    pub fn next_usable(&self, from: CredentialSlot) -> Option<CredentialSlot> {
        let quotas = self.quotas.lock();
        let n = quotas.len();
        (0..n)
            .map(|offset| (from.0 + offset) % n)
            .find(|&i| !quotas[i].is_exhausted())
            .map(CredentialSlot)
    }

    /// Copy of the credential and quota at `slot`.
    #[must_use]
    pub fn snapshot(&self, slot: CredentialSlot) -> Credential {
        Credential {
            id: self.ids[slot.0].clone(),
            quota: self.quotas.lock()[slot.0].clone(),
        }
    }

    /// Per-credential usage in pool order.
    #[must_use]
    pub fn usage(&self) -> Vec<CredentialUsage> {
        let quotas = self.quotas.lock();
        self.ids
            .iter()
            .zip(quotas.iter())
            .map(|(id, q)| CredentialUsage {
                id: id.clone(),
                used: q.used(),
                limit: q.limit(),
            })
            .collect()
    }
}
