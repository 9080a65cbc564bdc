//! Per-identity claim history and the rolling-window rate rule.
//!
//! [`ClaimLedger`] keeps, for every [`RequesterIdentity`], the timestamps of
//! its recent claims. A claim is first *reserved* (counted against the limit
//! but tentative), then either *committed* once the transfer is broadcast or
//! *rolled back* if it fails. Reservation is atomic per identity: the map's
//! shard lock is held while counting and appending, so two concurrent requests
//! from the same identity can never both take the last slot.
//!
//! State lives for the lifetime of the process only.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

use crate::asset::RequesterIdentity;
use crate::timestamp::UnixTimestamp;

#[derive(Debug, Clone, Copy)]
struct ClaimEntry {
    at: UnixTimestamp,
    id: u64,
    pending: bool,
}

/// Handle to a tentative claim returned by [`ClaimLedger::try_reserve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    identity: RequesterIdentity,
    id: u64,
    at: UnixTimestamp,
}

impl Reservation {
    /// Identity the reservation belongs to.
    #[must_use]
    pub const fn identity(&self) -> RequesterIdentity {
        self.identity
    }

    /// Time the reservation was taken.
    #[must_use]
    pub const fn reserved_at(&self) -> UnixTimestamp {
        self.at
    }
}

/// Result of [`ClaimLedger::try_reserve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// A slot was taken; commit or roll it back.
    Reserved(Reservation),
    /// The identity is at its limit until `next_eligible_at`.
    Denied {
        /// Earliest time a new claim can succeed.
        next_eligible_at: UnixTimestamp,
    },
}

/// In-memory record of recent claims per identity.
#[derive(Debug)]
pub struct ClaimLedger {
    limit: NonZeroU32,
    window: Duration,
    claims: DashMap<RequesterIdentity, Vec<ClaimEntry>>,
    next_id: AtomicU64,
}

impl ClaimLedger {
    /// Creates an empty ledger allowing `limit` claims per rolling `window`.
    #[must_use]
    pub fn new(limit: NonZeroU32, window: Duration) -> Self {
        Self {
            limit,
            window,
            claims: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Maximum number of claims per window.
    #[must_use]
    pub const fn limit(&self) -> NonZeroU32 {
        self.limit
    }

    /// Length of the rolling window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    fn in_window(&self, entry: &ClaimEntry, now: UnixTimestamp) -> bool {
        now.saturating_duration_since(entry.at) < self.window
    }

    /// Attempts to take a claim slot for `identity` at `now`.
    ///
    /// Committed and pending entries both count. When the identity is at its
    /// limit the result carries the time the oldest blocking entry expires.
    pub fn try_reserve(&self, identity: RequesterIdentity, now: UnixTimestamp) -> ReserveOutcome {
        let limit = self.limit.get() as usize;
        let mut entries = self.claims.entry(identity).or_default();
        entries.retain(|e| e.pending || self.in_window(e, now));

        let mut active = entries
            .iter()
            .filter(|e| self.in_window(e, now))
            .map(|e| e.at)
            .collect::<Vec<_>>();
        if active.len() >= limit {
            active.sort_unstable();
            let next_eligible_at = active[active.len() - limit] + self.window;
            #[cfg(feature = "telemetry")]
            tracing::debug!(%identity, claims = active.len(), %next_eligible_at, "claim denied");
            return ReserveOutcome::Denied { next_eligible_at };
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        entries.push(ClaimEntry {
            at: now,
            id,
            pending: true,
        });
        #[cfg(feature = "telemetry")]
        tracing::debug!(%identity, reservation = id, "claim reserved");
        ReserveOutcome::Reserved(Reservation {
            identity,
            id,
            at: now,
        })
    }

    /// Makes a reservation permanent.
    ///
    /// Returns `true` if this call committed it, `false` if it was already
    /// committed or has been rolled back.
    pub fn commit(&self, reservation: &Reservation) -> bool {
        let Some(mut entries) = self.claims.get_mut(&reservation.identity) else {
            return false;
        };
        match entries.iter_mut().find(|e| e.id == reservation.id) {
            Some(entry) if entry.pending => {
                entry.pending = false;
                true
            }
            _ => false,
        }
    }

    /// Removes a pending reservation, restoring the state before it was taken.
    ///
    /// Returns `true` if this call removed it. Rolling back twice, or after
    /// commit, is a no-op.
    pub fn rollback(&self, reservation: &Reservation) -> bool {
        let removed = {
            let Some(mut entries) = self.claims.get_mut(&reservation.identity) else {
                return false;
            };
            let before = entries.len();
            entries.retain(|e| !(e.id == reservation.id && e.pending));
            entries.len() != before
        };
        if removed {
            self.claims
                .remove_if(&reservation.identity, |_, entries| entries.is_empty());
        }
        removed
    }

    /// Drops expired committed entries and identities with nothing left.
    ///
    /// Returns the number of identities still tracked.
    pub fn prune(&self, now: UnixTimestamp) -> usize {
        self.claims.retain(|_, entries| {
            entries.retain(|e| e.pending || self.in_window(e, now));
            !entries.is_empty()
        });
        self.claims.len()
    }

    /// Number of claims (committed or pending) that count against `identity` at `now`.
    #[must_use]
    pub fn claims_in_window(&self, identity: RequesterIdentity, now: UnixTimestamp) -> usize {
        self.claims.get(&identity).map_or(0, |entries| {
            entries.iter().filter(|e| self.in_window(e, now)).count()
        })
    }

    /// Number of committed claims that count against `identity` at `now`.
    #[must_use]
    pub fn committed_in_window(&self, identity: RequesterIdentity, now: UnixTimestamp) -> usize {
        self.claims.get(&identity).map_or(0, |entries| {
            entries
                .iter()
                .filter(|e| !e.pending && self.in_window(e, now))
                .count()
        })
    }

    /// Number of identities currently tracked.
    #[must_use]
    pub fn tracked_identities(&self) -> usize {
        self.claims.len()
    }
}
