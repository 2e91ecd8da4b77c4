//! Per-address, per-packet-kind throttling

use crate::error::PacketError;
use shared::PacketKind;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Last accepted time of each (address, kind) pair
///
/// Entries appear lazily on the first packet of a kind and are purged when
/// the address disconnects.
#[derive(Debug, Default)]
pub struct RateLimitLedger {
    last_accepted: HashMap<SocketAddr, HashMap<PacketKind, Instant>>,
}

impl RateLimitLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts the packet and records `now`, or refuses it untouched
    ///
    /// Accepted when there is no earlier entry or at least `interval` has
    /// passed since the last accepted packet of the same kind.
    pub fn check_and_record(
        &mut self,
        addr: SocketAddr,
        kind: PacketKind,
        interval: Duration,
        now: Instant,
    ) -> Result<(), PacketError> {
        let per_kind = self.last_accepted.entry(addr).or_default();

        if let Some(last) = per_kind.get(&kind) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < interval {
                return Err(PacketError::throttled(kind, elapsed, interval));
            }
        }

        per_kind.insert(kind, now);
        Ok(())
    }

    /// Drops every entry of `addr`
    pub fn purge(&mut self, addr: &SocketAddr) -> bool {
        self.last_accepted.remove(addr).is_some()
    }

    pub fn tracked_addresses(&self) -> usize {
        self.last_accepted.len()
    }
}
