//! Persistent store contract for discovered BGP state.
//!
//! All keys are scoped by device and VRF context (`None` = default
//! context). Upserts must only touch the identity fields they own so
//! unrelated columns written by other collectors survive a discovery
//! pass. Store failures are fatal for the device+context being processed
//! and propagate to the caller.

use std::net::IpAddr;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Afi, AfMembership, BgpPeer, Safi};

/// Query/update primitives for persisted peers and address-family
/// memberships.
#[async_trait]
pub trait PeerStore: Send + Sync {
    /// Persist the device's local AS. `None` clears a previously stored
    /// value.
    async fn update_device_local_as(&self, device_id: u32, local_as: Option<u32>) -> Result<()>;

    /// Insert or update a peer row (keyed by remote IP).
    async fn upsert_peer(
        &self,
        device_id: u32,
        context: Option<&str>,
        peer: &BgpPeer,
    ) -> Result<()>;

    /// Delete a peer row and all of its address-family memberships.
    async fn delete_peer(&self, device_id: u32, context: Option<&str>, ip: IpAddr) -> Result<()>;

    /// All persisted peers for a device+context.
    async fn fetch_peers(&self, device_id: u32, context: Option<&str>) -> Result<Vec<BgpPeer>>;

    /// Insert or update one (peer, afi, safi) membership row.
    async fn upsert_address_family(
        &self,
        device_id: u32,
        context: Option<&str>,
        ip: IpAddr,
        afi: Afi,
        safi: Safi,
    ) -> Result<()>;

    /// Delete one membership row.
    async fn delete_address_family(
        &self,
        device_id: u32,
        context: Option<&str>,
        ip: IpAddr,
        afi: Afi,
        safi: Safi,
    ) -> Result<()>;

    /// All persisted memberships for a device+context.
    async fn fetch_address_families(
        &self,
        device_id: u32,
        context: Option<&str>,
    ) -> Result<Vec<AfMembership>>;
}
