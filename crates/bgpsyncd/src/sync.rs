//! Core discovery and reconciliation pipeline.
//!
//! One pass runs per device and, within a device, sequentially per VRF
//! context: probe the local AS, select a peer schema, normalize peers,
//! collect address-family memberships, then converge the store to the
//! observation. All correlation state is function-scoped to a single
//! context iteration; nothing leaks between contexts.

use std::collections::HashSet;
use std::net::IpAddr;

use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::resolver::AsTextResolver;
use crate::schema::{self, MembershipMap};
use crate::snmp::SnmpTransport;
use crate::store::PeerStore;
use crate::types::{BgpPeer, Device, DiscoverySummary};

/// BGP peer discovery engine.
///
/// Stateless across passes: everything observed lives in locals for the
/// duration of one context iteration, so running engines for different
/// devices concurrently is safe.
pub struct BgpSync<T, S, R> {
    transport: T,
    store: S,
    resolver: R,
}

impl<T, S, R> BgpSync<T, S, R>
where
    T: SnmpTransport,
    S: PeerStore,
    R: AsTextResolver,
{
    pub fn new(transport: T, store: S, resolver: R) -> Self {
        Self {
            transport,
            store,
            resolver,
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The underlying peer store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run discovery for one device across all of its VRF contexts.
    ///
    /// Returns one summary per context. Store failures abort the device;
    /// device-side failures degrade per context.
    #[instrument(skip(self, device), fields(device = %device.hostname, device_id = device.id))]
    pub async fn discover_device(&self, device: &mut Device) -> Result<Vec<DiscoverySummary>> {
        if !device.bgp_enabled {
            debug!("BGP discovery disabled, skipping device");
            return Ok(Vec::new());
        }

        let contexts: Vec<Option<String>> = device
            .vrf_contexts()
            .into_iter()
            .map(|c| c.map(str::to_string))
            .collect();

        let mut summaries = Vec::with_capacity(contexts.len());
        for context in contexts {
            let summary = self.discover_context(device, context.as_deref()).await?;
            info!(
                context = context.as_deref().unwrap_or("default"),
                local_as = summary.local_as,
                peers_added = summary.peers_added,
                peers_removed = summary.peers_removed,
                "Context discovery complete"
            );
            summaries.push(summary);
        }
        Ok(summaries)
    }

    /// One full pipeline pass for a single VRF context.
    #[instrument(skip(self, device), fields(device = %device.hostname))]
    async fn discover_context(
        &self,
        device: &mut Device,
        context: Option<&str>,
    ) -> Result<DiscoverySummary> {
        let mut summary = DiscoverySummary::new(device.id, context);

        let local_as = schema::probe_local_as(&self.transport, device, context).await;
        summary.local_as = local_as;

        match local_as {
            Some(asn) => {
                if device.local_as != Some(asn) {
                    info!(asn, previous = device.local_as, "Local AS changed, updating");
                    self.store.update_device_local_as(device.id, Some(asn)).await?;
                    device.local_as = Some(asn);
                }
            }
            None => {
                info!("No BGP on host");
                if device.local_as.is_some() {
                    self.store.update_device_local_as(device.id, None).await?;
                    device.local_as = None;
                    info!("Cleared stored local AS");
                }
            }
        }

        // Without a local AS there is nothing to walk: the observation is
        // empty and convergence removes whatever the store still has.
        let (peers, families) = if local_as.is_some() {
            self.observe(device, context).await
        } else {
            (Vec::new(), MembershipMap::new())
        };

        self.reconcile(device.id, context, &peers, &families, &mut summary)
            .await?;
        Ok(summary)
    }

    /// Probe the peer schema and produce the normalized observation:
    /// resolved peers plus their address-family membership map.
    async fn observe(
        &self,
        device: &Device,
        context: Option<&str>,
    ) -> (Vec<BgpPeer>, MembershipMap) {
        let probed = schema::probe_peers(&self.transport, device, context).await;
        debug!(schema = ?probed.schema, rows = probed.rows.len(), "Peer table selected");

        let mut peers = Vec::new();
        for (ip, remote_as) in probed.peers() {
            let as_text = self.resolver.resolve(remote_as).await;
            peers.push(BgpPeer {
                ip,
                remote_as,
                as_text,
            });
        }

        let families = probed
            .schema
            .collect_address_families(&self.transport, device, context, &peers)
            .await;

        (peers, families)
    }

    /// Converge the store to the observation.
    ///
    /// Upserts run first so deletion always compares against the current
    /// pass. Peer deletion cascades the peer's membership rows. Membership
    /// deletion is restricted to peers the active vendor path reported
    /// data for: what the path cannot see, it must not delete.
    async fn reconcile(
        &self,
        device_id: u32,
        context: Option<&str>,
        peers: &[BgpPeer],
        families: &MembershipMap,
        summary: &mut DiscoverySummary,
    ) -> Result<()> {
        let existing_peers = self.store.fetch_peers(device_id, context).await?;
        let existing_families = self.store.fetch_address_families(device_id, context).await?;

        let existing_ips: HashSet<IpAddr> = existing_peers.iter().map(|p| p.ip).collect();
        let existing_family_set: HashSet<_> = existing_families
            .iter()
            .map(|m| (m.peer_ip, m.afi, m.safi))
            .collect();

        for peer in peers {
            self.store.upsert_peer(device_id, context, peer).await?;
            if existing_ips.contains(&peer.ip) {
                summary.peers_updated += 1;
            } else {
                summary.peers_added += 1;
            }
        }

        for (&ip, memberships) in families {
            for &(afi, safi) in memberships {
                self.store
                    .upsert_address_family(device_id, context, ip, afi, safi)
                    .await?;
                if !existing_family_set.contains(&(ip, afi, safi)) {
                    summary.families_added += 1;
                }
            }
        }

        for membership in &existing_families {
            let Some(observed) = families.get(&membership.peer_ip) else {
                continue;
            };
            if !observed.contains(&(membership.afi, membership.safi)) {
                self.store
                    .delete_address_family(
                        device_id,
                        context,
                        membership.peer_ip,
                        membership.afi,
                        membership.safi,
                    )
                    .await?;
                summary.families_removed += 1;
            }
        }

        let observed_ips: HashSet<IpAddr> = peers.iter().map(|p| p.ip).collect();
        for peer in &existing_peers {
            if !observed_ips.contains(&peer.ip) {
                warn!(ip = %peer.ip, "Peer no longer observed, removing");
                self.store.delete_peer(device_id, context, peer.ip).await?;
                summary.peers_removed += 1;
            }
        }

        Ok(())
    }
}
