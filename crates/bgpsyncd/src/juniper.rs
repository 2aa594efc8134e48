//! Juniper index correlation.
//!
//! BGP4-V2-MIB-JUNIPER keys its prefix counters by an internal peer index
//! rather than the peer address, so membership discovery needs two extra
//! walks: the peer entry table (index + raw remote address per row) and
//! the prefix counters table (peer index + afi.safi per row). Both are
//! walked exactly once per VRF-context iteration; the correlator must not
//! be reused across contexts.

use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;

use tracing::{debug, instrument};

use crate::schema::JUNIPER_BGP_MIB;
use crate::snmp::SnmpTransport;
use crate::types::{Afi, Device, Safi, ip_from_hex};

const PEER_ENTRY: &str = "jnxBgpM2PeerEntry";
const PEER_INDEX_COL: &str = "jnxBgpM2PeerIndex";
const PEER_REMOTE_ADDR_COL: &str = "jnxBgpM2PeerRemoteAddr";
const PREFIX_COUNTERS: &str = "jnxBgpM2PrefixCountersInPrefixes";

/// Correlates peer addresses to per-address-family counters via the
/// vendor-internal peer index.
#[derive(Debug, Default)]
pub struct JuniperCorrelator {
    /// Remote address -> internal peer index.
    peer_indexes: HashMap<IpAddr, u32>,
    /// Internal peer index -> raw (afi, safi) code pairs.
    afi_safi: HashMap<u32, Vec<(u32, u32)>>,
}

impl JuniperCorrelator {
    /// Build the correlation maps with one walk of each table. Transport
    /// failures and unparsable rows degrade to missing entries, never to
    /// a hard failure.
    #[instrument(skip(transport, device), fields(device = %device.hostname))]
    pub async fn load<T: SnmpTransport>(
        transport: &T,
        device: &Device,
        context: Option<&str>,
    ) -> Self {
        let mut correlator = Self::default();

        let peer_rows = match transport
            .walk_indexed(
                device,
                context,
                JUNIPER_BGP_MIB,
                PEER_ENTRY,
                &[PEER_INDEX_COL, PEER_REMOTE_ADDR_COL],
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                debug!(error = %e, "peer entry walk failed, no correlation data");
                return correlator;
            }
        };

        for (index, row) in &peer_rows {
            let peer_index = row
                .get(PEER_INDEX_COL)
                .and_then(|v| v.trim().parse::<u32>().ok());
            let remote = row.get(PEER_REMOTE_ADDR_COL).and_then(|v| ip_from_hex(v));
            match (peer_index, remote) {
                (Some(peer_index), Some(ip)) => {
                    debug!(%ip, peer_index, "correlated peer index");
                    correlator.peer_indexes.insert(ip, peer_index);
                }
                _ => {
                    debug!(row = %index, "unable to parse peer index row, skipping");
                }
            }
        }

        match transport
            .walk(device, context, JUNIPER_BGP_MIB, PREFIX_COUNTERS)
            .await
        {
            Ok(rows) => {
                for row in rows {
                    match counters_index(&row.index) {
                        Some((peer_index, afi, safi)) => {
                            correlator
                                .afi_safi
                                .entry(peer_index)
                                .or_default()
                                .push((afi, safi));
                        }
                        None => {
                            debug!(index = %row.index, "unable to parse prefix counters row, skipping")
                        }
                    }
                }
            }
            Err(e) => debug!(error = %e, "prefix counters walk failed, no membership data"),
        }

        correlator
    }

    /// Decoded AFI/SAFI memberships for one peer. An address missing from
    /// the index map (correlation failure) simply yields an empty set.
    pub fn memberships(&self, ip: &IpAddr) -> BTreeSet<(Afi, Safi)> {
        let Some(peer_index) = self.peer_indexes.get(ip) else {
            debug!(%ip, "peer not present in index map, no memberships");
            return BTreeSet::new();
        };

        self.afi_safi
            .get(peer_index)
            .into_iter()
            .flatten()
            .filter_map(|&(afi, safi)| {
                match (Afi::from_code(afi), Safi::from_code(safi)) {
                    (Some(afi), Some(safi)) => Some((afi, safi)),
                    _ => {
                        debug!(afi, safi, "unknown afi/safi code pair, skipping");
                        None
                    }
                }
            })
            .collect()
    }
}

/// Decompose a prefix-counters index into (peer index, afi, safi).
fn counters_index(index: &str) -> Option<(u32, u32, u32)> {
    let mut parts = index.split('.').map(|p| p.parse::<u32>().ok());
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(Some(peer)), Some(Some(afi)), Some(Some(safi)), None) => Some((peer, afi, safi)),
        _ => None,
    }
}
