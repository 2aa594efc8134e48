//! Vendor MIB schema probing, peer-row normalization and address-family
//! collection.
//!
//! Exactly one peer-table schema is selected per device+context, in
//! vendor priority order, with the standard BGP4-MIB as the fallback when
//! a vendor table is empty or unsupported. All vendor dispatch lives in
//! this module (and the Juniper correlator it delegates to); the rest of
//! the pipeline only sees normalized peers and membership maps.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};

use itertools::Itertools;
use tracing::{debug, instrument};

use crate::juniper::JuniperCorrelator;
use crate::snmp::{SnmpRow, SnmpTransport};
use crate::types::{Afi, BgpPeer, Device, Safi, Vendor, ip_from_bytes};

/// Standard BGP4-MIB (RFC 4273).
pub const BGP4_MIB: &str = "BGP4-MIB";
/// Cisco vendor MIB.
pub const CISCO_BGP4_MIB: &str = "CISCO-BGP4-MIB";
/// Arista vendor MIB.
pub const ARISTA_BGP4V2_MIB: &str = "ARISTA-BGP4V2-MIB";
/// Juniper vendor MIB.
pub const JUNIPER_BGP_MIB: &str = "BGP4-V2-MIB-JUNIPER";

const BGP_LOCAL_AS: &str = "bgpLocalAs";
const BGP_PEER_REMOTE_AS: &str = "bgpPeerRemoteAs";
const CISCO_PEER2_REMOTE_AS: &str = "cbgpPeer2RemoteAs";
const ARISTA_PEER_REMOTE_AS: &str = "aristaBgp4V2PeerRemoteAs";
const JUNIPER_PEER_REMOTE_AS: &str = "jnxBgpM2PeerRemoteAs";
const CISCO_PEER2_AF_NAME: &str = "cbgpPeer2AddrFamilyName";
const CISCO_PEER_AF_NAME: &str = "cbgpPeerAddrFamilyName";
const ARISTA_PREFIX_IN: &str = "aristaBgp4V2PrefixInPrefixes";

/// The peer-table schema selected for one device+context pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerSchema {
    /// ARISTA-BGP4V2-MIB peer table.
    AristaV2,
    /// BGP4-V2-MIB-JUNIPER peer table.
    Juniper,
    /// CISCO-BGP4-MIB v2 peer table.
    CiscoV2,
    /// Standard BGP4-MIB fallback. Disables the Juniper address-family
    /// path even on devices identified as Juniper.
    Bgp4Mib,
}

impl PeerSchema {
    /// Whether the generic fallback was taken.
    pub fn is_fallback(&self) -> bool {
        matches!(self, PeerSchema::Bgp4Mib)
    }
}

/// Result of probing the peer table: the schema that answered and its raw
/// rows.
#[derive(Debug, Clone)]
pub struct ProbedPeers {
    pub schema: PeerSchema,
    pub rows: Vec<SnmpRow>,
}

/// Per-peer observed membership sets, keyed by remote address.
pub type MembershipMap = HashMap<IpAddr, BTreeSet<(Afi, Safi)>>;

/// Read the device's local AS via get-next. `None` means the device does
/// not speak BGP (object absent or non-numeric); transport failure is
/// treated the same way.
pub async fn probe_local_as<T: SnmpTransport>(
    transport: &T,
    device: &Device,
    context: Option<&str>,
) -> Option<u32> {
    match transport.get_next(device, context, BGP4_MIB, BGP_LOCAL_AS).await {
        Ok(value) => value.and_then(|v| v.trim().parse::<u32>().ok()),
        Err(e) => {
            debug!(error = %e, "bgpLocalAs read failed, treating BGP as absent");
            None
        }
    }
}

/// Select the peer-table schema for this device+context and return its
/// raw rows.
///
/// Priority: Arista, then Juniper, then Cisco; any empty or failed vendor
/// walk falls back to the standard BGP4-MIB.
#[instrument(skip(transport, device), fields(device = %device.hostname))]
pub async fn probe_peers<T: SnmpTransport>(
    transport: &T,
    device: &Device,
    context: Option<&str>,
) -> ProbedPeers {
    let (schema, rows) = match device.vendor() {
        Vendor::Arista => (
            PeerSchema::AristaV2,
            try_walk(transport, device, context, ARISTA_BGP4V2_MIB, ARISTA_PEER_REMOTE_AS).await,
        ),
        Vendor::Juniper => (
            PeerSchema::Juniper,
            try_walk(transport, device, context, JUNIPER_BGP_MIB, JUNIPER_PEER_REMOTE_AS).await,
        ),
        Vendor::Cisco => (
            PeerSchema::CiscoV2,
            try_walk(transport, device, context, CISCO_BGP4_MIB, CISCO_PEER2_REMOTE_AS).await,
        ),
        Vendor::Other => (PeerSchema::Bgp4Mib, Vec::new()),
    };

    if rows.is_empty() {
        if !schema.is_fallback() {
            debug!(?schema, "vendor peer table empty, falling back to BGP4-MIB");
        }
        let rows = try_walk(transport, device, context, BGP4_MIB, BGP_PEER_REMOTE_AS).await;
        return ProbedPeers {
            schema: PeerSchema::Bgp4Mib,
            rows,
        };
    }

    ProbedPeers { schema, rows }
}

impl ProbedPeers {
    /// Normalize the raw walk rows into (ip, remote AS) pairs, collapsing
    /// the vendor row shapes into one representation. Unparsable rows are
    /// logged and skipped; duplicate addresses keep the first occurrence.
    pub fn peers(&self) -> Vec<(IpAddr, u32)> {
        self.rows
            .iter()
            .filter_map(|row| match self.schema.peer_from_row(row) {
                Some(peer) => Some(peer),
                None => {
                    debug!(index = %row.index, value = %row.value, "skipping unparsable peer row");
                    None
                }
            })
            .unique_by(|&(ip, _)| ip)
            .collect()
    }
}

impl PeerSchema {
    /// Decode one raw walk row into (remote ip, remote AS).
    fn peer_from_row(&self, row: &SnmpRow) -> Option<(IpAddr, u32)> {
        let remote_as = row.value.trim().parse::<u32>().ok()?;
        let parts = index_parts(&row.index)?;
        let ip = match self {
            // Index: the dotted IPv4 peer address.
            PeerSchema::Bgp4Mib => {
                let octets: Vec<u8> = parts
                    .iter()
                    .map(|&p| u8::try_from(p).ok())
                    .collect::<Option<_>>()?;
                if octets.len() != 4 {
                    return None;
                }
                IpAddr::V4(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
            }
            // Index: addr-type, addr-len, addr bytes.
            PeerSchema::CiscoV2 => {
                let (ip, rest) = take_inet_address(&parts)?;
                if !rest.is_empty() {
                    return None;
                }
                ip
            }
            // Index: instance, addr-type, addr-len, addr bytes.
            PeerSchema::AristaV2 => {
                let (ip, rest) = take_inet_address(parts.get(1..)?)?;
                if !rest.is_empty() {
                    return None;
                }
                ip
            }
            // Index: instance, then local and remote endpoint addresses.
            PeerSchema::Juniper => {
                let (_local, rest) = take_inet_address(parts.get(1..)?)?;
                let (remote, rest) = take_inet_address(rest)?;
                if !rest.is_empty() {
                    return None;
                }
                remote
            }
        };
        Some((ip, remote_as))
    }

    /// Collect per-peer AFI/SAFI membership for the peers observed in
    /// this pass.
    ///
    /// Three genuinely different algorithms, selected by vendor: Cisco and
    /// Arista expose address-family tables keyed by peer address, Juniper
    /// needs the index correlator, and anything else yields an empty map
    /// (the reconciler then leaves persisted memberships alone).
    #[instrument(skip(transport, device, peers), fields(device = %device.hostname))]
    pub async fn collect_address_families<T: SnmpTransport>(
        &self,
        transport: &T,
        device: &Device,
        context: Option<&str>,
        peers: &[BgpPeer],
    ) -> MembershipMap {
        let mut map = MembershipMap::new();

        match device.vendor() {
            Vendor::Cisco => {
                let v2 = matches!(self, PeerSchema::CiscoV2);
                let oid = if v2 { CISCO_PEER2_AF_NAME } else { CISCO_PEER_AF_NAME };
                for row in try_walk(transport, device, context, CISCO_BGP4_MIB, oid).await {
                    match cisco_af_from_index(v2, &row.index) {
                        Some((ip, afi, safi)) => {
                            map.entry(ip).or_default().insert((afi, safi));
                        }
                        None => {
                            debug!(index = %row.index, "skipping unparsable address-family row")
                        }
                    }
                }
            }
            Vendor::Arista => {
                for row in
                    try_walk(transport, device, context, ARISTA_BGP4V2_MIB, ARISTA_PREFIX_IN).await
                {
                    match arista_af_from_index(&row.index) {
                        Some((ip, afi, safi)) => {
                            map.entry(ip).or_default().insert((afi, safi));
                        }
                        None => {
                            debug!(index = %row.index, "skipping unparsable prefix-count row")
                        }
                    }
                }
            }
            // The correlator is only usable when the Juniper peer table
            // itself answered; after the BGP4-MIB fallback its indexes
            // would not line up with the observed peers.
            Vendor::Juniper if !self.is_fallback() => {
                let correlator = JuniperCorrelator::load(transport, device, context).await;
                for peer in peers {
                    let families = correlator.memberships(&peer.ip);
                    if !families.is_empty() {
                        map.entry(peer.ip).or_default().extend(families);
                    }
                }
            }
            _ => {}
        }

        // Membership only makes sense for peers observed in this pass.
        let observed: HashSet<IpAddr> = peers.iter().map(|p| p.ip).collect();
        map.retain(|ip, _| observed.contains(ip));
        map
    }
}

/// Walk that treats transport failure as an empty (unsupported) table.
async fn try_walk<T: SnmpTransport>(
    transport: &T,
    device: &Device,
    context: Option<&str>,
    mib: &str,
    oid: &str,
) -> Vec<SnmpRow> {
    match transport.walk(device, context, mib, oid).await {
        Ok(rows) => rows,
        Err(e) => {
            debug!(mib, oid, error = %e, "walk failed, treating table as unsupported");
            Vec::new()
        }
    }
}

/// Split an OID index suffix into its numeric sub-identifiers.
fn index_parts(index: &str) -> Option<Vec<u32>> {
    if index.is_empty() {
        return None;
    }
    index.split('.').map(|p| p.parse::<u32>().ok()).collect()
}

/// Consume an InetAddressType + length-prefixed InetAddress from the
/// front of an index, returning the decoded address and the remainder.
fn take_inet_address(parts: &[u32]) -> Option<(IpAddr, &[u32])> {
    let addr_type = *parts.first()?;
    let len = *parts.get(1)? as usize;
    let raw = parts.get(2..2 + len)?;
    let bytes: Vec<u8> = raw.iter().map(|&b| u8::try_from(b).ok()).collect::<Option<_>>()?;
    let ip = ip_from_bytes(&bytes)?;
    // The declared type has to agree with the decoded length.
    match (addr_type, ip) {
        (1, IpAddr::V4(_)) | (2, IpAddr::V6(_)) => Some((ip, &parts[2 + len..])),
        _ => None,
    }
}

/// Cisco address-family index: peer address then afi.safi. The v2 table
/// uses a typed variable-length address, the legacy table a plain IPv4.
fn cisco_af_from_index(v2: bool, index: &str) -> Option<(IpAddr, Afi, Safi)> {
    let parts = index_parts(index)?;
    let (ip, rest) = if v2 {
        take_inet_address(&parts)?
    } else {
        let octets: Vec<u8> = parts
            .get(..4)?
            .iter()
            .map(|&p| u8::try_from(p).ok())
            .collect::<Option<_>>()?;
        (
            IpAddr::V4(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3])),
            parts.get(4..)?,
        )
    };
    let (afi, safi) = decode_af_pair(rest)?;
    Some((ip, afi, safi))
}

/// Arista prefix-count index: instance, peer address, afi.safi.
fn arista_af_from_index(index: &str) -> Option<(IpAddr, Afi, Safi)> {
    let parts = index_parts(index)?;
    let (ip, rest) = take_inet_address(parts.get(1..)?)?;
    let (afi, safi) = decode_af_pair(rest)?;
    Some((ip, afi, safi))
}

/// Decode a trailing `[afi, safi]` pair against the fixed lookup tables.
fn decode_af_pair(rest: &[u32]) -> Option<(Afi, Safi)> {
    match rest {
        [afi, safi] => Some((Afi::from_code(*afi)?, Safi::from_code(*safi)?)),
        _ => None,
    }
}
