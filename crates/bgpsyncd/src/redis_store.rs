//! Redis-backed `PeerStore`.
//!
//! Layout follows the hash-per-row table convention:
//!
//! - `BGP_DEVICE_TABLE|{device}` — field `local_as`
//! - `BGP_PEER_TABLE|{device}|{context}|{ip}` — fields `remote_as`,
//!   `as_text`
//! - `BGP_PEER_AF_TABLE|{device}|{context}|{ip}|{afi}|{safi}` — fields
//!   `afi`, `safi`
//!
//! The context segment is empty for the default context. Peer upserts
//! only write the identity fields, leaving any other fields on the hash
//! (poller counters, session state) untouched.

use std::net::IpAddr;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::store::PeerStore;
use crate::types::{Afi, AfMembership, BgpPeer, Safi};

const DEVICE_TABLE: &str = "BGP_DEVICE_TABLE";
const PEER_TABLE: &str = "BGP_PEER_TABLE";
const PEER_AF_TABLE: &str = "BGP_PEER_AF_TABLE";

/// Redis-backed peer store.
#[derive(Clone)]
pub struct RedisPeerStore {
    conn: ConnectionManager,
}

impl RedisPeerStore {
    /// Connect to the Redis database backing the peer tables.
    #[instrument]
    pub async fn new(host: &str, port: u16) -> Result<Self> {
        debug!("Connecting to Redis");
        let client = Client::open(format!("redis://{host}:{port}/"))?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn conn(&self) -> ConnectionManager {
        // ConnectionManager is a cheap clonable handle over one
        // multiplexed connection.
        self.conn.clone()
    }
}

fn context_segment(context: Option<&str>) -> &str {
    context.unwrap_or("")
}

fn device_key(device_id: u32) -> String {
    format!("{DEVICE_TABLE}|{device_id}")
}

fn peer_key(device_id: u32, context: Option<&str>, ip: IpAddr) -> String {
    format!("{PEER_TABLE}|{device_id}|{}|{ip}", context_segment(context))
}

fn peer_pattern(device_id: u32, context: Option<&str>) -> String {
    format!("{PEER_TABLE}|{device_id}|{}|*", context_segment(context))
}

fn af_key(device_id: u32, context: Option<&str>, ip: IpAddr, afi: Afi, safi: Safi) -> String {
    format!(
        "{PEER_AF_TABLE}|{device_id}|{}|{ip}|{afi}|{safi}",
        context_segment(context)
    )
}

fn af_pattern_for_peer(device_id: u32, context: Option<&str>, ip: IpAddr) -> String {
    format!("{PEER_AF_TABLE}|{device_id}|{}|{ip}|*", context_segment(context))
}

fn af_pattern(device_id: u32, context: Option<&str>) -> String {
    format!("{PEER_AF_TABLE}|{device_id}|{}|*", context_segment(context))
}

/// Parse `ip|afi|safi` out of a membership key.
fn membership_from_key(key: &str) -> Option<AfMembership> {
    let mut tail = key.rsplit('|');
    let safi = tail.next()?.parse::<Safi>().ok()?;
    let afi = tail.next()?.parse::<Afi>().ok()?;
    let peer_ip = tail.next()?.parse::<IpAddr>().ok()?;
    Some(AfMembership { peer_ip, afi, safi })
}

#[async_trait]
impl PeerStore for RedisPeerStore {
    #[instrument(skip(self))]
    async fn update_device_local_as(&self, device_id: u32, local_as: Option<u32>) -> Result<()> {
        let mut conn = self.conn();
        let key = device_key(device_id);
        match local_as {
            Some(asn) => {
                let _: () = conn.hset(&key, "local_as", asn).await?;
                debug!(key, asn, "Updated device local AS");
            }
            None => {
                let _: () = conn.hdel(&key, "local_as").await?;
                debug!(key, "Cleared device local AS");
            }
        }
        Ok(())
    }

    #[instrument(skip(self, peer), fields(ip = %peer.ip))]
    async fn upsert_peer(
        &self,
        device_id: u32,
        context: Option<&str>,
        peer: &BgpPeer,
    ) -> Result<()> {
        let mut conn = self.conn();
        let key = peer_key(device_id, context, peer.ip);
        let fields = [
            ("remote_as", peer.remote_as.to_string()),
            ("as_text", peer.as_text.clone()),
        ];
        let _: () = conn.hset_multiple(&key, &fields).await?;
        debug!(key, remote_as = peer.remote_as, "Upserted peer");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_peer(&self, device_id: u32, context: Option<&str>, ip: IpAddr) -> Result<()> {
        let mut conn = self.conn();
        let key = peer_key(device_id, context, ip);
        let _: () = conn.del(&key).await?;

        // Cascade: a peer's memberships do not outlive the peer.
        let af_keys: Vec<String> = conn.keys(af_pattern_for_peer(device_id, context, ip)).await?;
        if !af_keys.is_empty() {
            let _: () = conn.del(&af_keys).await?;
        }
        debug!(key, families = af_keys.len(), "Deleted peer");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_peers(&self, device_id: u32, context: Option<&str>) -> Result<Vec<BgpPeer>> {
        let mut conn = self.conn();
        let keys: Vec<String> = conn.keys(peer_pattern(device_id, context)).await?;

        let mut peers = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(ip) = key.rsplit('|').next().and_then(|s| s.parse::<IpAddr>().ok()) else {
                warn!(key, "Malformed peer key, skipping");
                continue;
            };
            let remote_as: Option<String> = conn.hget(&key, "remote_as").await?;
            let as_text: Option<String> = conn.hget(&key, "as_text").await?;
            let Some(remote_as) = remote_as.and_then(|v| v.parse::<u32>().ok()) else {
                warn!(key, "Peer row missing remote_as, skipping");
                continue;
            };
            peers.push(BgpPeer {
                ip,
                remote_as,
                as_text: as_text.unwrap_or_default(),
            });
        }
        debug!(count = peers.len(), "Fetched peers");
        Ok(peers)
    }

    #[instrument(skip(self))]
    async fn upsert_address_family(
        &self,
        device_id: u32,
        context: Option<&str>,
        ip: IpAddr,
        afi: Afi,
        safi: Safi,
    ) -> Result<()> {
        let mut conn = self.conn();
        let key = af_key(device_id, context, ip, afi, safi);
        let fields = [("afi", afi.to_string()), ("safi", safi.to_string())];
        let _: () = conn.hset_multiple(&key, &fields).await?;
        debug!(key, "Upserted address family");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_address_family(
        &self,
        device_id: u32,
        context: Option<&str>,
        ip: IpAddr,
        afi: Afi,
        safi: Safi,
    ) -> Result<()> {
        let mut conn = self.conn();
        let key = af_key(device_id, context, ip, afi, safi);
        let _: () = conn.del(&key).await?;
        debug!(key, "Deleted address family");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_address_families(
        &self,
        device_id: u32,
        context: Option<&str>,
    ) -> Result<Vec<AfMembership>> {
        let mut conn = self.conn();
        let keys: Vec<String> = conn.keys(af_pattern(device_id, context)).await?;

        let mut memberships = Vec::with_capacity(keys.len());
        for key in keys {
            match membership_from_key(&key) {
                Some(m) => memberships.push(m),
                None => warn!(key, "Malformed address-family key, skipping"),
            }
        }
        debug!(count = memberships.len(), "Fetched address families");
        Ok(memberships)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_peer_key_default_context() {
        assert_eq!(
            peer_key(3, None, ip("10.0.0.1")),
            "BGP_PEER_TABLE|3||10.0.0.1"
        );
    }

    #[test]
    fn test_peer_key_named_context() {
        assert_eq!(
            peer_key(3, Some("cust-a"), ip("10.0.0.1")),
            "BGP_PEER_TABLE|3|cust-a|10.0.0.1"
        );
    }

    #[test]
    fn test_af_key() {
        assert_eq!(
            af_key(3, Some("cust-a"), ip("10.0.0.1"), Afi::Ipv4, Safi::Unicast),
            "BGP_PEER_AF_TABLE|3|cust-a|10.0.0.1|ipv4|unicast"
        );
    }

    #[test]
    fn test_membership_from_key() {
        let m = membership_from_key("BGP_PEER_AF_TABLE|3||2001:db8::1|ipv6|evpn").unwrap();
        assert_eq!(m.peer_ip, ip("2001:db8::1"));
        assert_eq!(m.afi, Afi::Ipv6);
        assert_eq!(m.safi, Safi::Evpn);
        assert!(membership_from_key("BGP_PEER_AF_TABLE|3||10.0.0.1|bogus|unicast").is_none());
    }
}
