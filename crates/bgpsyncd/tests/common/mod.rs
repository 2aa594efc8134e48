//! Shared test doubles: an in-memory SNMP transport and peer store.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Mutex;

use async_trait::async_trait;

use bgpsyncd::{
    Afi, AfMembership, BgpPeer, DiscoveryError, Device, PeerStore, Result, Safi, SnmpRow,
    SnmpTransport, TableRows,
};

fn query_key(context: Option<&str>, mib: &str, oid: &str) -> String {
    format!("{}|{mib}|{oid}", context.unwrap_or(""))
}

/// Canned-response SNMP transport that records every query it serves.
#[derive(Debug, Default)]
pub struct FakeTransport {
    scalars: HashMap<String, String>,
    walks: HashMap<String, Vec<SnmpRow>>,
    tables: HashMap<String, TableRows>,
    failing: HashSet<String>,
    pub queries: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scalar(
        mut self,
        context: Option<&str>,
        mib: &str,
        oid: &str,
        value: &str,
    ) -> Self {
        self.scalars
            .insert(query_key(context, mib, oid), value.to_string());
        self
    }

    pub fn with_walk(
        mut self,
        context: Option<&str>,
        mib: &str,
        oid: &str,
        rows: &[(&str, &str)],
    ) -> Self {
        self.walks.insert(
            query_key(context, mib, oid),
            rows.iter()
                .map(|(index, value)| SnmpRow::new(*index, *value))
                .collect(),
        );
        self
    }

    pub fn with_table(
        mut self,
        context: Option<&str>,
        mib: &str,
        entry: &str,
        rows: &[(&str, &[(&str, &str)])],
    ) -> Self {
        let mut table = TableRows::new();
        for (index, columns) in rows {
            let row: HashMap<String, String> = columns
                .iter()
                .map(|(c, v)| (c.to_string(), v.to_string()))
                .collect();
            table.insert(index.to_string(), row);
        }
        self.tables.insert(query_key(context, mib, entry), table);
        self
    }

    /// Make one object fail with a transport error.
    pub fn with_failure(mut self, context: Option<&str>, mib: &str, oid: &str) -> Self {
        self.failing.insert(query_key(context, mib, oid));
        self
    }

    /// Whether the given object was queried at any point.
    pub fn queried(&self, context: Option<&str>, mib: &str, oid: &str) -> bool {
        self.queries
            .lock()
            .unwrap()
            .contains(&query_key(context, mib, oid))
    }

    fn record(&self, key: &str) -> Result<()> {
        self.queries.lock().unwrap().push(key.to_string());
        if self.failing.contains(key) {
            return Err(DiscoveryError::transport(key, "simulated failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl SnmpTransport for FakeTransport {
    async fn get_next(
        &self,
        _device: &Device,
        context: Option<&str>,
        mib: &str,
        oid: &str,
    ) -> Result<Option<String>> {
        let key = query_key(context, mib, oid);
        self.record(&key)?;
        Ok(self.scalars.get(&key).cloned())
    }

    async fn walk(
        &self,
        _device: &Device,
        context: Option<&str>,
        mib: &str,
        oid: &str,
    ) -> Result<Vec<SnmpRow>> {
        let key = query_key(context, mib, oid);
        self.record(&key)?;
        Ok(self.walks.get(&key).cloned().unwrap_or_default())
    }

    async fn walk_indexed(
        &self,
        _device: &Device,
        context: Option<&str>,
        mib: &str,
        entry: &str,
        _columns: &[&str],
    ) -> Result<TableRows> {
        let key = query_key(context, mib, entry);
        self.record(&key)?;
        Ok(self.tables.get(&key).cloned().unwrap_or_default())
    }
}

fn context_key(context: Option<&str>) -> String {
    context.unwrap_or("").to_string()
}

/// In-memory peer store with the same cascade semantics as the Redis
/// backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
pub struct MemoryInner {
    pub peers: BTreeMap<(u32, String, IpAddr), BgpPeer>,
    pub families: BTreeSet<(u32, String, IpAddr, Afi, Safi)>,
    pub local_as_updates: Vec<(u32, Option<u32>)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_peer(&self, device_id: u32, context: Option<&str>, ip: &str, remote_as: u32) {
        let ip: IpAddr = ip.parse().unwrap();
        self.inner.lock().unwrap().peers.insert(
            (device_id, context_key(context), ip),
            BgpPeer {
                ip,
                remote_as,
                as_text: format!("AS{remote_as}"),
            },
        );
    }

    pub fn seed_family(
        &self,
        device_id: u32,
        context: Option<&str>,
        ip: &str,
        afi: Afi,
        safi: Safi,
    ) {
        let ip: IpAddr = ip.parse().unwrap();
        self.inner
            .lock()
            .unwrap()
            .families
            .insert((device_id, context_key(context), ip, afi, safi));
    }

    pub fn peer_ips(&self, device_id: u32, context: Option<&str>) -> BTreeSet<IpAddr> {
        let ctx = context_key(context);
        self.inner
            .lock()
            .unwrap()
            .peers
            .keys()
            .filter(|(d, c, _)| *d == device_id && *c == ctx)
            .map(|(_, _, ip)| *ip)
            .collect()
    }

    pub fn family_set(
        &self,
        device_id: u32,
        context: Option<&str>,
    ) -> BTreeSet<(IpAddr, Afi, Safi)> {
        let ctx = context_key(context);
        self.inner
            .lock()
            .unwrap()
            .families
            .iter()
            .filter(|(d, c, _, _, _)| *d == device_id && *c == ctx)
            .map(|(_, _, ip, afi, safi)| (*ip, *afi, *safi))
            .collect()
    }
}

#[async_trait]
impl PeerStore for MemoryStore {
    async fn update_device_local_as(&self, device_id: u32, local_as: Option<u32>) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .local_as_updates
            .push((device_id, local_as));
        Ok(())
    }

    async fn upsert_peer(
        &self,
        device_id: u32,
        context: Option<&str>,
        peer: &BgpPeer,
    ) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .peers
            .insert((device_id, context_key(context), peer.ip), peer.clone());
        Ok(())
    }

    async fn delete_peer(&self, device_id: u32, context: Option<&str>, ip: IpAddr) -> Result<()> {
        let ctx = context_key(context);
        let mut inner = self.inner.lock().unwrap();
        inner.peers.remove(&(device_id, ctx.clone(), ip));
        inner
            .families
            .retain(|(d, c, peer_ip, _, _)| !(*d == device_id && *c == ctx && *peer_ip == ip));
        Ok(())
    }

    async fn fetch_peers(&self, device_id: u32, context: Option<&str>) -> Result<Vec<BgpPeer>> {
        let ctx = context_key(context);
        Ok(self
            .inner
            .lock()
            .unwrap()
            .peers
            .iter()
            .filter(|((d, c, _), _)| *d == device_id && *c == ctx)
            .map(|(_, peer)| peer.clone())
            .collect())
    }

    async fn upsert_address_family(
        &self,
        device_id: u32,
        context: Option<&str>,
        ip: IpAddr,
        afi: Afi,
        safi: Safi,
    ) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .families
            .insert((device_id, context_key(context), ip, afi, safi));
        Ok(())
    }

    async fn delete_address_family(
        &self,
        device_id: u32,
        context: Option<&str>,
        ip: IpAddr,
        afi: Afi,
        safi: Safi,
    ) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .families
            .remove(&(device_id, context_key(context), ip, afi, safi));
        Ok(())
    }

    async fn fetch_address_families(
        &self,
        device_id: u32,
        context: Option<&str>,
    ) -> Result<Vec<AfMembership>> {
        let ctx = context_key(context);
        Ok(self
            .inner
            .lock()
            .unwrap()
            .families
            .iter()
            .filter(|(d, c, _, _, _)| *d == device_id && *c == ctx)
            .map(|(_, _, ip, afi, safi)| AfMembership {
                peer_ip: *ip,
                afi: *afi,
                safi: *safi,
            })
            .collect())
    }
}
