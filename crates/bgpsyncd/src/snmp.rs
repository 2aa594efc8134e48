//! SNMP transport abstraction.
//!
//! The discovery pipeline only needs three primitives: a get-next scalar
//! read, an ordered single-column walk, and a multi-column table walk
//! grouped by row index. Timeouts and retries live behind the trait; the
//! pipeline treats every call as a blocking request/response exchange.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Device;

/// One row from a single-column walk: the OID index suffix and the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpRow {
    /// Index portion of the OID, after the walked object name
    /// (e.g. `"10.0.0.1"` for `bgpPeerRemoteAs.10.0.0.1`).
    pub index: String,
    /// Printed value.
    pub value: String,
}

impl SnmpRow {
    pub fn new(index: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            value: value.into(),
        }
    }
}

/// Rows of a multi-column table walk: row index -> column name -> value.
///
/// Ordered by row index so iteration order is deterministic.
pub type TableRows = BTreeMap<String, HashMap<String, String>>;

/// Request/response transport to a managed device.
///
/// The VRF context scopes every query; how that scoping is expressed
/// (e.g. SNMPv2c community mapping) is up to the implementation.
#[async_trait]
pub trait SnmpTransport: Send + Sync {
    /// Get-next read of a scalar object. `Ok(None)` means the object does
    /// not exist on the device.
    async fn get_next(
        &self,
        device: &Device,
        context: Option<&str>,
        mib: &str,
        oid: &str,
    ) -> Result<Option<String>>;

    /// Walk one column (or subtree), returning rows in device order.
    async fn walk(
        &self,
        device: &Device,
        context: Option<&str>,
        mib: &str,
        oid: &str,
    ) -> Result<Vec<SnmpRow>>;

    /// Walk a conceptual table entry and group the named columns by row
    /// index. Columns absent on the device are simply missing from the
    /// row maps.
    async fn walk_indexed(
        &self,
        device: &Device,
        context: Option<&str>,
        mib: &str,
        entry: &str,
        columns: &[&str],
    ) -> Result<TableRows>;
}
