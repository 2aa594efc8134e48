//! BGP peer discovery and synchronization daemon.
//!
//! bgpsyncd walks the BGP peer tables of managed devices over SNMP and
//! converges the Redis peer store to what each device currently reports,
//! per VRF context. Vendor MIB dialects (Arista, Juniper, Cisco, standard
//! BGP4-MIB) are probed in priority order and collapsed into one
//! normalized representation before reconciliation.
//!
//! # Architecture
//!
//! ```text
//! device inventory ──▶ BgpSync ──▶ per VRF context:
//!                        │           probe schema (schema.rs)
//!   SnmpTransport ◀──────┤           normalize peers
//!   (snmp_cli.rs)        │           collect AFI/SAFI (schema.rs / juniper.rs)
//!                        │           reconcile (sync.rs)
//!   PeerStore ◀──────────┘
//!   (redis_store.rs)
//! ```

pub mod config;
pub mod error;
pub mod juniper;
pub mod redis_store;
pub mod resolver;
pub mod schema;
pub mod snmp;
pub mod snmp_cli;
pub mod store;
pub mod sync;
pub mod types;

pub use config::{Config, DeviceConfig, RedisConfig, SnmpConfig};
pub use error::{DiscoveryError, Result};
pub use juniper::JuniperCorrelator;
pub use redis_store::RedisPeerStore;
pub use resolver::{AsTextResolver, StaticAsResolver};
pub use schema::{MembershipMap, PeerSchema, ProbedPeers};
pub use snmp::{SnmpRow, SnmpTransport, TableRows};
pub use snmp_cli::SnmpCliTransport;
pub use store::PeerStore;
pub use sync::BgpSync;
pub use types::{Afi, AfMembership, BgpPeer, Device, DiscoverySummary, Safi, Vendor};
