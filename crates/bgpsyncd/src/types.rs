//! Core types for BGP peer discovery.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Vendor family a device belongs to, derived from its OS identifiers.
///
/// Selects which MIB dialect is probed first; everything downstream of the
/// schema prober is vendor-agnostic except the address-family collectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    /// Arista EOS (ARISTA-BGP4V2-MIB).
    Arista,
    /// Juniper Junos (BGP4-V2-MIB-JUNIPER).
    Juniper,
    /// Cisco IOS/IOS-XE/NX-OS (CISCO-BGP4-MIB).
    Cisco,
    /// Anything else; only the standard BGP4-MIB is usable.
    Other,
}

impl Vendor {
    /// Derive the vendor family from the device OS name and OS group.
    ///
    /// The group drives Arista/Cisco detection while Juniper is keyed on
    /// the OS name itself, matching how the MIB support actually splits.
    pub fn from_os(os: &str, os_group: Option<&str>) -> Self {
        match os_group {
            Some("arista") => Vendor::Arista,
            Some("cisco") => Vendor::Cisco,
            _ if os == "junos" => Vendor::Juniper,
            _ => Vendor::Other,
        }
    }
}

/// A managed device as seen by the discovery pipeline.
///
/// `local_as` mirrors the persisted value and is updated in place when the
/// device reports a different AS (or stops reporting one).
#[derive(Debug, Clone)]
pub struct Device {
    /// Stable device identifier used as the store key.
    pub id: u32,
    /// Hostname or address the SNMP transport connects to.
    pub hostname: String,
    /// SNMPv2c community string.
    pub community: String,
    /// OS name (e.g. "junos", "iosxe", "eos").
    pub os: String,
    /// OS group (e.g. "cisco", "arista"), when the OS belongs to one.
    pub os_group: Option<String>,
    /// Whether BGP discovery is enabled for this device at all.
    pub bgp_enabled: bool,
    /// Last persisted local AS number, if any.
    pub local_as: Option<u32>,
    /// Configured VRF context names. Empty means default context only.
    pub contexts: Vec<String>,
}

impl Device {
    /// Vendor family for MIB schema selection.
    pub fn vendor(&self) -> Vendor {
        Vendor::from_os(&self.os, self.os_group.as_deref())
    }

    /// VRF contexts to iterate: the configured list, or a single default
    /// (`None`) context when nothing is configured.
    pub fn vrf_contexts(&self) -> Vec<Option<&str>> {
        if self.contexts.is_empty() {
            vec![None]
        } else {
            self.contexts.iter().map(|c| Some(c.as_str())).collect()
        }
    }
}

/// A BGP peer observed on (or persisted for) a device+context.
///
/// The remote IP is the unique key within one device+context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgpPeer {
    /// Remote peer address.
    pub ip: IpAddr,
    /// Remote AS number.
    pub remote_as: u32,
    /// Resolved AS name/description.
    pub as_text: String,
}

/// Address Family Identifier (IANA values used by the vendor MIBs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Afi {
    Ipv4 = 1,
    Ipv6 = 2,
    L2vpn = 25,
}

impl Afi {
    /// Decode a numeric AFI code; unknown codes yield `None` and the row
    /// is skipped by the caller.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Afi::Ipv4),
            2 => Some(Afi::Ipv6),
            25 => Some(Afi::L2vpn),
            _ => None,
        }
    }

    /// Canonical lowercase name, as persisted in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Afi::Ipv4 => "ipv4",
            Afi::Ipv6 => "ipv6",
            Afi::L2vpn => "l2vpn",
        }
    }
}

impl fmt::Display for Afi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Afi {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ipv4" => Ok(Afi::Ipv4),
            "ipv6" => Ok(Afi::Ipv6),
            "l2vpn" => Ok(Afi::L2vpn),
            _ => Err(()),
        }
    }
}

/// Subsequent Address Family Identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Safi {
    Unicast = 1,
    Multicast = 2,
    UnicastAndMulticast = 3,
    LabeledUnicast = 4,
    Mvpn = 5,
    Vpls = 65,
    Evpn = 70,
    Vpn = 128,
    Rtfilter = 132,
    Flow = 133,
}

impl Safi {
    /// Decode a numeric SAFI code; unknown codes yield `None`.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Safi::Unicast),
            2 => Some(Safi::Multicast),
            3 => Some(Safi::UnicastAndMulticast),
            4 => Some(Safi::LabeledUnicast),
            5 => Some(Safi::Mvpn),
            65 => Some(Safi::Vpls),
            70 => Some(Safi::Evpn),
            128 => Some(Safi::Vpn),
            132 => Some(Safi::Rtfilter),
            133 => Some(Safi::Flow),
            _ => None,
        }
    }

    /// Canonical name, as persisted in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Safi::Unicast => "unicast",
            Safi::Multicast => "multicast",
            Safi::UnicastAndMulticast => "unicastAndMulticast",
            Safi::LabeledUnicast => "labeledUnicast",
            Safi::Mvpn => "mvpn",
            Safi::Vpls => "vpls",
            Safi::Evpn => "evpn",
            Safi::Vpn => "vpn",
            Safi::Rtfilter => "rtfilter",
            Safi::Flow => "flow",
        }
    }
}

impl fmt::Display for Safi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Safi {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unicast" => Ok(Safi::Unicast),
            "multicast" => Ok(Safi::Multicast),
            "unicastAndMulticast" => Ok(Safi::UnicastAndMulticast),
            "labeledUnicast" => Ok(Safi::LabeledUnicast),
            "mvpn" => Ok(Safi::Mvpn),
            "vpls" => Ok(Safi::Vpls),
            "evpn" => Ok(Safi::Evpn),
            "vpn" => Ok(Safi::Vpn),
            "rtfilter" => Ok(Safi::Rtfilter),
            "flow" => Ok(Safi::Flow),
            _ => Err(()),
        }
    }
}

/// One (peer, AFI, SAFI) membership row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AfMembership {
    /// Remote peer address the membership belongs to.
    pub peer_ip: IpAddr,
    pub afi: Afi,
    pub safi: Safi,
}

/// Per device+context result counts, suitable for progress reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoverySummary {
    /// Device the pass ran against.
    pub device_id: u32,
    /// VRF context name; `None` is the default context.
    pub context: Option<String>,
    /// Local AS reported by the device, if BGP is configured.
    pub local_as: Option<u32>,
    pub peers_added: usize,
    pub peers_updated: usize,
    pub peers_removed: usize,
    pub families_added: usize,
    pub families_removed: usize,
}

impl DiscoverySummary {
    /// Empty summary for a device+context pass.
    pub fn new(device_id: u32, context: Option<&str>) -> Self {
        Self {
            device_id,
            context: context.map(str::to_string),
            ..Default::default()
        }
    }
}

/// Decode a raw SNMP InetAddress payload into an IP address.
///
/// 4 bytes is IPv4, 16 bytes is IPv6; anything else is unparsable.
pub fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}

/// Parse an IP address from the hex string form SNMP prints for octet
/// strings (e.g. `"0A 00 00 01"` or `0x20010db8...`).
pub fn ip_from_hex(s: &str) -> Option<IpAddr> {
    let cleaned = s.trim().trim_matches('"');
    let cleaned = cleaned.strip_prefix("0x").unwrap_or(cleaned);
    let digits: String = cleaned
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    if digits.is_empty()
        || digits.len() % 2 != 0
        || !digits.chars().all(|c| c.is_ascii_hexdigit())
    {
        return None;
    }

    let bytes: Vec<u8> = (0..digits.len())
        .step_by(2)
        .filter_map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
        .collect();
    ip_from_bytes(&bytes)
}
