//! `SnmpTransport` implementation backed by the net-snmp command line
//! tools (`snmpgetnext` / `snmpbulkwalk`).
//!
//! Output is requested with `-Oqs` (quick print, short names) plus `-x`
//! so octet strings come back as hex, which keeps the address parsing in
//! one place. VRF contexts are addressed with the `community@context`
//! convention.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{DiscoveryError, Result};
use crate::snmp::{SnmpRow, SnmpTransport, TableRows};
use crate::types::Device;

/// Path to the `snmpgetnext` binary.
pub const SNMPGETNEXT_CMD: &str = "/usr/bin/snmpgetnext";

/// Path to the `snmpbulkwalk` binary.
pub const SNMPBULKWALK_CMD: &str = "/usr/bin/snmpbulkwalk";

/// Walk output options: quick print, short names, hex octet strings.
const WALK_OPTS: &str = "-Oqsx";

/// Scalar output options: quick print, value only.
const SCALAR_OPTS: &str = "-Oqv";

/// net-snmp CLI transport.
#[derive(Debug, Clone)]
pub struct SnmpCliTransport {
    timeout: Duration,
    retries: u32,
}

impl SnmpCliTransport {
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self { timeout, retries }
    }

    /// Community string scoped to a VRF context.
    fn community(device: &Device, context: Option<&str>) -> String {
        match context {
            Some(ctx) => format!("{}@{}", device.community, ctx),
            None => device.community.clone(),
        }
    }

    fn base_args(
        &self,
        device: &Device,
        context: Option<&str>,
        mib: &str,
        output_opts: &str,
    ) -> Vec<String> {
        vec![
            "-v2c".to_string(),
            "-c".to_string(),
            Self::community(device, context),
            output_opts.to_string(),
            "-m".to_string(),
            mib.to_string(),
            "-t".to_string(),
            self.timeout.as_secs().max(1).to_string(),
            "-r".to_string(),
            self.retries.to_string(),
            device.hostname.clone(),
        ]
    }

    async fn run(&self, program: &str, args: &[String], operation: &str) -> Result<String> {
        debug!(program, operation, "Running SNMP command");

        let output = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            warn!(
                operation,
                exit_code = output.status.code().unwrap_or(-1),
                stderr = %stderr,
                "SNMP command failed"
            );
            return Err(DiscoveryError::transport(
                operation,
                if stderr.is_empty() { stdout } else { stderr },
            ));
        }

        Ok(stdout)
    }
}

#[async_trait]
impl SnmpTransport for SnmpCliTransport {
    async fn get_next(
        &self,
        device: &Device,
        context: Option<&str>,
        mib: &str,
        oid: &str,
    ) -> Result<Option<String>> {
        let mut args = self.base_args(device, context, mib, SCALAR_OPTS);
        args.push(oid.to_string());

        let operation = format!("getnext {oid}");
        let stdout = self.run(SNMPGETNEXT_CMD, &args, &operation).await?;
        Ok(parse_scalar_output(&stdout))
    }

    async fn walk(
        &self,
        device: &Device,
        context: Option<&str>,
        mib: &str,
        oid: &str,
    ) -> Result<Vec<SnmpRow>> {
        let mut args = self.base_args(device, context, mib, WALK_OPTS);
        args.push(oid.to_string());

        let operation = format!("walk {oid}");
        let stdout = self.run(SNMPBULKWALK_CMD, &args, &operation).await?;
        Ok(parse_walk_output(oid, &stdout))
    }

    async fn walk_indexed(
        &self,
        device: &Device,
        context: Option<&str>,
        mib: &str,
        entry: &str,
        columns: &[&str],
    ) -> Result<TableRows> {
        let mut args = self.base_args(device, context, mib, WALK_OPTS);
        args.push(entry.to_string());

        let operation = format!("walk {entry}");
        let stdout = self.run(SNMPBULKWALK_CMD, &args, &operation).await?;
        Ok(parse_table_output(&stdout, columns))
    }
}

/// Parse `snmpgetnext -Oqv` output. "No Such Object/Instance" markers mean
/// the object is absent.
fn parse_scalar_output(stdout: &str) -> Option<String> {
    let line = stdout.lines().next()?.trim();
    if line.is_empty() || line.starts_with("No Such") || line.starts_with("No more variables") {
        return None;
    }
    Some(line.trim_matches('"').to_string())
}

/// Parse `-Oqs` walk output into rows, stripping the walked object name
/// from each index.
fn parse_walk_output(oid: &str, stdout: &str) -> Vec<SnmpRow> {
    stdout
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let (name, value) = split_name_value(line)?;
            let index = name
                .strip_prefix(oid)
                .map(|rest| rest.trim_start_matches('.'))
                .unwrap_or(name);
            Some(SnmpRow::new(index, value))
        })
        .collect()
}

/// Parse a table-entry walk into row-index -> column -> value maps,
/// keeping only the requested columns.
fn parse_table_output(stdout: &str, columns: &[&str]) -> TableRows {
    let mut rows = TableRows::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = split_name_value(line) else {
            continue;
        };
        let Some((column, index)) = name.split_once('.') else {
            continue;
        };
        if !columns.contains(&column) {
            continue;
        }
        rows.entry(index.to_string())
            .or_insert_with(HashMap::new)
            .insert(column.to_string(), value.to_string());
    }
    rows
}

/// Split a `-Oq` output line into object name and printed value. Quoted
/// values (hex strings) keep their inner spaces.
fn split_name_value(line: &str) -> Option<(&str, String)> {
    let (name, value) = line.split_once(char::is_whitespace)?;
    let value = value.trim();
    let value = value.trim_matches('"').to_string();
    Some((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_scalar_output() {
        assert_eq!(parse_scalar_output("65001"), Some("65001".to_string()));
        assert_eq!(parse_scalar_output(""), None);
        assert_eq!(
            parse_scalar_output("No Such Object available on this agent at this OID"),
            None
        );
    }

    #[test]
    fn test_parse_walk_output() {
        let stdout = "bgpPeerRemoteAs.10.0.0.1 65001\nbgpPeerRemoteAs.10.0.0.2 65002\n";
        let rows = parse_walk_output("bgpPeerRemoteAs", stdout);
        assert_eq!(
            rows,
            vec![
                SnmpRow::new("10.0.0.1", "65001"),
                SnmpRow::new("10.0.0.2", "65002"),
            ]
        );
    }

    #[test]
    fn test_parse_walk_output_quoted_hex() {
        let stdout = "jnxBgpM2PeerRemoteAddr.1.1.4.10.0.0.9.1 \"0A 00 00 01 \"\n";
        let rows = parse_walk_output("jnxBgpM2PeerRemoteAddr", stdout);
        assert_eq!(rows, vec![SnmpRow::new("1.1.4.10.0.0.9.1", "0A 00 00 01")]);
    }

    #[test]
    fn test_parse_table_output_groups_rows() {
        let stdout = concat!(
            "jnxBgpM2PeerIndex.1.1.4.10.0.0.9.1.4.10.0.0.1 7\n",
            "jnxBgpM2PeerRemoteAddr.1.1.4.10.0.0.9.1.4.10.0.0.1 \"0A 00 00 01 \"\n",
            "jnxBgpM2PeerState.1.1.4.10.0.0.9.1.4.10.0.0.1 6\n",
        );
        let rows = parse_table_output(stdout, &["jnxBgpM2PeerIndex", "jnxBgpM2PeerRemoteAddr"]);
        assert_eq!(rows.len(), 1);
        let row = &rows["1.1.4.10.0.0.9.1.4.10.0.0.1"];
        assert_eq!(row["jnxBgpM2PeerIndex"], "7");
        assert_eq!(row["jnxBgpM2PeerRemoteAddr"], "0A 00 00 01");
        // The unrequested column is dropped.
        assert!(!row.contains_key("jnxBgpM2PeerState"));
    }

    #[test]
    fn test_community_with_context() {
        let device = Device {
            id: 1,
            hostname: "r1".into(),
            community: "public".into(),
            os: "iosxe".into(),
            os_group: Some("cisco".into()),
            bgp_enabled: true,
            local_as: None,
            contexts: vec!["cust-a".into()],
        };
        assert_eq!(SnmpCliTransport::community(&device, None), "public");
        assert_eq!(
            SnmpCliTransport::community(&device, Some("cust-a")),
            "public@cust-a"
        );
    }
}
