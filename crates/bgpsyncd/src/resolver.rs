//! AS number to text resolution.
//!
//! Peer rows carry a human-readable AS name next to the number. Where
//! those names come from is deployment-specific (registry dumps, internal
//! inventory), so resolution sits behind a trait; the default
//! implementation serves configured overrides and falls back to a
//! generated label.

use std::collections::HashMap;

use async_trait::async_trait;

/// Resolves an AS number to its text/name.
#[async_trait]
pub trait AsTextResolver: Send + Sync {
    /// Best-effort resolution; always yields something usable.
    async fn resolve(&self, asn: u32) -> String;
}

/// Resolver backed by a fixed name table from the configuration.
#[derive(Debug, Default)]
pub struct StaticAsResolver {
    names: HashMap<u32, String>,
}

impl StaticAsResolver {
    pub fn new(names: HashMap<u32, String>) -> Self {
        Self { names }
    }
}

#[async_trait]
impl AsTextResolver for StaticAsResolver {
    async fn resolve(&self, asn: u32) -> String {
        if let Some(name) = self.names.get(&asn) {
            return name.clone();
        }
        if is_private_asn(asn) {
            return format!("Private AS{asn}");
        }
        format!("AS{asn}")
    }
}

/// RFC 6996 private-use AS ranges (16- and 32-bit).
fn is_private_asn(asn: u32) -> bool {
    (64512..=65534).contains(&asn) || (4200000000..=4294967294).contains(&asn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_override() {
        let resolver =
            StaticAsResolver::new(HashMap::from([(64496, "Example Networks".to_string())]));
        assert_eq!(resolver.resolve(64496).await, "Example Networks");
    }

    #[tokio::test]
    async fn test_resolve_private() {
        let resolver = StaticAsResolver::default();
        assert_eq!(resolver.resolve(65001).await, "Private AS65001");
        assert_eq!(resolver.resolve(4200000001).await, "Private AS4200000001");
    }

    #[tokio::test]
    async fn test_resolve_fallback() {
        let resolver = StaticAsResolver::default();
        assert_eq!(resolver.resolve(13335).await, "AS13335");
    }
}
