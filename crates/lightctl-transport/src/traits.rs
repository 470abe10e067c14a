//! Transport trait definitions

use async_trait::async_trait;
use std::net::SocketAddr;

use crate::error::{Result, TransportError};

/// Turns a hostname and port into candidate endpoints
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>>;
}

/// System resolver backed by `getaddrinfo`
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsResolver;

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>> {
        // Accept the URL form of IPv6 literals too
        let bare = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((bare, port))
            .await
            .map_err(|e| TransportError::ResolveFailed {
                host: host.to_string(),
                reason: e.to_string(),
            })?
            .collect();

        if addrs.is_empty() {
            return Err(TransportError::ResolveFailed {
                host: host.to_string(),
                reason: "no addresses".to_string(),
            });
        }
        Ok(addrs)
    }
}
