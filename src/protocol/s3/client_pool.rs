//! Per-region client pool

use aws_sdk_s3::config::Region;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::config::ConnectionConfig;
use super::credentials::CredentialResolver;
use super::error::{S3Error, S3Result};
use super::single_flight::SingleFlight;
use super::transport::{Addressing, ClientFactory, ClientSpec, S3Transport};

/// Lazily built, never evicted map of region to client.
///
/// A path-style client for the default region is built up front and kept
/// outside the map; it serves the bucket location lookup, which needs
/// path-style addressing for some bucket names.
///
/// `close` drops the pool's reference to every client, the path-style one
/// included, after calling [`S3Transport::shutdown`] on it.
pub struct ClientPool {
    config: ConnectionConfig,
    default_region: Region,
    resolver: CredentialResolver,
    factory: Arc<dyn ClientFactory>,
    clients: SingleFlight<Region, Arc<dyn S3Transport>>,
    path_style: Mutex<Option<Arc<dyn S3Transport>>>,
    closed: AtomicBool,
}

impl ClientPool {
    /// Build the pool and its default-region path-style client
    pub async fn new(
        config: ConnectionConfig,
        resolver: CredentialResolver,
        factory: Arc<dyn ClientFactory>,
    ) -> S3Result<Self> {
        let default_region = Region::new(config.region.clone());
        let spec = client_spec(&config, default_region.clone(), Addressing::PathStyle);
        let path_style = factory.build(spec, resolver.resolve()?).await?;

        Ok(Self {
            config,
            default_region,
            resolver,
            factory,
            clients: SingleFlight::new(),
            path_style: Mutex::new(Some(path_style)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn default_region(&self) -> &Region {
        &self.default_region
    }

    /// Client for `region`, built on first use
    pub async fn get(&self, region: &Region) -> S3Result<Arc<dyn S3Transport>> {
        if self.is_closed() {
            return Err(S3Error::Closed);
        }

        if let Some(client) = self.clients.get(region) {
            return Ok(client);
        }

        self.clients
            .get_or_try_init(region, || async {
                debug!(region = %region, "Client cache miss");
                let addressing = if self.config.force_path_style {
                    Addressing::PathStyle
                } else {
                    Addressing::VirtualHosted
                };
                let spec = client_spec(&self.config, region.clone(), addressing);
                self.factory.build(spec, self.resolver.resolve()?).await
            })
            .await
    }

    /// Client for the default region
    pub async fn default_client(&self) -> S3Result<Arc<dyn S3Transport>> {
        self.get(&self.default_region).await
    }

    /// The path-style default-region client used for location lookups
    pub fn path_style_client(&self) -> S3Result<Arc<dyn S3Transport>> {
        self.path_style_slot().clone().ok_or(S3Error::Closed)
    }

    fn path_style_slot(&self) -> MutexGuard<'_, Option<Arc<dyn S3Transport>>> {
        self.path_style.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of regional clients built so far (the path-style client is not counted)
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Release every client. Returns the number of handles released;
    /// repeated calls release nothing.
    pub fn close(&self) -> usize {
        if self.closed.swap(true, Ordering::AcqRel) {
            return 0;
        }

        let clients = self.clients.drain();
        for (region, client) in &clients {
            debug!(region = %region, "Releasing S3 client");
            client.shutdown();
        }
        let path_style = self.path_style_slot().take();
        if let Some(client) = &path_style {
            debug!(region = %self.default_region, "Releasing path-style S3 client");
            client.shutdown();
        }

        let released = clients.len() + usize::from(path_style.is_some());
        info!(released, "Closed S3 client pool");
        released
    }
}

impl fmt::Debug for ClientPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientPool")
            .field("default_region", &self.default_region)
            .field("clients", &self.clients.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn client_spec(config: &ConnectionConfig, region: Region, addressing: Addressing) -> ClientSpec {
    ClientSpec {
        region,
        addressing,
        endpoint: config.endpoint.clone(),
        connect_timeout: config.connect_timeout(),
        socket_timeout: config.socket_timeout(),
    }
}
