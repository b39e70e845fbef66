//! Geolocation module for classifying endpoints by country using MMDB

use crate::proxy::models::GeoTag;
use crate::Result;
use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Read-only IP to country lookup
pub trait CountryLookup: Send + Sync {
    /// ISO 3166-1 alpha-2 code for `ip`, or `None` when the address is not found
    fn country_code(&self, ip: IpAddr) -> Option<String>;
}

/// GeoLocator for looking up IP addresses in a GeoLite2/GeoIP2 country database
pub struct GeoLocator {
    reader: Arc<Reader<Vec<u8>>>,
}

impl GeoLocator {
    /// Create a new GeoLocator from an MMDB file path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = Reader::open_readfile(path)?;
        Ok(Self {
            reader: Arc::new(reader),
        })
    }

    /// Open the database if it exists
    ///
    /// A missing or unreadable file is not an error: every endpoint is then
    /// classified as unknown.
    pub fn open_optional<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "geo database not found, countries will be unknown");
            return None;
        }
        match Self::from_path(path) {
            Ok(locator) => Some(locator),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to open geo database");
                None
            }
        }
    }

    /// Look up the country for an IpAddr
    pub fn lookup_ip(&self, ip: IpAddr) -> Result<Option<String>> {
        let lookup_result = self.reader.lookup(ip)?;
        let country: Option<geoip2::Country> = lookup_result.decode()?;

        Ok(country.and_then(|c| c.country.iso_code.map(String::from)))
    }
}

impl CountryLookup for GeoLocator {
    fn country_code(&self, ip: IpAddr) -> Option<String> {
        match self.lookup_ip(ip) {
            Ok(code) => code,
            Err(e) => {
                debug!(%ip, error = %e, "geo lookup failed");
                None
            }
        }
    }
}

impl Clone for GeoLocator {
    fn clone(&self) -> Self {
        Self {
            reader: Arc::clone(&self.reader),
        }
    }
}

/// Resolves hosts and tags them with a country
#[derive(Clone, Default)]
pub struct GeoClassifier {
    lookup: Option<Arc<dyn CountryLookup>>,
}

impl GeoClassifier {
    /// Classifier that tags every endpoint as unknown
    pub fn unavailable() -> Self {
        Self { lookup: None }
    }

    pub fn new(lookup: Arc<dyn CountryLookup>) -> Self {
        Self {
            lookup: Some(lookup),
        }
    }

    pub fn from_locator(locator: Option<GeoLocator>) -> Self {
        match locator {
            Some(locator) => Self::new(Arc::new(locator)),
            None => Self::unavailable(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.lookup.is_some()
    }

    /// Resolve `host` and look up its country
    pub async fn classify(&self, host: &str) -> GeoTag {
        let Some(lookup) = &self.lookup else {
            return GeoTag::Unknown;
        };
        let Some(ip) = resolve_host(host).await else {
            return GeoTag::Unknown;
        };
        match lookup.country_code(ip) {
            Some(code) => GeoTag::from_country_code(&code),
            None => GeoTag::Unknown,
        }
    }
}

/// Resolve a host name or literal to an address, preferring IPv4
pub async fn resolve_host(host: &str) -> Option<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(ip);
    }
    let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
        .await
        .ok()?
        .map(|addr| addr.ip())
        .collect();
    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
}
