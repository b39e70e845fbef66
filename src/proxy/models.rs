//! Endpoint data models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Separator between the protocol scheme and the rest of a descriptor
pub const SCHEME_SEPARATOR: &str = "://";

/// Country code used when an endpoint cannot be located
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Glyph used in place of a flag for unlocated endpoints
pub const NEUTRAL_GLYPH: &str = "🌐";

/// Target host and port extracted from a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTarget {
    pub host: String,
    pub port: u16,
}

impl ParsedTarget {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }

    /// Get the target in HOST:PORT form
    pub fn to_simple_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ParsedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_simple_string())
    }
}

/// A descriptor that accepted a TCP connection within the timeout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub descriptor: String,
    pub latency_ms: u64,
    pub host: String,
}

impl ProbeResult {
    pub fn new(descriptor: String, latency_ms: u64, host: String) -> Self {
        Self {
            descriptor,
            latency_ms,
            host,
        }
    }

    /// Protocol scheme of the descriptor (the text before `://`)
    pub fn scheme(&self) -> &str {
        scheme_of(&self.descriptor)
    }
}

/// Country classification of an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeoTag {
    Country { code: String, flag: String },
    Unknown,
}

impl GeoTag {
    /// Build a tag from an ISO 3166-1 alpha-2 code
    ///
    /// Anything other than two ASCII letters degrades to `Unknown`.
    pub fn from_country_code(code: &str) -> Self {
        let code = code.trim().to_ascii_uppercase();
        if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
            return GeoTag::Unknown;
        }
        let flag = code
            .chars()
            .filter_map(|c| char::from_u32(c as u32 + 127397))
            .collect();
        GeoTag::Country { code, flag }
    }

    pub fn country_code(&self) -> &str {
        match self {
            GeoTag::Country { code, .. } => code,
            GeoTag::Unknown => UNKNOWN_COUNTRY,
        }
    }

    pub fn flag(&self) -> &str {
        match self {
            GeoTag::Country { flag, .. } => flag,
            GeoTag::Unknown => NEUTRAL_GLYPH,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, GeoTag::Unknown)
    }
}

impl fmt::Display for GeoTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.flag(), self.country_code())
    }
}

/// A ranked, geo-tagged and renamed probe result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledResult {
    pub probe: ProbeResult,
    pub geo: GeoTag,
    pub rank: usize,
    pub brand: String,
    pub emoji: String,
    /// Descriptor with its display-name fragment replaced
    pub descriptor: String,
}

impl LabeledResult {
    pub fn scheme(&self) -> &str {
        scheme_of(&self.descriptor)
    }
}

/// Output of the labeling stage: results in rank order plus both groupings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabeledRun {
    pub results: Vec<LabeledResult>,
    pub by_country: BTreeMap<String, Vec<String>>,
    pub by_protocol: BTreeMap<String, Vec<String>>,
}

impl LabeledRun {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Rewritten descriptors in rank order
    pub fn descriptors(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.descriptor.as_str()).collect()
    }
}

/// Text before the first `://`, or the whole string when there is none
pub fn scheme_of(descriptor: &str) -> &str {
    descriptor
        .split_once(SCHEME_SEPARATOR)
        .map_or(descriptor, |(scheme, _)| scheme)
}
