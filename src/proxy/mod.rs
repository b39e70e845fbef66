//! Proxy module for collecting, checking and labeling endpoints
//!
//! This module provides functionality for:
//! - Fetching subscription sources and merging their descriptors
//! - Parsing connect targets out of descriptors
//! - Checking reachability with a bounded pool of concurrent probes
//! - Classifying endpoints by country with an MMDB database
//! - Ranking, renaming and grouping reachable endpoints
//! - Writing the subscription output tree

pub mod checker;
pub mod crawler;
pub mod geo;
pub mod labeler;
pub mod models;
pub mod parser;
pub mod writer;

pub use checker::{CheckerConfig, ProbeProgress, ProbeScheduler, ReachabilityProber};
pub use crawler::{CrawlResult, CrawlerConfig, SourceCrawler, SourceError};
pub use geo::{CountryLookup, GeoClassifier, GeoLocator};
pub use labeler::Labeler;
pub use models::{GeoTag, LabeledResult, LabeledRun, ParsedTarget, ProbeResult};
pub use parser::EndpointParser;
pub use writer::{SubscriptionWriter, WriteSummary};
