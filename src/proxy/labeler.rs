//! Ranking and labeling of reachable endpoints

use crate::proxy::geo::GeoClassifier;
use crate::proxy::models::{GeoTag, LabeledResult, LabeledRun, ProbeResult};
use futures::stream::{self, StreamExt};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::seq::IndexedRandom;
use rand::Rng;

/// Brand used when none are configured
pub const DEFAULT_BRAND: &str = "V2XCore";

/// Emoji used when none are configured
pub const DEFAULT_EMOJI: &str = "⚡️";

/// Number of geo resolutions in flight
const DEFAULT_GEO_CONCURRENCY: usize = 32;

/// Characters left as-is in a display fragment; everything else is `%XX` encoded
const FRAGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

/// Assigns ranks, countries and display names to latency-sorted results
pub struct Labeler {
    brands: Vec<String>,
    emojis: Vec<String>,
    classifier: GeoClassifier,
    geo_concurrency: usize,
}

impl Labeler {
    pub fn new(brands: Vec<String>, emojis: Vec<String>, classifier: GeoClassifier) -> Self {
        Self {
            brands: non_empty_or(brands, DEFAULT_BRAND),
            emojis: non_empty_or(emojis, DEFAULT_EMOJI),
            classifier,
            geo_concurrency: DEFAULT_GEO_CONCURRENCY,
        }
    }

    pub fn with_geo_concurrency(mut self, concurrency: usize) -> Self {
        self.geo_concurrency = concurrency.max(1);
        self
    }

    /// Label `results`, which must already be sorted fastest first
    ///
    /// Countries are resolved concurrently; ranks and the brand/emoji draws
    /// follow the input order.
    pub async fn label<R: Rng + ?Sized>(&self, results: Vec<ProbeResult>, rng: &mut R) -> LabeledRun {
        let classifier = &self.classifier;
        let tagged: Vec<(ProbeResult, GeoTag)> = stream::iter(results)
            .map(|result| async move {
                let geo = classifier.classify(&result.host).await;
                (result, geo)
            })
            .buffered(self.geo_concurrency)
            .collect()
            .await;

        let mut run = LabeledRun::default();
        for (position, (probe, geo)) in tagged.into_iter().enumerate() {
            let labeled = self.label_one(probe, geo, position + 1, rng);
            run.by_country
                .entry(labeled.geo.country_code().to_string())
                .or_default()
                .push(labeled.descriptor.clone());
            run.by_protocol
                .entry(labeled.scheme().to_string())
                .or_default()
                .push(labeled.descriptor.clone());
            run.results.push(labeled);
        }
        run
    }

    fn label_one<R: Rng + ?Sized>(
        &self,
        probe: ProbeResult,
        geo: GeoTag,
        rank: usize,
        rng: &mut R,
    ) -> LabeledResult {
        let brand = pick(&self.brands, rng, DEFAULT_BRAND);
        let emoji = pick(&self.emojis, rng, DEFAULT_EMOJI);
        let name = display_name(&geo, rank, &brand, &emoji);
        let descriptor = rename(&probe.descriptor, &name);

        LabeledResult {
            probe,
            geo,
            rank,
            brand,
            emoji,
            descriptor,
        }
    }
}

/// `<flag> <country> #<rank> |<brand> <emoji>` with the rank zero-padded to three digits
pub fn display_name(geo: &GeoTag, rank: usize, brand: &str, emoji: &str) -> String {
    format!(
        "{} {} #{:03} |{} {}",
        geo.flag(),
        geo.country_code(),
        rank,
        brand,
        emoji
    )
}

/// Replace the descriptor's fragment with the encoded display name
pub fn rename(descriptor: &str, name: &str) -> String {
    let base = descriptor.split_once('#').map_or(descriptor, |(base, _)| base);
    format!("{}#{}", base, utf8_percent_encode(name, FRAGMENT_ENCODE_SET))
}

fn pick<R: Rng + ?Sized>(pool: &[String], rng: &mut R, fallback: &str) -> String {
    pool.choose(rng)
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

fn non_empty_or(values: Vec<String>, fallback: &str) -> Vec<String> {
    if values.is_empty() {
        vec![fallback.to_string()]
    } else {
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::geo::CountryLookup;
    use percent_encoding::percent_decode_str;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use std::net::IpAddr;
    use std::sync::Arc;

    struct Everywhere(&'static str);

    impl CountryLookup for Everywhere {
        fn country_code(&self, ip: IpAddr) -> Option<String> {
            if ip.is_loopback() {
                None
            } else {
                Some(self.0.to_string())
            }
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn fragment(descriptor: &str) -> String {
        let (_, encoded) = descriptor.split_once('#').unwrap();
        percent_decode_str(encoded).decode_utf8().unwrap().into_owned()
    }

    fn probe(descriptor: &str, ms: u64, host: &str) -> ProbeResult {
        ProbeResult::new(descriptor.to_string(), ms, host.to_string())
    }

    #[test]
    fn test_display_name_format() {
        let geo = GeoTag::from_country_code("US");
        assert_eq!(display_name(&geo, 1, "B", "E"), "🇺🇸 US #001 |B E");
        assert_eq!(
            display_name(&GeoTag::Unknown, 1234, "B", "E"),
            "🌐 Unknown #1234 |B E"
        );
    }

    #[test]
    fn test_rename_replaces_fragment() {
        let renamed = rename("vless://b@[::1]:8443?x=1#old#name", "N 1");
        assert_eq!(renamed, "vless://b@[::1]:8443?x=1#N%201");

        let renamed = rename("trojan://x@1.2.3.4:443", "A|B #2");
        assert_eq!(renamed, "trojan://x@1.2.3.4:443#A%7CB%20%232");
    }

    #[test]
    fn test_rename_encodes_utf8() {
        let renamed = rename("ss://h:1", "🇺🇸 US #001 |V2XCore ⚡️");
        assert!(renamed.is_ascii());
        assert_eq!(fragment(&renamed), "🇺🇸 US #001 |V2XCore ⚡️");
    }

    #[test]
    fn test_empty_pools_use_defaults() {
        let labeler = Labeler::new(Vec::new(), Vec::new(), GeoClassifier::unavailable());
        assert_eq!(labeler.brands, vec![DEFAULT_BRAND.to_string()]);
        assert_eq!(labeler.emojis, vec![DEFAULT_EMOJI.to_string()]);
    }

    #[tokio::test]
    async fn test_label_single_us_endpoint() {
        let classifier = GeoClassifier::new(Arc::new(Everywhere("US")));
        let labeler = Labeler::new(strings(&["Brand"]), strings(&["🔥"]), classifier);
        let mut rng = StdRng::seed_from_u64(7);

        let results = vec![probe("trojan://x@93.184.216.34:443", 120, "93.184.216.34")];
        let run = labeler.label(results, &mut rng).await;

        assert_eq!(run.results.len(), 1);
        let labeled = &run.results[0];
        assert_eq!(labeled.rank, 1);
        assert!(labeled.descriptor.starts_with("trojan://x@93.184.216.34:443#"));
        assert_eq!(fragment(&labeled.descriptor), "🇺🇸 US #001 |Brand 🔥");
        assert_eq!(run.by_country["US"], vec![labeled.descriptor.clone()]);
        assert_eq!(run.by_protocol["trojan"], vec![labeled.descriptor.clone()]);
    }

    #[tokio::test]
    async fn test_label_ranks_and_groups() {
        let classifier = GeoClassifier::new(Arc::new(Everywhere("DE")));
        let brands = strings(&["A", "B", "C"]);
        let emojis = strings(&["x", "y"]);
        let labeler = Labeler::new(brands.clone(), emojis.clone(), classifier).with_geo_concurrency(2);
        let mut rng = StdRng::seed_from_u64(42);

        let results = vec![
            probe("vless://a@8.8.8.8:443#keep-out", 10, "8.8.8.8"),
            probe("vless://b@127.0.0.1:443", 20, "127.0.0.1"),
            probe("ss://c@9.9.9.9:8388", 20, "9.9.9.9"),
            probe("trojan://d@1.1.1.1:443", 35, "1.1.1.1"),
            probe("vmess://eyJhZGQiOiJ4In0=", 40, "eyJhZGQiOiJ4In0="),
        ];
        let run = labeler.label(results.clone(), &mut rng).await;

        let ranks: Vec<usize> = run.results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);

        for (labeled, original) in run.results.iter().zip(&results) {
            assert_eq!(&labeled.probe, original);
            assert!(brands.contains(&labeled.brand));
            assert!(emojis.contains(&labeled.emoji));
            let name = fragment(&labeled.descriptor);
            assert!(name.contains(&format!("#{:03} |", labeled.rank)));
            assert!(!labeled.descriptor.contains("keep-out"));
        }

        assert_eq!(run.results[1].geo, GeoTag::Unknown);
        assert_eq!(run.results[4].geo, GeoTag::Unknown);
        assert_eq!(run.by_country["DE"].len(), 3);
        assert_eq!(run.by_country["Unknown"].len(), 2);
        assert_eq!(run.by_protocol["vless"].len(), 2);

        // every descriptor lands in exactly one group of each kind
        let all: HashSet<&str> = run.descriptors().into_iter().collect();
        assert_eq!(all.len(), 5);
        for descriptor in &all {
            let in_country = run
                .by_country
                .values()
                .filter(|group| group.iter().any(|d| d == descriptor))
                .count();
            let in_protocol = run
                .by_protocol
                .values()
                .filter(|group| group.iter().any(|d| d == descriptor))
                .count();
            assert_eq!((in_country, in_protocol), (1, 1));
        }
    }

    #[tokio::test]
    async fn test_label_is_reproducible_with_seed() {
        let brands = strings(&["A", "B", "C", "D"]);
        let emojis = strings(&["1", "2", "3"]);
        let results: Vec<_> = (0..10)
            .map(|i| probe(&format!("ss://n{i}@10.0.0.{i}:1"), i, &format!("10.0.0.{i}")))
            .collect();

        let labeler = Labeler::new(brands, emojis, GeoClassifier::unavailable());
        let first = labeler
            .label(results.clone(), &mut StdRng::seed_from_u64(3))
            .await;
        let second = labeler.label(results, &mut StdRng::seed_from_u64(3)).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_label_empty() {
        let labeler = Labeler::new(Vec::new(), Vec::new(), GeoClassifier::unavailable());
        let run = labeler
            .label(Vec::new(), &mut StdRng::seed_from_u64(0))
            .await;
        assert!(run.is_empty());
        assert!(run.by_country.is_empty());
        assert!(run.by_protocol.is_empty());
    }
}
