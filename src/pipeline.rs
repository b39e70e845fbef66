//! End-to-end run: probe, label and write

use crate::proxy::checker::{CheckerConfig, ProbeProgress, ProbeScheduler};
use crate::proxy::geo::GeoClassifier;
use crate::proxy::labeler::Labeler;
use crate::proxy::writer::SubscriptionWriter;
use crate::settings::Settings;
use crate::Result;
use rand::Rng;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub probed: usize,
    pub reachable: usize,
    pub files: Vec<PathBuf>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn nothing_found(&self) -> bool {
        self.reachable == 0
    }
}

/// Everything a run needs, built once from the settings
pub struct Pipeline {
    scheduler: ProbeScheduler,
    labeler: Labeler,
    writer: SubscriptionWriter,
}

impl Pipeline {
    pub fn new(settings: &Settings, concurrency: usize, classifier: GeoClassifier) -> Self {
        let checker = CheckerConfig::new()
            .with_timeout(settings.probe_timeout())
            .with_concurrency(concurrency);

        Self {
            scheduler: ProbeScheduler::with_config(checker),
            labeler: Labeler::new(settings.brands.clone(), settings.emojis.clone(), classifier),
            writer: SubscriptionWriter::new(settings.out_dir.clone()),
        }
    }

    pub fn writer(&self) -> &SubscriptionWriter {
        &self.writer
    }

    /// Probe `descriptors`, label the reachable ones and write the output tree
    ///
    /// When nothing is reachable no files are written and the summary says so.
    pub async fn process<R, F>(
        &self,
        descriptors: BTreeSet<String>,
        rng: &mut R,
        on_progress: F,
    ) -> Result<RunSummary>
    where
        R: Rng + ?Sized,
        F: FnMut(ProbeProgress),
    {
        let start = Instant::now();
        let probed = descriptors.len();
        info!(
            descriptors = probed,
            concurrency = self.scheduler.config().concurrency,
            timeout_ms = self.scheduler.config().timeout.as_millis() as u64,
            "probing endpoints"
        );

        let reachable = self.scheduler.run_all(descriptors, on_progress).await;
        let mut summary = RunSummary {
            probed,
            reachable: reachable.len(),
            ..Default::default()
        };
        info!(probed, reachable = summary.reachable, "probing finished");

        if !reachable.is_empty() {
            let run = self.labeler.label(reachable, rng).await;
            info!(
                countries = run.by_country.len(),
                protocols = run.by_protocol.len(),
                "endpoints labeled"
            );
            summary.files = self.writer.write_run(&run)?.files;
        }

        summary.elapsed = start.elapsed();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[tokio::test]
    async fn test_process_empty_set() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings {
            out_dir: tmp.path().join("out"),
            ..Default::default()
        };
        let pipeline = Pipeline::new(&settings, 8, GeoClassifier::unavailable());
        let summary = pipeline
            .process(BTreeSet::new(), &mut StdRng::seed_from_u64(1), |_| {})
            .await
            .unwrap();

        assert!(summary.nothing_found());
        assert_eq!(summary.probed, 0);
        assert!(summary.files.is_empty());
        assert!(!tmp.path().join("out").exists());
    }
}
