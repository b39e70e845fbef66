//! Aggregate writer for the subscription output tree

use crate::proxy::models::LabeledRun;
use crate::Result;
use anyhow::Context;
use base64::{engine::general_purpose, Engine as _};
use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory holding the plain full list
pub const V2RAY_DIR: &str = "v2ray";

/// Directory holding the base64 full list
pub const BASE64_DIR: &str = "base64";

/// Directory holding one file per country
pub const REGIONS_DIR: &str = "regions";

/// Directory holding one file per protocol scheme
pub const PROTOCOLS_DIR: &str = "filtered/subs";

/// File name of both full lists
pub const ALL_SUB_FILE: &str = "all_sub.txt";

/// Group keys that can be used verbatim as a file stem
static FILE_STEM_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._+-]*$").expect("Invalid file stem regex")
});

/// Characters kept when a group key has to be encoded into a file stem
const FILE_STEM_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'_').remove(b'-').remove(b'+');

/// What a write pass produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub files: Vec<PathBuf>,
}

/// Writes labeled runs below an output directory
#[derive(Debug, Clone)]
pub struct SubscriptionWriter {
    out_dir: PathBuf,
}

impl SubscriptionWriter {
    pub fn new<P: Into<PathBuf>>(out_dir: P) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Create the output tree; existing directories are left alone
    pub fn setup_directories(&self) -> Result<()> {
        for dir in [
            self.out_dir.clone(),
            self.out_dir.join(V2RAY_DIR),
            self.out_dir.join(BASE64_DIR),
            self.out_dir.join(PROTOCOLS_DIR),
            self.out_dir.join(REGIONS_DIR),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }

    /// Write the full lists and every group file for `run`
    ///
    /// An empty run writes nothing.
    pub fn write_run(&self, run: &LabeledRun) -> Result<WriteSummary> {
        let mut summary = WriteSummary::default();
        if run.is_empty() {
            return Ok(summary);
        }
        self.setup_directories()?;

        self.write_groups(REGIONS_DIR, &run.by_country, &mut summary)?;
        self.write_groups(PROTOCOLS_DIR, &run.by_protocol, &mut summary)?;

        let joined = run.descriptors().join("\n");
        let plain = self.out_dir.join(V2RAY_DIR).join(ALL_SUB_FILE);
        write_file(&plain, &joined)?;
        summary.files.push(plain);

        let encoded = self.out_dir.join(BASE64_DIR).join(ALL_SUB_FILE);
        write_file(&encoded, &encode_list(&joined))?;
        summary.files.push(encoded);

        info!(
            files = summary.files.len(),
            out_dir = %self.out_dir.display(),
            "subscriptions written"
        );
        Ok(summary)
    }

    fn write_groups(
        &self,
        dir: &str,
        groups: &BTreeMap<String, Vec<String>>,
        summary: &mut WriteSummary,
    ) -> Result<()> {
        for (key, entries) in groups {
            let stem = file_stem(key);
            if stem != *key {
                debug!(group = %key, %stem, dir, "group name encoded for its file name");
            }
            let path = self.out_dir.join(dir).join(format!("{}.txt", stem));
            write_file(&path, &entries.join("\n"))?;
            summary.files.push(path);
        }
        Ok(())
    }
}

/// File stem for a group key
///
/// Plain tokens such as `US` or `vless` are used as-is; anything else is
/// percent-encoded so it stays a single file name inside its directory.
pub fn file_stem(key: &str) -> String {
    if FILE_STEM_REGEX.is_match(key) {
        key.to_string()
    } else {
        utf8_percent_encode(key, FILE_STEM_ENCODE_SET).to_string()
    }
}

/// Standard padded base64 of the joined list
pub fn encode_list(joined: &str) -> String {
    general_purpose::STANDARD.encode(joined.as_bytes())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}
