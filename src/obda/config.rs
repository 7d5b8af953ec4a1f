//! OBDA `config.dat` manifest
//!
//! A variable-format index directory is described by a line-oriented text
//! manifest: a format sentinel, the 0-based list of data files, the primary
//! namespace and any secondary namespaces. The manifest is loaded once per
//! session open; a missing or malformed manifest is fatal to the session,
//! unlike a missing individual index file.

use std::path::Path;

use crate::error::{QueryError, Result};

/// Filename of the manifest within an index directory
pub const CONFIG_FILE: &str = "config.dat";

/// Required first line of the manifest
const FORMAT_SENTINEL: &str = "index\tflat/1";

/// Parsed `config.dat` manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObdaConfig {
    /// Namespace of the primary key index (`key_<ns>.key`)
    pub primary_namespace: String,
    /// Namespaces of the secondary indices (`id_<ns>.index`)
    pub secondary_namespaces: Vec<String>,
    /// Data filenames addressed by 0-based file id
    pub files: Vec<String>,
}

impl ObdaConfig {
    /// Loads and validates `config.dat` from the index directory
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        let bad = |reason: &str| {
            QueryError::BadManifest(path.display().to_string(), reason.to_string())
        };

        let text = std::fs::read_to_string(&path)
            .map_err(|e| bad(&format!("unreadable: {e}")))?;
        let mut lines = text.lines().map(|line| line.trim_end_matches('\r'));
        if lines.next() != Some(FORMAT_SENTINEL) {
            return Err(bad("first line is not 'index\\tflat/1'").into());
        }

        let mut primary_namespace = None;
        let mut secondary_namespaces = Vec::new();
        let mut files: Vec<Option<String>> = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let mut tokens = line.split('\t');
            let key = tokens.next().unwrap_or("");
            if let Some(id) = key.strip_prefix("fileid_") {
                let id: usize = id
                    .parse()
                    .map_err(|_| bad(&format!("bad file id line: {line}")))?;
                let name = tokens
                    .next()
                    .ok_or_else(|| bad(&format!("file id {id} has no filename")))?;
                if id >= files.len() {
                    files.resize(id + 1, None);
                }
                files[id] = Some(name.to_string());
            } else if key == "primary_namespace" {
                primary_namespace = tokens.next().map(ToString::to_string);
            } else if key == "secondary_namespaces" {
                secondary_namespaces
                    .extend(tokens.flat_map(str::split_whitespace).map(ToString::to_string));
            }
            // unknown keys are tolerated
        }

        let primary_namespace = primary_namespace.ok_or_else(|| bad("no primary_namespace"))?;
        let files = files
            .into_iter()
            .enumerate()
            .map(|(id, name)| name.ok_or_else(|| bad(&format!("file id {id} is unassigned"))))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            primary_namespace,
            secondary_namespaces,
            files,
        })
    }
}
