//! Local model directory scanning.
//!
//! Each subdirectory of the models directory may hold one descriptor:
//! `config.json` (camelCase or snake_case keys) or `model.toml`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::descriptor::{Capability, ModelDescriptor};
use hubwright_abstraction::ProviderKind;

/// Descriptor file names, in lookup order.
const DESCRIPTOR_FILES: [&str; 2] = ["config.json", "model.toml"];

/// Outcome of one scan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Names registered.
    pub registered: Vec<String>,
    /// Directories skipped, with the reason.
    pub skipped: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescriptor {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(alias = "context_window")]
    context_window: Option<u32>,
    performance: Option<f64>,
    /// Model id the local runtime serves this artifact under.
    #[serde(default, alias = "runtime_model", alias = "repoId", alias = "repo_id")]
    runtime_model: Option<String>,
}

/// Reads every valid descriptor under `dir`.
///
/// A missing directory is created and yields an empty scan. Unreadable or
/// invalid entries are skipped and logged.
pub async fn scan_directory(dir: &Path) -> (Vec<ModelDescriptor>, ScanReport) {
    let mut report = ScanReport::default();
    let mut models = Vec::new();

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if let Err(e) = tokio::fs::create_dir_all(dir).await {
                warn!(dir = %dir.display(), error = %e, "Failed to create models directory");
            } else {
                info!(dir = %dir.display(), "Created models directory");
            }
            return (models, report);
        }
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to scan models directory");
            return (models, report);
        }
    };

    let mut dirs: Vec<PathBuf> = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                    dirs.push(entry.path());
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Error while listing models directory");
                break;
            }
        }
    }
    // read_dir order is platform-dependent.
    dirs.sort();

    for path in dirs {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        match load_descriptor(&name, &path).await {
            Ok(model) => {
                debug!(model = %model.name, "Found local model");
                report.registered.push(model.name.clone());
                models.push(model);
            }
            Err(reason) => {
                warn!(model = %name, reason = %reason, "Skipping local model");
                report.skipped.push((name, reason));
            }
        }
    }

    (models, report)
}

async fn load_descriptor(dir_name: &str, path: &Path) -> Result<ModelDescriptor, String> {
    let mut raw = None;
    for file in DESCRIPTOR_FILES {
        let candidate = path.join(file);
        let Ok(contents) = tokio::fs::read_to_string(&candidate).await else {
            continue;
        };
        let parsed = if file.ends_with(".json") {
            serde_json::from_str::<RawDescriptor>(&contents).map_err(|e| e.to_string())
        } else {
            toml::from_str::<RawDescriptor>(&contents).map_err(|e| e.to_string())
        };
        raw = Some(parsed.map_err(|e| format!("{}: {}", file, e))?);
        break;
    }
    let raw = raw.ok_or_else(|| "no descriptor file".to_string())?;

    let mut capabilities = std::collections::BTreeSet::new();
    for cap in &raw.capabilities {
        match cap.parse::<Capability>() {
            Ok(cap) => {
                capabilities.insert(cap);
            }
            Err(e) => debug!(model = %dir_name, "{}", e),
        }
    }

    let descriptor = ModelDescriptor {
        name: dir_name.to_string(),
        provider: ProviderKind::Local,
        capabilities,
        context_window: raw.context_window.unwrap_or(0),
        performance: raw.performance.unwrap_or(-1.0),
        local: true,
        artifact_path: Some(path.to_path_buf()),
        api_model: raw.runtime_model.or(raw.name).filter(|n| n != dir_name),
    };
    descriptor.validate()?;
    Ok(descriptor)
}
