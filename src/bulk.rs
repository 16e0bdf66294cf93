//! Many screens in one go.
//!
//! Each screen is an independent engine invocation with its own output
//! directory; invocations run on the blocking pool, bounded by
//! `EngineConfig::bulk_workers`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::compare::compare_images;
use crate::config::EngineConfig;
use crate::render;
use crate::report::ComparisonResult;

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenPair {
    pub name: String,
    /// Reference design export.
    pub figma: PathBuf,
    /// Screenshot of the built screen.
    pub built: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenResult {
    pub screen_name: String,
    #[serde(flatten)]
    pub result: ComparisonResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkRun {
    pub batch_dir: PathBuf,
    /// Manifest order. Image paths are relative to the output root.
    pub screens: Vec<ScreenResult>,
}

/// Read a JSON manifest. Relative image paths are taken relative to the
/// manifest's own directory.
pub fn load_manifest(path: &Path) -> Result<Vec<ScreenPair>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let mut screens: Vec<ScreenPair> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse manifest {}", path.display()))?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    for screen in &mut screens {
        if screen.figma.is_relative() {
            screen.figma = base.join(&screen.figma);
        }
        if screen.built.is_relative() {
            screen.built = base.join(&screen.built);
        }
    }
    Ok(screens)
}

/// Directory-safe form of a screen name: ASCII alphanumerics, `-`, `_` and
/// `.` survive, everything else becomes `_`.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "screen".into()
    } else {
        cleaned
    }
}

/// Compare every screen, writing into
/// `<output_root>/bulk_comparisons/<timestamp>/<screen>/`.
/// The first failing screen fails the whole batch.
pub async fn run_bulk(
    screens: Vec<ScreenPair>,
    output_root: &Path,
    config: &EngineConfig,
) -> Result<BulkRun> {
    if screens.is_empty() {
        bail!("bulk manifest lists no screens");
    }

    let mut seen = HashSet::new();
    for screen in &screens {
        let dir = sanitize_name(&screen.name);
        if !seen.insert(dir.clone()) {
            bail!("two screens map to the same directory name: {dir}");
        }
    }

    let root = std::path::absolute(output_root)
        .with_context(|| format!("failed to resolve {}", output_root.display()))?;
    let batch_dir = root
        .join("bulk_comparisons")
        .join(render::timestamp(Local::now()));
    tokio::fs::create_dir_all(&batch_dir)
        .await
        .with_context(|| format!("failed to create {}", batch_dir.display()))?;

    tracing::info!(
        "bulk comparison of {} screen(s) into {} ({} worker(s))",
        screens.len(),
        batch_dir.display(),
        config.bulk_workers
    );

    let permits = Arc::new(Semaphore::new(config.bulk_workers));

    let tasks = screens.into_iter().map(|screen| {
        let permits = permits.clone();
        let config = config.clone();
        let screen_dir = batch_dir.join(sanitize_name(&screen.name));

        async move {
            let _permit = permits
                .acquire_owned()
                .await
                .context("bulk worker pool closed")?;

            tokio::fs::create_dir_all(&screen_dir)
                .await
                .with_context(|| format!("failed to create {}", screen_dir.display()))?;

            let name = screen.name.clone();
            let result = tokio::task::spawn_blocking(move || {
                compare_images(&screen.figma, &screen.built, &screen_dir, &config)
            })
            .await
            .context("comparison task panicked")?
            .with_context(|| format!("screen {name} failed"))?;

            tracing::info!(
                "screen {name}: {}% similar, {} difference(s)",
                result.similarity,
                result.total_differences
            );

            Ok::<_, anyhow::Error>(ScreenResult {
                screen_name: name,
                result,
            })
        }
    });

    let mut results = futures::future::try_join_all(tasks).await?;

    for screen in &mut results {
        for path in screen.result.image_paths_mut() {
            if let Ok(relative) = path.strip_prefix(&root) {
                *path = relative.to_path_buf();
            }
        }
    }

    Ok(BulkRun {
        batch_dir,
        screens: results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_safe_characters() {
        assert_eq!(sanitize_name("Login Screen"), "Login_Screen");
        assert_eq!(sanitize_name("checkout-v2.final"), "checkout-v2.final");
        assert_eq!(sanitize_name("../etc/passwd"), "_etc_passwd");
        assert_eq!(sanitize_name("   "), "screen");
        assert_eq!(sanitize_name("überblick"), "_berblick");
    }

    #[test]
    fn manifest_paths_resolve_against_manifest_dir() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("screens.json");
        std::fs::write(
            &manifest,
            r#"[{"name": "home", "figma": "home_figma.png", "built": "/abs/home_app.png"}]"#,
        )
        .unwrap();
        let screens = load_manifest(&manifest).unwrap();
        assert_eq!(screens.len(), 1);
        assert_eq!(screens[0].figma, dir.path().join("home_figma.png"));
        assert_eq!(screens[0].built, PathBuf::from("/abs/home_app.png"));
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("screens.json");
        std::fs::write(&manifest, r#"{"name": "not a list"}"#).unwrap();
        assert!(load_manifest(&manifest).is_err());
    }
}
