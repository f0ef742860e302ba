//! Reference image loading
//!
//! Templates live under `<template_dir>/terminal/` and
//! `<template_dir>/action/`. A terminal match ends surveillance of the
//! instance (kill); an action match injects a tap.

use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::TemplateLoadError;

/// Image extensions recognized as templates
const TEMPLATE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// What a matched template triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateRole {
    /// Inject a tap at the match location
    Action,
    /// Terminate the instance and stop watching it
    Terminal,
}

impl TemplateRole {
    /// Subdirectory name for this role
    pub fn dir_name(&self) -> &'static str {
        match self {
            TemplateRole::Action => "action",
            TemplateRole::Terminal => "terminal",
        }
    }
}

/// A loaded reference image. Immutable after load; shared read-only
/// across instances within one cycle.
#[derive(Debug, Clone)]
pub struct Template {
    /// File stem, used in logs and events
    pub name: String,
    pub role: TemplateRole,
    pub image: RgbImage,
}

impl Template {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Loads templates from the configured directory once per scan pass
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Load a single template file, normalizing channel depth to RGB8
    pub fn load_file(
        path: &Path,
        role: TemplateRole,
    ) -> std::result::Result<Template, TemplateLoadError> {
        if !path.exists() {
            return Err(TemplateLoadError::NotFound(path.to_path_buf()));
        }

        let image = image::open(path)
            .map_err(|e| TemplateLoadError::DecodeError {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?
            .to_rgb8();

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Template { name, role, image })
    }

    /// Load every template, terminal group first, filename-sorted
    /// within each group so load order is deterministic.
    ///
    /// Per-file failures are logged and skipped; a missing role
    /// directory just contributes nothing.
    pub fn load_all(&self) -> Vec<Template> {
        let mut templates = Vec::new();
        for role in [TemplateRole::Terminal, TemplateRole::Action] {
            self.load_role(role, &mut templates);
        }
        templates
    }

    fn load_role(&self, role: TemplateRole, out: &mut Vec<Template>) {
        let dir = self.root.join(role.dir_name());
        let Ok(entries) = std::fs::read_dir(&dir) else {
            log::debug!("no {} template directory at {}", role.dir_name(), dir.display());
            return;
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| TEMPLATE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        for path in paths {
            match Self::load_file(&path, role) {
                Ok(template) => out.push(template),
                Err(e) => log::warn!("skipping template {}: {}", path.display(), e),
            }
        }
    }
}
