use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use topology_core::Size;

use crate::layout::force::ForceConfig;
use crate::layout::grid::GridConfig;
use crate::layout::tree::TreeConfig;
use crate::layout::LayoutKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub layout_type: LayoutKind,
    /// Size assumed for nodes the renderer has not measured yet.
    pub default_node_size: Size,
    /// Space between a group's border and its children, on every side.
    pub group_padding: f64,
    pub force: ForceConfig,
    pub grid: GridConfig,
    pub tree: TreeConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            layout_type: LayoutKind::Force,
            default_node_size: Size::new(180.0, 60.0),
            group_padding: 40.0,
            force: ForceConfig::default(),
            grid: GridConfig::default(),
            tree: TreeConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Clamp tunables into ranges the strategies can work with.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !self.default_node_size.is_finite() {
            self.default_node_size = defaults.default_node_size;
        }
        if !self.group_padding.is_finite() || self.group_padding < 0.0 {
            self.group_padding = defaults.group_padding;
        }
        self.force.iterations = self.force.iterations.max(1);
        if !self.force.spacing.is_finite() || self.force.spacing < 0.0 {
            self.force.spacing = defaults.force.spacing;
        }
        if !self.grid.aspect_ratio.is_finite() || self.grid.aspect_ratio <= 0.0 {
            self.grid.aspect_ratio = defaults.grid.aspect_ratio;
        }
        if !self.grid.spacing.is_finite() || self.grid.spacing < 0.0 {
            self.grid.spacing = defaults.grid.spacing;
        }
        self
    }
}

fn config_file_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "topology")?;
    Some(proj.config_dir().join("engine.toml"))
}

/// Loads the per-user config file, falling back to defaults when it is
/// missing or unreadable.
pub fn load_or_default() -> EngineConfig {
    let Some(path) = config_file_path() else {
        return EngineConfig::default();
    };
    load_or_default_from_path(&path)
}

fn load_or_default_from_path(path: &Path) -> EngineConfig {
    if !path.exists() {
        return EngineConfig::default();
    }
    match load_from_path(path) {
        Ok(cfg) => cfg,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = ?err,
                "ignoring engine config"
            );
            EngineConfig::default()
        }
    }
}

pub fn load_from_path(path: &Path) -> anyhow::Result<EngineConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read engine config {}", path.display()))?;
    from_toml_str(&contents)
        .with_context(|| format!("failed to parse engine config {}", path.display()))
}

pub fn from_toml_str(contents: &str) -> anyhow::Result<EngineConfig> {
    let cfg: EngineConfig = toml::from_str(contents).context("invalid engine config")?;
    Ok(cfg.sanitized())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let cfg = from_toml_str(
            r#"
layout_type = "tree"

[force]
iterations = 120
"#,
        )
        .expect("parse config");

        assert_eq!(cfg.layout_type, LayoutKind::Tree);
        assert_eq!(cfg.force.iterations, 120);
        assert_eq!(cfg.force.spacing, ForceConfig::default().spacing);
        assert_eq!(cfg.grid, GridConfig::default());
    }

    #[test]
    fn unknown_layout_type_is_rejected() {
        assert!(from_toml_str("layout_type = \"radial\"").is_err());
    }

    #[test]
    fn sanitize_repairs_unusable_values() {
        let cfg = from_toml_str(
            r#"
group_padding = -4.0

[force]
iterations = 0

[grid]
aspect_ratio = 0.0
"#,
        )
        .expect("parse config");

        assert_eq!(cfg.force.iterations, 1);
        assert_eq!(cfg.group_padding, 40.0);
        assert_eq!(cfg.grid.aspect_ratio, GridConfig::default().aspect_ratio);
    }

    #[test]
    fn load_from_file_and_fallbacks() {
        let mut file = NamedTempFile::new().expect("tempfile");
        writeln!(file, "layout_type = \"grid\"").expect("write config");
        let cfg = load_from_path(file.path()).expect("load config");
        assert_eq!(cfg.layout_type, LayoutKind::Grid);

        let dir = tempdir().expect("tempdir");
        let missing = dir.path().join("engine.toml");
        assert_eq!(load_or_default_from_path(&missing), EngineConfig::default());

        fs::write(&missing, "layout_type = 3").expect("write broken config");
        assert_eq!(load_or_default_from_path(&missing), EngineConfig::default());
    }
}
