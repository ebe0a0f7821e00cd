use crate::models::enclosure::Enclosure;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub devices: DevicesConfig,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub locate: LocateConfig,

    /// Enclosure name → slot grid, one row per line.
    ///
    /// ```toml
    /// [enclosures]
    /// "0:2" = """
    /// 2 5 8 11
    /// 1 4 7 10
    /// 0 3 6 9
    /// """
    /// ```
    #[serde(default)]
    pub enclosures: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Probe drives with smartctl
    pub smart: bool,
    /// Replay/write cached smartctl output
    pub cache: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    /// Glob-style patterns of devices to skip (e.g. "loop*", "zram*")
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Drive ids always reported as failing.
    #[serde(default)]
    pub known_bad: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocateConfig {
    /// Preferred locate tool; empty = first available.
    #[serde(default)]
    pub tool: String,
}

// ── Defaults ─────────────────────────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { smart: true, cache: false }
    }
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self { exclude: vec!["loop*".into(), "ram*".into(), "zram*".into(), "fd*".into()] }
    }
}

impl DevicesConfig {
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude.iter().any(|pat| match pat.strip_suffix('*') {
            Some(p) => name.starts_with(p),
            None    => pat == name,
        })
    }
}

// ── Load / Save ───────────────────────────────────────────────────────

impl Config {
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else { return Config::default() };
        if !path.exists() {
            // Write defaults on first run (best-effort)
            let _ = try_write_defaults(&path);
            return Config::default();
        }
        match try_load(&path) {
            Ok(c)  => c,
            Err(e) => {
                tracing::warn!("ignoring unreadable config {}: {:#}", path.display(), e);
                Config::default()
            }
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("drivemap").join("drivemap.toml"))
    }

    /// Parsed enclosure grids, in name order.
    pub fn enclosures(&self) -> Vec<Enclosure> {
        self.enclosures
            .iter()
            .map(|(name, grid)| Enclosure::parse(name, grid))
            .collect()
    }
}

fn try_load(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&text)?;
    Ok(cfg)
}

fn try_write_defaults(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(&Config::default())?;
    fs::write(path, format!("# drivemap configuration\n# Generated on first run, edit freely\n\n{}", text))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_enclosures_and_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [health]
            known_bad = ["sdq"]

            [enclosures]
            "0:2" = """
            2 5
            1 4
            """
            "#,
        )
        .unwrap();
        assert!(cfg.general.smart);
        assert_eq!(cfg.health.known_bad, vec!["sdq".to_string()]);
        let encs = cfg.enclosures();
        assert_eq!(encs.len(), 1);
        assert_eq!(encs[0].name, "0:2");
        assert_eq!(encs[0].slots().collect::<Vec<_>>(), vec![2, 5, 1, 4]);
    }

    #[test]
    fn defaults_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drivemap").join("drivemap.toml");
        try_write_defaults(&path).unwrap();
        let cfg = try_load(&path).unwrap();
        assert!(cfg.devices.is_excluded("loop3"));
        assert!(!cfg.devices.is_excluded("sda"));
        assert!(cfg.enclosures.is_empty());
    }
}
