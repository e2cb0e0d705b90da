//! Automation configuration stored in `sical-rpa.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::ScreenReference;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "sical-rpa.toml";

/// Run parameters (TOML).
///
/// Edited by operators; missing fields default to the values the desktop
/// form used to pre-fill.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RpaConfig {
    /// Template-match confidence in `[0.50, 0.99]`.
    pub confidence: f32,

    /// Settle delay after every focus advance (tab).
    pub tab_delay_ms: u64,

    /// Settle delay after every click.
    pub click_delay_ms: u64,

    /// Pacing between typed characters.
    pub typing_interval_ms: u64,

    /// Text longer than this many characters is pasted instead of typed.
    pub paste_threshold_chars: usize,

    /// Settle delay after a paste.
    pub paste_settle_ms: u64,

    /// Polling cadence while waiting for the primary field.
    pub poll_interval_ms: u64,

    /// Deadline for the primary field to reappear after confirming a row.
    pub resync_timeout_secs: u64,

    /// Hold before the handoff prompt.
    pub prepare_delay_secs: u64,

    /// Time given to the operator to bring the target window to front.
    pub handoff_delay_secs: u64,

    /// Abort when the pointer is parked at the top-left screen corner.
    pub failsafe: bool,

    pub assets: AssetConfig,
}

/// Where the reference images live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory holding the images. Relative paths resolve against the config file.
    pub dir: PathBuf,
    pub primary_field: String,
    pub validate: String,
    pub confirm: String,
    pub info_dialog: String,
    pub info_acknowledge: String,
    pub critical_dialog: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("images"),
            primary_field: "campo_operacion.png".to_string(),
            validate: "boton_validar.png".to_string(),
            confirm: "boton_yes.png".to_string(),
            info_dialog: "msg_simple.png".to_string(),
            info_acknowledge: "btn_aceptar.png".to_string(),
            critical_dialog: "msg_critico.png".to_string(),
        }
    }
}

impl AssetConfig {
    pub fn file_name(&self, reference: ScreenReference) -> &str {
        match reference {
            ScreenReference::PrimaryField => &self.primary_field,
            ScreenReference::Validate => &self.validate,
            ScreenReference::Confirm => &self.confirm,
            ScreenReference::InfoDialog => &self.info_dialog,
            ScreenReference::InfoAcknowledge => &self.info_acknowledge,
            ScreenReference::CriticalDialog => &self.critical_dialog,
        }
    }
}

impl Default for RpaConfig {
    fn default() -> Self {
        Self {
            confidence: 0.80,
            tab_delay_ms: 400,
            click_delay_ms: 600,
            typing_interval_ms: 20,
            paste_threshold_chars: 20,
            paste_settle_ms: 50,
            poll_interval_ms: 300,
            resync_timeout_secs: 5,
            prepare_delay_secs: 1,
            handoff_delay_secs: 5,
            failsafe: true,
            assets: AssetConfig::default(),
        }
    }
}

impl RpaConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.50..=0.99).contains(&self.confidence) {
            return Err(anyhow!(
                "confidence must be within 0.50..=0.99 (got {})",
                self.confidence
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(anyhow!("poll_interval_ms must be > 0"));
        }
        if self.resync_timeout_secs == 0 {
            return Err(anyhow!("resync_timeout_secs must be > 0"));
        }
        if self.paste_threshold_chars == 0 {
            return Err(anyhow!("paste_threshold_chars must be > 0"));
        }
        for reference in ScreenReference::ALL {
            if self.assets.file_name(reference).trim().is_empty() {
                return Err(anyhow!("assets: missing file name for {reference:?}"));
            }
        }
        Ok(())
    }

    pub fn tab_delay(&self) -> Duration {
        Duration::from_millis(self.tab_delay_ms)
    }

    pub fn click_delay(&self) -> Duration {
        Duration::from_millis(self.click_delay_ms)
    }

    pub fn typing_interval(&self) -> Duration {
        Duration::from_millis(self.typing_interval_ms)
    }

    pub fn paste_settle(&self) -> Duration {
        Duration::from_millis(self.paste_settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn resync_timeout(&self) -> Duration {
        Duration::from_secs(self.resync_timeout_secs)
    }
}

/// Parse an operator-typed delay in seconds; accepts `0.4` and `0,4`.
pub fn parse_seconds_ms(raw: &str) -> Result<u64> {
    let normalized = raw.trim().replace(',', ".");
    let secs: f64 = normalized
        .parse()
        .with_context(|| format!("delay must be a number of seconds (e.g. 0.4), got '{raw}'"))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(anyhow!("delay must be a non-negative number, got '{raw}'"));
    }
    Ok((secs * 1000.0).round() as u64)
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RpaConfig::default()`.
pub fn load_config(path: &Path) -> Result<RpaConfig> {
    if !path.exists() {
        let cfg = RpaConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RpaConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RpaConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, RpaConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("sical-rpa.toml");
        let cfg = RpaConfig {
            confidence: 0.9,
            tab_delay_ms: 250,
            ..RpaConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("sical-rpa.toml");
        fs::write(&path, "click_delay_ms = 900\n[assets]\ndir = \"refs\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.click_delay_ms, 900);
        assert_eq!(cfg.tab_delay_ms, 400);
        assert_eq!(cfg.assets.dir, PathBuf::from("refs"));
        assert_eq!(cfg.assets.validate, "boton_validar.png");
    }

    #[test]
    fn rejects_confidence_out_of_range() {
        let cfg = RpaConfig {
            confidence: 0.3,
            ..RpaConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("confidence"));
    }

    #[test]
    fn parses_comma_and_point_delays() {
        assert_eq!(parse_seconds_ms("0.4").expect("point"), 400);
        assert_eq!(parse_seconds_ms("0,6").expect("comma"), 600);
        assert!(parse_seconds_ms("soon").is_err());
        assert!(parse_seconds_ms("-1").is_err());
    }
}
