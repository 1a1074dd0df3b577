//! Data directory layout and TOML engine configuration.

use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use nomnom_core::EngineConfig;
use nomnom_core::constants::{DISTANCE_TOLERANCE_RANGE, MAX_RESULTS};

use crate::error::{Result, StoreError};

/// Overrides the data directory when set and non-empty.
pub const DATA_DIR_ENV: &str = "NOMNOM_DATA_DIR";
pub const DB_FILE: &str = "nomnom.db";
pub const CONFIG_FILE: &str = "config.toml";

/// `$NOMNOM_DATA_DIR`, else `~/.nomnom`.
pub fn default_base_dir() -> PathBuf {
    match env::var(DATA_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => dirs_home().join(".nomnom"),
    }
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

pub fn db_path(base: &Path) -> PathBuf {
    base.join(DB_FILE)
}

pub fn config_path(base: &Path) -> PathBuf {
    base.join(CONFIG_FILE)
}

/// Read an engine config. A missing file yields the defaults; any key left
/// out of the file keeps its default.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(EngineConfig::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: EngineConfig = toml::from_str(&text)?;
    validate(&config)?;
    Ok(config)
}

/// Write `config` as TOML, creating parent directories.
pub fn save_config(path: &Path, config: &EngineConfig) -> Result<()> {
    let text = toml::to_string_pretty(config)
        .map_err(|e| StoreError::Config(format!("cannot serialize config: {e}")))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;
    Ok(())
}

fn validate(config: &EngineConfig) -> Result<()> {
    let s = &config.scoring;
    let weights = [
        ("distance_weight", s.distance_weight),
        ("price_weight", s.price_weight),
        ("tag_weight", s.tag_weight),
        ("popularity_weight", s.popularity_weight),
        ("pattern_weight", s.pattern_weight),
    ];
    for (name, w) in weights {
        if !w.is_finite() || w < 0.0 {
            return Err(StoreError::Config(format!(
                "scoring.{name} must be a non-negative number, got {w}"
            )));
        }
    }
    if !(1..=MAX_RESULTS).contains(&config.max_results) {
        return Err(StoreError::Config(format!(
            "max_results must be between 1 and {MAX_RESULTS}, got {}",
            config.max_results
        )));
    }
    if !DISTANCE_TOLERANCE_RANGE.contains(&s.distance_tolerance) {
        return Err(StoreError::Config(format!(
            "scoring.distance_tolerance must be between {} and {}, got {}",
            DISTANCE_TOLERANCE_RANGE.start(),
            DISTANCE_TOLERANCE_RANGE.end(),
            s.distance_tolerance
        )));
    }
    if !s.dislike_penalty.is_finite() || s.dislike_penalty <= 0.0 {
        return Err(StoreError::Config(format!(
            "scoring.dislike_penalty must be positive, got {}",
            s.dislike_penalty
        )));
    }
    if !(s.revisit_factor > 0.0 && s.revisit_factor <= 1.0) {
        return Err(StoreError::Config(format!(
            "scoring.revisit_factor must be in (0, 1], got {}",
            s.revisit_factor
        )));
    }
    let travel = &config.profile;
    if !travel.min_travel_km.is_finite() || travel.min_travel_km <= 0.0 {
        return Err(StoreError::Config(format!(
            "profile.min_travel_km must be positive, got {}",
            travel.min_travel_km
        )));
    }
    if config.latent.factors == 0 {
        return Err(StoreError::Config("latent.factors must be at least 1".into()));
    }
    Ok(())
}
