use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::diagnostics::CompileError;

pub const CONFIG_FILE: &str = "chansel.toml";

/// Compilation options. Loaded from `chansel.toml`, then overridden by flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Emit data-race instrumentation markers for select cases.
    pub race: bool,
    /// Target triple; the host when unset.
    pub target: Option<String>,
}

// ---- TOML deserialization types ----

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    #[serde(default)]
    build: TomlBuild,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TomlBuild {
    #[serde(default)]
    race: bool,
    target: Option<String>,
}

impl Options {
    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, CompileError> {
        let parsed: TomlConfig = toml::from_str(content)
            .map_err(|e| CompileError::config(format!("invalid {CONFIG_FILE}: {}", e.message()), path.to_path_buf()))?;
        if let Some(target) = &parsed.build.target {
            if target.trim().is_empty() {
                return Err(CompileError::config("build.target must not be empty", path.to_path_buf()));
            }
        }
        Ok(Self { race: parsed.build.race, target: parsed.build.target })
    }

    /// Read options from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, CompileError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(CompileError::io(path, e)),
        }
    }

    /// Load `chansel.toml` from `dir` if present.
    pub fn discover(dir: &Path) -> Result<Self, CompileError> {
        Self::load(&config_path(dir))
    }
}

pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}
