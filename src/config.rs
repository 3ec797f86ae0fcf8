//! Configuration management for glowup
//!
//! Stores settings in ~/.config/glowup/config.json. Every pipeline setting
//! can be overridden from the environment (`QUALITY_THRESHOLD`,
//! `MAX_RETRIES`, ...), which is how deployments usually configure it.

use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const KEYRING_SERVICE: &str = "glowup";
const KEYRING_USERNAME: &str = "gemini_api_key";

/// Upper bound on variations a single job may request.
pub const MAX_VARIATIONS_PER_JOB: u32 = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub unsplash_api_key: Option<String>,
    pub pexels_api_key: Option<String>,
    /// Minimum `overall` score (1-10) for a generated image to pass
    pub quality_threshold: f64,
    /// Maximum tolerated `ai_detection_risk` (1-10, higher is worse)
    pub ai_detection_max: f64,
    /// Additional generation attempts after a failed quality check
    pub max_retries: u32,
    pub num_variations: u32,
    pub num_scout_refs: usize,
    pub output_dir: PathBuf,
    pub prompt_library_path: PathBuf,
    pub prompt_model: String,
    pub image_model: String,
    pub quality_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            unsplash_api_key: None,
            pexels_api_key: None,
            quality_threshold: 7.0,
            ai_detection_max: 3.0,
            max_retries: 3,
            num_variations: 4,
            num_scout_refs: 3,
            output_dir: PathBuf::from("outputs"),
            prompt_library_path: PathBuf::from("prompt_library.json"),
            prompt_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-2.0-flash-exp".to_string(),
            quality_model: "gemini-2.5-pro".to_string(),
        }
    }
}

fn keyring_entry() -> Result<Entry, keyring::Error> {
    Entry::new(KEYRING_SERVICE, KEYRING_USERNAME)
}

fn read_keyring_key() -> Result<Option<String>, keyring::Error> {
    let entry = keyring_entry()?;
    match entry.get_password() {
        Ok(key) => Ok(Some(key)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(err),
    }
}

fn write_keyring_key(key: &str) -> Result<(), keyring::Error> {
    let entry = keyring_entry()?;
    entry.set_password(key)
}

impl Config {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("glowup"))
    }

    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk (or defaults), then apply environment overrides.
    pub fn load() -> Self {
        let mut config = Self::load_file();
        config.apply_overrides(|name| std::env::var(name).ok());
        config
    }

    fn load_file() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Read a config file. A missing file gives defaults; a corrupt one is
    /// moved aside and defaults are used.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                preserve_corrupt_config(path, &content);
                tracing::warn!(
                    error = %err,
                    path = %path.display(),
                    "config file was corrupted; a backup was saved and defaults were loaded"
                );
                Self::default()
            }
        }
    }

    /// Apply `NAME=value` overrides. Unparseable values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup("UNSPLASH_API_KEY") {
            self.unsplash_api_key = Some(key);
        }
        if let Some(key) = lookup("PEXELS_API_KEY") {
            self.pexels_api_key = Some(key);
        }
        override_parsed(&lookup, "QUALITY_THRESHOLD", &mut self.quality_threshold);
        override_parsed(&lookup, "AI_DETECTION_MAX", &mut self.ai_detection_max);
        override_parsed(&lookup, "MAX_RETRIES", &mut self.max_retries);
        override_parsed(&lookup, "NUM_VARIATIONS", &mut self.num_variations);
        override_parsed(&lookup, "NUM_SCOUT_REFS", &mut self.num_scout_refs);
        if let Some(dir) = lookup("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("PROMPT_LIBRARY_PATH") {
            self.prompt_library_path = PathBuf::from(path);
        }
    }

    /// Save config to disk
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(0o700)) {
                    tracing::warn!(error = %e, "failed to set config directory permissions");
                }
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        crate::util::write_atomic(path, content.as_bytes())
    }

    /// Get the Gemini API key (from environment or keychain)
    pub fn get_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.trim().is_empty() {
                return Some(key);
            }
        }

        match read_keyring_key() {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "failed to read API key from system keychain; set GEMINI_API_KEY instead"
                );
                None
            }
        }
    }

    /// Store the API key in the system keychain and verify it reads back.
    pub fn set_api_key(&self, key: &str) -> anyhow::Result<()> {
        write_keyring_key(key).map_err(|err| {
            anyhow::anyhow!(
                "Failed to store API key in system keychain: {}. \
                 You can set the GEMINI_API_KEY environment variable instead.",
                err
            )
        })?;

        match read_keyring_key() {
            Ok(Some(stored)) if stored == key => Ok(()),
            Ok(_) => Err(anyhow::anyhow!(
                "API key verification failed: key was not persisted to keychain. \
                 You can set the GEMINI_API_KEY environment variable instead."
            )),
            Err(err) => Err(anyhow::anyhow!(
                "API key verification failed: couldn't read back from keychain ({}).",
                err
            )),
        }
    }

    /// Clamp a requested variation count into the accepted range.
    pub fn clamp_variations(requested: u32) -> u32 {
        requested.clamp(1, MAX_VARIATIONS_PER_JOB)
    }

    /// Get the config file location for display
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/glowup/config.json".to_string())
    }
}

fn override_parsed<T, F>(lookup: &F, name: &str, slot: &mut T)
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(variable = name, value = %raw, "ignoring unparseable override"),
    }
}

/// Interactive prompt to set up the Gemini API key
pub fn setup_api_key_interactive() -> anyhow::Result<()> {
    use std::io::{self, Write};

    println!();
    println!("  glowup uses Google Gemini for photo analysis, generation and review.");
    println!("  Get an API key at: https://aistudio.google.com/apikey");
    println!();
    print!("  API Key: ");
    io::stdout().flush()?;

    let mut key = String::new();
    io::stdin().read_line(&mut key)?;
    let key = key.trim();

    if key.is_empty() {
        return Err(anyhow::anyhow!("No API key provided"));
    }

    let mut config = Config::load_file();
    config.set_api_key(key)?;

    println!();
    println!("  + API key saved to the system keychain");
    println!();
    println!("  Stock photo keys improve reference scouting (Enter to skip).");

    let mut changed = false;
    for (label, slot) in [
        ("Unsplash access key", &mut config.unsplash_api_key),
        ("Pexels API key", &mut config.pexels_api_key),
    ] {
        print!("  {}: ", label);
        io::stdout().flush()?;
        let mut value = String::new();
        io::stdin().read_line(&mut value)?;
        let value = value.trim();
        if !value.is_empty() {
            *slot = Some(value.to_string());
            changed = true;
        }
    }

    if changed {
        config.save()?;
        println!("  + Saved to {}", Config::config_location());
    }
    println!();
    Ok(())
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}
