use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context};
use tracing::debug;

use crate::types::Architecture;

const CACHE_DIR_NAME: &str = ".fgi";
const METADATA_FILE: &str = "metadata.json";

/// Keys tracked in `metadata.json`
pub const FRIDA_KEY: &str = "frida";
pub const APKEDITOR_KEY: &str = "apkeditor";

/// Local store of gadget binaries, the APKEditor jar and the signing key.
#[derive(Debug)]
pub struct Cache {
    home: PathBuf,
    metadata: BTreeMap<String, String>,
}

impl Cache {
    /// `~/.fgi`
    pub fn default_home() -> anyhow::Result<PathBuf> {
        env::var_os("HOME")
            .or_else(|| env::var_os("USERPROFILE"))
            .map(|home| PathBuf::from(home).join(CACHE_DIR_NAME))
            .ok_or_else(|| anyhow!("Couldn't determine the home directory"))
    }

    /// Open the cache at `home`, creating the directory and metadata on first use.
    pub fn open(home: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let home = home.into();
        if !home.exists() {
            debug!("Creating cache at {}", home.display());
            fs::create_dir_all(&home)
                .with_context(|| format!("Failed to create {}", home.display()))?;
        }

        let metadata_path = home.join(METADATA_FILE);
        let metadata = if metadata_path.exists() {
            let text = fs::read_to_string(&metadata_path)?;
            serde_json::from_str(&text)
                .with_context(|| format!("Corrupted {}", metadata_path.display()))?
        } else {
            let initial = BTreeMap::from([
                (FRIDA_KEY.to_owned(), "v0".to_owned()),
                (APKEDITOR_KEY.to_owned(), "v0".to_owned()),
            ]);
            fs::write(&metadata_path, serde_json::to_string(&initial)?)?;
            initial
        };

        Ok(Self { home, metadata })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn version(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Record a new version for `key` and persist `metadata.json`.
    pub fn set_version(&mut self, key: &str, version: &str) -> anyhow::Result<()> {
        self.metadata.insert(key.to_owned(), version.to_owned());
        let metadata_path = self.home.join(METADATA_FILE);
        fs::write(&metadata_path, serde_json::to_string(&self.metadata)?)
            .with_context(|| format!("Failed to write {}", metadata_path.display()))
    }

    pub fn apkeditor_path(&self) -> PathBuf {
        self.home.join("apkeditor.jar")
    }

    pub fn key_path(&self) -> PathBuf {
        self.home.join("debug.keystore")
    }

    pub fn gadget_path(&self, arch: Architecture) -> PathBuf {
        self.home.join(format!("{arch}.so"))
    }

    /// Selected architectures with no gadget binary in the cache.
    pub fn missing_gadgets(&self, architectures: &[Architecture]) -> Vec<Architecture> {
        architectures
            .iter()
            .copied()
            .filter(|&arch| !self.gadget_path(arch).is_file())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_open_writes_default_metadata() {
        let temp = tempfile::tempdir().unwrap();
        let home = temp.path().join("cache");

        let cache = Cache::open(&home).unwrap();
        assert_eq!(cache.version(FRIDA_KEY), Some("v0"));
        assert_eq!(cache.version(APKEDITOR_KEY), Some("v0"));

        let text = fs::read_to_string(home.join(METADATA_FILE)).unwrap();
        let stored: BTreeMap<String, String> = serde_json::from_str(&text).unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[test]
    fn existing_metadata_is_read() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(
            temp.path().join(METADATA_FILE),
            r#"{"frida": "16.5.2", "apkeditor": "V1.4.1"}"#,
        )
        .unwrap();

        let cache = Cache::open(temp.path()).unwrap();
        assert_eq!(cache.version(FRIDA_KEY), Some("16.5.2"));
    }

    #[test]
    fn set_version_survives_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let mut cache = Cache::open(temp.path()).unwrap();
        cache.set_version(FRIDA_KEY, "16.5.2").unwrap();

        let reopened = Cache::open(temp.path()).unwrap();
        assert_eq!(reopened.version(FRIDA_KEY), Some("16.5.2"));
        assert_eq!(reopened.version(APKEDITOR_KEY), Some("v0"));
    }

    #[test]
    fn reports_missing_gadgets() {
        let temp = tempfile::tempdir().unwrap();
        let cache = Cache::open(temp.path()).unwrap();
        fs::write(cache.gadget_path(Architecture::Arm64), b"\x7fELF").unwrap();

        let missing = cache.missing_gadgets(&[Architecture::Arm64, Architecture::X86_64]);
        assert_eq!(missing, [Architecture::X86_64]);
        assert!(cache.gadget_path(Architecture::X86_64).ends_with("x86_64.so"));
    }
}
