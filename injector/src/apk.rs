//! Package-level operations delegated to external tools.
//!
//! APKEditor handles merge, decode, build and manifest queries; the Android build tools
//! handle alignment and signing. Everything here is "run tool, check exit status".

use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context};
use rand::{distributions::Alphanumeric, Rng};
use tracing::{debug, info, warn};

use crate::cmd::{run_command_and_check, ToolError};

const TEMP_PATH_LEN: usize = 12;

pub const DEBUG_KEY_ALIAS: &str = "androiddebugkey";
pub const DEBUG_KEY_PASSWORD: &str = "android";

/// Handle to the APKEditor jar, run through `java -jar`.
#[derive(Debug, Clone)]
pub struct ApkEditor {
    jar: PathBuf,
}

impl ApkEditor {
    pub fn new(jar: impl Into<PathBuf>) -> Self {
        Self { jar: jar.into() }
    }

    fn run(&self, args: &[&OsStr]) -> Result<String, ToolError> {
        let mut full: Vec<&OsStr> = vec![OsStr::new("-jar"), self.jar.as_os_str()];
        full.extend_from_slice(args);
        run_command_and_check("java", &full)
    }

    /// Merge a directory of split APKs into a single package at `output`.
    pub fn merge(&self, input_dir: &Path, output: &Path) -> Result<(), ToolError> {
        info!("Merging split APKs...");
        self.run(&[
            OsStr::new("m"),
            OsStr::new("-i"),
            input_dir.as_os_str(),
            OsStr::new("-o"),
            output.as_os_str(),
        ])
        .map(drop)
    }

    pub fn decode(&self, apk: &Path, output_dir: &Path) -> Result<(), ToolError> {
        info!("Decoding APK to {}...", output_dir.display());
        self.run(&[
            OsStr::new("d"),
            OsStr::new("-i"),
            apk.as_os_str(),
            OsStr::new("-o"),
            output_dir.as_os_str(),
        ])
        .map(drop)
    }

    pub fn build(&self, decoded_dir: &Path, output: &Path) -> Result<(), ToolError> {
        info!("Building APK...");
        self.run(&[
            OsStr::new("b"),
            OsStr::new("-i"),
            decoded_dir.as_os_str(),
            OsStr::new("-o"),
            output.as_os_str(),
        ])
        .map(drop)
    }

    /// Fully qualified class name of the launcher activity.
    pub fn entry_activity(&self, apk: &Path) -> anyhow::Result<String> {
        let output = self.run(&[
            OsStr::new("info"),
            OsStr::new("-i"),
            apk.as_os_str(),
            OsStr::new("-activities"),
        ])?;
        parse_entry_activity(&output)
            .ok_or_else(|| anyhow!("No entry activity found in {}", apk.display()))
    }
}

/// Extract the class name from APKEditor's `activity-main="..."` output.
pub fn parse_entry_activity(output: &str) -> Option<String> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("activity-main="))
        .or_else(|| output.lines().map(str::trim).find(|line| !line.is_empty()))?;

    let name = line
        .trim_start_matches("activity-main=")
        .trim()
        .trim_matches('"')
        .trim();
    (!name.is_empty()).then(|| name.to_owned())
}

/// Whether `file_name` is part of a split package (`base*.apk` / `split_*.apk`).
pub fn is_split_part(file_name: &str) -> bool {
    (file_name.starts_with("base") || file_name.starts_with("split_"))
        && file_name.ends_with(".apk")
}

pub fn zipalign(input: &Path, output: &Path) -> Result<(), ToolError> {
    info!("Zipaligning APK...");
    run_command_and_check(
        "zipalign",
        &[
            OsStr::new("-p"),
            OsStr::new("4"),
            input.as_os_str(),
            output.as_os_str(),
        ],
    )
    .map(drop)
}

pub fn generate_debug_key(key_path: &Path) -> Result<(), ToolError> {
    debug!("Generating key...");
    run_command_and_check(
        "keytool",
        &[
            OsStr::new("-genkey"),
            OsStr::new("-v"),
            OsStr::new("-keystore"),
            key_path.as_os_str(),
            OsStr::new("-storepass"),
            OsStr::new(DEBUG_KEY_PASSWORD),
            OsStr::new("-alias"),
            OsStr::new(DEBUG_KEY_ALIAS),
            OsStr::new("-keypass"),
            OsStr::new(DEBUG_KEY_PASSWORD),
            OsStr::new("-keyalg"),
            OsStr::new("RSA"),
            OsStr::new("-keysize"),
            OsStr::new("2048"),
            OsStr::new("-validity"),
            OsStr::new("10000"),
            OsStr::new("-dname"),
            OsStr::new("C=US, O=Android, CN=Android Debug"),
        ],
    )
    .map(drop)
}

fn apksigner_executable() -> &'static str {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "windows")] {
            let executable = "apksigner.bat";
        } else {
            let executable = "apksigner";
        }
    };
    executable
}

/// Sign `apk` in place with the debug key at `key_path`.
pub fn sign(key_path: &Path, apk: &Path) -> Result<(), ToolError> {
    info!("Signing APK...");
    let ks_pass = format!("pass:{DEBUG_KEY_PASSWORD}");
    run_command_and_check(
        apksigner_executable(),
        &[
            OsStr::new("sign"),
            OsStr::new("--ks"),
            key_path.as_os_str(),
            OsStr::new("--ks-pass"),
            OsStr::new(&ks_pass),
            OsStr::new("--ks-key-alias"),
            OsStr::new(DEBUG_KEY_ALIAS),
            apk.as_os_str(),
        ],
    )
    .map(drop)
}

/// Scratch locations for one run. Removed on drop unless `keep` is set.
#[derive(Debug)]
pub struct PackageWorkspace {
    root: PathBuf,
    keep: bool,
}

impl PackageWorkspace {
    pub fn create(temp_root: &Path, keep: bool) -> anyhow::Result<Self> {
        let name: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TEMP_PATH_LEN)
            .map(char::from)
            .collect();
        let root = temp_root.join(name);
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create {}", root.display()))?;
        debug!("Working in {}", root.display());
        Ok(Self { root, keep })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn decoded_dir(&self) -> PathBuf {
        self.root.join("decoded")
    }

    pub fn merge_input_dir(&self) -> PathBuf {
        self.root.join("merge-input")
    }

    pub fn merged_apk(&self) -> PathBuf {
        self.root.join("merged.apk")
    }

    pub fn built_apk(&self) -> PathBuf {
        self.root.join("built.apk")
    }

    pub fn aligned_apk(&self) -> PathBuf {
        self.root.join("aligned.apk")
    }

    /// Copy the split parts of `split_dir` into a fresh merge input directory.
    pub fn stage_split_parts(&self, split_dir: &Path) -> anyhow::Result<PathBuf> {
        let target = self.merge_input_dir();
        fs::create_dir_all(&target)?;

        let mut copied = Vec::new();
        for entry in fs::read_dir(split_dir)
            .with_context(|| format!("Failed to read {}", split_dir.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_split_part(&name) {
                continue;
            }
            fs::copy(entry.path(), target.join(&name))?;
            copied.push(name);
        }

        if copied.is_empty() {
            anyhow::bail!("No base*.apk or split_*.apk found in {}", split_dir.display());
        }
        copied.sort();
        debug!("Filtered split APKs: {} -> {}", copied.join(", "), target.display());
        Ok(target)
    }
}

impl Drop for PackageWorkspace {
    fn drop(&mut self) {
        if self.keep {
            info!("Keeping temporary files at {}", self.root.display());
            return;
        }
        if let Err(err) = fs::remove_dir_all(&self.root) {
            warn!("Failed to clean up {}: {}", self.root.display(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_activity_main_line() {
        let out = "activity-main=\"com.example.app.MainActivity\"\n";
        assert_eq!(
            parse_entry_activity(out).as_deref(),
            Some("com.example.app.MainActivity")
        );
    }

    #[test]
    fn picks_activity_main_among_other_lines() {
        let out = "package=\"com.example\"\nactivity-main=\"com.example.Launcher\"\n";
        assert_eq!(parse_entry_activity(out).as_deref(), Some("com.example.Launcher"));
    }

    #[test]
    fn empty_output_has_no_activity() {
        assert_eq!(parse_entry_activity(""), None);
        assert_eq!(parse_entry_activity("activity-main=\"\""), None);
    }

    #[test]
    fn split_part_names() {
        assert!(is_split_part("base.apk"));
        assert!(is_split_part("split_config.arm64_v8a.apk"));
        assert!(!is_split_part("other.apk"));
        assert!(!is_split_part("base.apk.idsig"));
    }

    #[test]
    fn workspace_is_removed_unless_kept() {
        let temp = tempfile::tempdir().unwrap();

        let workspace = PackageWorkspace::create(temp.path(), false).unwrap();
        let root = workspace.root().to_path_buf();
        assert!(root.is_dir());
        drop(workspace);
        assert!(!root.exists());

        let kept = PackageWorkspace::create(temp.path(), true).unwrap();
        let root = kept.root().to_path_buf();
        drop(kept);
        assert!(root.is_dir());
    }

    #[test]
    fn stages_only_split_parts() {
        let temp = tempfile::tempdir().unwrap();
        let splits = temp.path().join("splits");
        fs::create_dir(&splits).unwrap();
        for name in ["base.apk", "split_config.en.apk", "notes.txt"] {
            fs::write(splits.join(name), b"x").unwrap();
        }

        let workspace = PackageWorkspace::create(temp.path(), false).unwrap();
        let staged = workspace.stage_split_parts(&splits).unwrap();

        let mut names: Vec<String> = fs::read_dir(&staged)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["base.apk", "split_config.en.apk"]);
    }
}
