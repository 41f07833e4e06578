//! Gadget payloads: the shared library itself, its config and an optional script.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    cache::Cache,
    types::{Architecture, ConfigType},
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GadgetConfig {
    pub interaction: Interaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Interaction {
    Listen {
        address: String,
        port: u16,
        on_port_conflict: String,
        on_load: String,
    },
    Connect {
        address: String,
        port: u16,
    },
    Script {
        path: String,
    },
}

impl GadgetConfig {
    pub fn builtin(config_type: ConfigType, script_name: &str) -> Self {
        let interaction = match config_type {
            ConfigType::Listen => Interaction::Listen {
                address: "0.0.0.0".into(),
                port: 27042,
                on_port_conflict: "fail".into(),
                on_load: "wait".into(),
            },
            ConfigType::Connect => Interaction::Connect {
                address: "0.0.0.0".into(),
                port: 27052,
            },
            ConfigType::Script => Interaction::Script {
                path: script_name.into(),
            },
        };
        Self { interaction }
    }
}

/// Where the gadget config comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Builtin(ConfigType),
    /// User supplied JSON, installed verbatim
    Custom(PathBuf),
}

impl ConfigSource {
    /// Config file content to install next to the gadget.
    pub fn render(&self, script_name: &str) -> anyhow::Result<String> {
        match self {
            ConfigSource::Builtin(config_type) => Ok(serde_json::to_string_pretty(
                &GadgetConfig::builtin(*config_type, script_name),
            )?),
            ConfigSource::Custom(path) => fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display())),
        }
    }

    /// Whether the config makes the gadget run a bundled script.
    pub fn requires_script(&self) -> anyhow::Result<bool> {
        match self {
            ConfigSource::Builtin(config_type) => Ok(*config_type == ConfigType::Script),
            ConfigSource::Custom(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                custom_config_requires_script(&text)
            }
        }
    }
}

fn custom_config_requires_script(text: &str) -> anyhow::Result<bool> {
    let config: Value = serde_json::from_str(text).context("Gadget config is not valid JSON")?;
    let interaction = config
        .get("interaction")
        .ok_or_else(|| anyhow!("\"interaction\" key in frida's config is missing"))?;
    let config_type = interaction
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("\"type\" key in frida's config is missing"))?;
    Ok(config_type == "script")
}

/// Installs payloads under `<decoded>/root/lib/<abi>/`.
#[derive(Debug)]
pub struct GadgetInstaller<'a> {
    library_name: &'a str,
    architectures: &'a [Architecture],
    decoded_root: &'a Path,
}

impl<'a> GadgetInstaller<'a> {
    pub fn new(
        library_name: &'a str,
        architectures: &'a [Architecture],
        decoded_root: &'a Path,
    ) -> Self {
        Self {
            library_name,
            architectures,
            decoded_root,
        }
    }

    pub fn lib_root(&self) -> PathBuf {
        self.decoded_root.join("root").join("lib")
    }

    pub fn arch_dir(&self, arch: Architecture) -> PathBuf {
        self.lib_root().join(arch.abi())
    }

    /// `libfrida.so` -> `libfrida.config.so`
    pub fn config_file_name(&self) -> String {
        let stem = self
            .library_name
            .strip_suffix(".so")
            .unwrap_or(self.library_name);
        format!("{stem}.config.so")
    }

    pub fn copy_gadget(&self, cache: &Cache) -> anyhow::Result<()> {
        for &arch in self.architectures {
            let dir = self.arch_dir(arch);
            if !dir.exists() {
                debug!("lib/{}/ directory does NOT exist, creating", arch.abi());
                fs::create_dir_all(&dir)?;
            }

            let target = dir.join(self.library_name);
            if target.exists() {
                bail!(
                    "Gadget already injected with specified name: {}",
                    target.display()
                );
            }

            info!("Copying {} frida-gadget", arch);
            let source = cache.gadget_path(arch);
            fs::copy(&source, &target).with_context(|| {
                format!("Failed to copy {} to {}", source.display(), target.display())
            })?;
        }
        Ok(())
    }

    pub fn write_config(&self, config: &str) -> anyhow::Result<()> {
        let file_name = self.config_file_name();
        for &arch in self.architectures {
            debug!("Copying {} config", arch);
            fs::write(self.arch_dir(arch).join(&file_name), config)?;
        }
        Ok(())
    }

    pub fn write_script(&self, script_name: &str, script: &[u8]) -> anyhow::Result<()> {
        for &arch in self.architectures {
            debug!("Copying {} / {}", script_name, arch);
            fs::write(self.arch_dir(arch).join(script_name), script)?;
        }
        Ok(())
    }
}
