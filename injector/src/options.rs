use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::{
    gadget::ConfigSource,
    types::{Architecture, ConfigType},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("Input APK doesn't exist: {}", .0.display())]
    InputMissing(PathBuf),
    #[error("Out path exists, delete, rename or specify another one via \"-o\": {}", .0.display())]
    OutputExists(PathBuf),
    #[error("Out filename must end with .apk")]
    OutputNotApk,
    #[error("Specify either \"config-type\" or \"config-path\", not both")]
    ConflictingConfig,
    #[error("Specify \"config-type\" or \"config-path\"")]
    MissingConfig,
    #[error("Invalid name for {kind}: {name} (must start with \"lib\" and end with \".so\")")]
    InvalidLibraryName { kind: &'static str, name: String },
    #[error("Root temp path doesn't exist: {}", .0.display())]
    TempRootMissing(PathBuf),
    #[error("Select at least one architecture")]
    NoArchitectures,
    #[error("Invalid gadget config: {0}")]
    InvalidConfig(String),
    #[error("Script is required when the gadget config has \"type\": \"script\"")]
    ScriptRequired,
    #[error("Script doesn't exist: {}", .0.display())]
    ScriptMissing(PathBuf),
}

/// Everything a patching run needs, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// APK file, or a directory holding a split package
    pub input: PathBuf,
    pub out: PathBuf,
    pub architectures: Vec<Architecture>,
    pub config: ConfigSource,
    /// Set only when the config runs a script
    pub script_path: Option<PathBuf>,
    pub library_name: String,
    pub script_name: String,
    pub temp_root: PathBuf,
    pub no_cleanup: bool,
    /// Use the cache as is, without checking for new releases
    pub offline: bool,
}

/// Raw, unvalidated settings as they come from the command line.
#[derive(Debug, Clone, Default)]
pub struct RawOptions {
    pub input: PathBuf,
    pub out: Option<PathBuf>,
    pub architectures: Vec<Architecture>,
    pub config_type: Option<ConfigType>,
    pub config_path: Option<PathBuf>,
    pub script_path: Option<PathBuf>,
    pub library_name: String,
    pub script_name: String,
    pub temp_root: PathBuf,
    pub no_cleanup: bool,
    pub offline: bool,
}

pub const DEFAULT_LIBRARY_NAME: &str = "libfrida.so";
pub const DEFAULT_SCRIPT_NAME: &str = "libscript.so";

fn is_library_file_name(name: &str) -> bool {
    name.len() > "lib.so".len() && name.starts_with("lib") && name.ends_with(".so")
}

/// `app.apk` -> `<cwd>/app.patched.apk`
pub fn default_output(input: &Path, cwd: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_owned());

    let patched = match name.strip_suffix(".apk") {
        Some(stem) => format!("{stem}.patched.apk"),
        None => format!("{name}.patched.apk"),
    };
    cwd.join(patched)
}

impl RawOptions {
    pub fn validate(self, cwd: &Path) -> Result<Options, OptionsError> {
        if !self.input.exists() {
            return Err(OptionsError::InputMissing(self.input));
        }

        let out = match self.out {
            Some(out) => out,
            None => default_output(&self.input, cwd),
        };
        if out.exists() {
            return Err(OptionsError::OutputExists(out));
        }
        if out.extension().and_then(|ext| ext.to_str()) != Some("apk") {
            return Err(OptionsError::OutputNotApk);
        }

        let config = match (self.config_type, self.config_path) {
            (Some(_), Some(_)) => return Err(OptionsError::ConflictingConfig),
            (Some(config_type), None) => ConfigSource::Builtin(config_type),
            (None, Some(path)) => ConfigSource::Custom(path),
            (None, None) => return Err(OptionsError::MissingConfig),
        };

        let requires_script = config
            .requires_script()
            .map_err(|err| OptionsError::InvalidConfig(format!("{err:#}")))?;
        let script_path = match (requires_script, self.script_path) {
            (false, _) => None,
            (true, None) => return Err(OptionsError::ScriptRequired),
            (true, Some(path)) if !path.is_file() => return Err(OptionsError::ScriptMissing(path)),
            (true, Some(path)) => Some(path),
        };

        if !is_library_file_name(&self.library_name) {
            return Err(OptionsError::InvalidLibraryName {
                kind: "frida library",
                name: self.library_name,
            });
        }
        if !is_library_file_name(&self.script_name) {
            return Err(OptionsError::InvalidLibraryName {
                kind: "frida script",
                name: self.script_name,
            });
        }

        if !self.temp_root.is_dir() {
            return Err(OptionsError::TempRootMissing(self.temp_root));
        }

        let mut architectures = self.architectures;
        architectures.sort();
        architectures.dedup();
        if architectures.is_empty() {
            return Err(OptionsError::NoArchitectures);
        }

        Ok(Options {
            input: self.input,
            out,
            architectures,
            config,
            script_path,
            library_name: self.library_name,
            script_name: self.script_name,
            temp_root: self.temp_root,
            no_cleanup: self.no_cleanup,
            offline: self.offline,
        })
    }
}

impl Options {
    /// A directory input is treated as the parts of a split package.
    pub fn is_split_apk(&self) -> bool {
        self.input.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn raw(dir: &Path) -> RawOptions {
        let input = dir.join("app.apk");
        fs::write(&input, b"PK").unwrap();
        RawOptions {
            input,
            out: None,
            architectures: vec![Architecture::Arm64, Architecture::Arm, Architecture::Arm64],
            config_type: Some(ConfigType::Listen),
            config_path: None,
            script_path: None,
            library_name: DEFAULT_LIBRARY_NAME.into(),
            script_name: DEFAULT_SCRIPT_NAME.into(),
            temp_root: dir.to_path_buf(),
            no_cleanup: false,
            offline: true,
        }
    }

    #[test]
    fn default_output_replaces_extension() {
        let cwd = Path::new("/work");
        assert_eq!(
            default_output(Path::new("/in/app.apk"), cwd),
            Path::new("/work/app.patched.apk")
        );
        assert_eq!(
            default_output(Path::new("/in/splits"), cwd),
            Path::new("/work/splits.patched.apk")
        );
    }

    #[test]
    fn valid_options_are_normalized() {
        let temp = tempfile::tempdir().unwrap();
        let options = raw(temp.path()).validate(temp.path()).unwrap();

        assert_eq!(options.out, temp.path().join("app.patched.apk"));
        assert_eq!(
            options.architectures,
            [Architecture::Arm, Architecture::Arm64]
        );
        assert_eq!(options.config, ConfigSource::Builtin(ConfigType::Listen));
        assert!(!options.is_split_apk());
    }

    #[test]
    fn config_type_and_path_are_exclusive() {
        let temp = tempfile::tempdir().unwrap();
        let mut options = raw(temp.path());
        options.config_path = Some(temp.path().join("config.json"));
        assert_eq!(
            options.validate(temp.path()).unwrap_err(),
            OptionsError::ConflictingConfig
        );

        let mut options = raw(temp.path());
        options.config_type = None;
        assert_eq!(
            options.validate(temp.path()).unwrap_err(),
            OptionsError::MissingConfig
        );
    }

    #[test]
    fn library_names_need_lib_and_so() {
        let temp = tempfile::tempdir().unwrap();
        let mut options = raw(temp.path());
        options.library_name = "frida.so".into();
        assert!(matches!(
            options.validate(temp.path()),
            Err(OptionsError::InvalidLibraryName { kind: "frida library", .. })
        ));

        let mut options = raw(temp.path());
        options.script_name = "libscript.js".into();
        assert!(matches!(
            options.validate(temp.path()),
            Err(OptionsError::InvalidLibraryName { kind: "frida script", .. })
        ));
    }

    #[test]
    fn existing_or_non_apk_output_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let mut options = raw(temp.path());
        options.out = Some(options.input.clone());
        assert!(matches!(
            options.validate(temp.path()),
            Err(OptionsError::OutputExists(_))
        ));

        let mut options = raw(temp.path());
        options.out = Some(temp.path().join("out.zip"));
        assert_eq!(
            options.validate(temp.path()).unwrap_err(),
            OptionsError::OutputNotApk
        );
    }

    #[test]
    fn script_config_needs_existing_script() {
        let temp = tempfile::tempdir().unwrap();
        let mut options = raw(temp.path());
        options.config_type = Some(ConfigType::Script);
        assert_eq!(
            options.clone().validate(temp.path()).unwrap_err(),
            OptionsError::ScriptRequired
        );

        options.script_path = Some(temp.path().join("hook.js"));
        assert!(matches!(
            options.clone().validate(temp.path()),
            Err(OptionsError::ScriptMissing(_))
        ));

        fs::write(temp.path().join("hook.js"), "console.log(1)").unwrap();
        let validated = options.validate(temp.path()).unwrap();
        assert_eq!(validated.script_path, Some(temp.path().join("hook.js")));
    }

    #[test]
    fn script_is_dropped_when_config_does_not_use_it() {
        let temp = tempfile::tempdir().unwrap();
        let mut options = raw(temp.path());
        options.script_path = Some(temp.path().join("unused.js"));
        assert_eq!(options.validate(temp.path()).unwrap().script_path, None);
    }

    #[test]
    fn custom_config_decides_script_requirement() {
        let temp = tempfile::tempdir().unwrap();
        let config = temp.path().join("config.json");
        fs::write(&config, r#"{"interaction": {"type": "script", "path": "x"}}"#).unwrap();

        let mut options = raw(temp.path());
        options.config_type = None;
        options.config_path = Some(config);
        assert_eq!(
            options.validate(temp.path()).unwrap_err(),
            OptionsError::ScriptRequired
        );
    }

    #[test]
    fn missing_input_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let mut options = raw(temp.path());
        options.input = temp.path().join("nope.apk");
        assert!(matches!(
            options.validate(temp.path()),
            Err(OptionsError::InputMissing(_))
        ));
    }
}
