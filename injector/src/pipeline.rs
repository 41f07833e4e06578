use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use tracing::{info, warn};

use crate::{
    apk::{self, ApkEditor, PackageWorkspace},
    cache::{Cache, APKEDITOR_KEY, FRIDA_KEY},
    downloader::{self, GithubReleases},
    gadget::GadgetInstaller,
    manifest,
    options::Options,
    smali::SmaliFile,
    types::{PatchingEvent, Stage},
};

/// Run the whole patch: refresh the cache, decode, inject, install payloads, rebuild,
/// align and sign.
///
/// Returns the path of the signed package.
pub fn patch_apk(
    options: &Options,
    cache: &mut Cache,
    mut report_progress: impl FnMut(PatchingEvent),
) -> anyhow::Result<PathBuf> {
    if options.offline {
        report_progress(PatchingEvent::skipped(Stage::UpdatingCache));
    } else {
        report_progress(Stage::UpdatingCache.into());
        let releases = GithubReleases::new()?;
        downloader::update_frida(cache, &releases).context("Failed to update frida-gadget")?;
        downloader::update_apkeditor(cache, &releases).context("Failed to update APKEditor")?;
        report_progress(PatchingEvent::done(Stage::UpdatingCache));
    }

    report_progress(Stage::CheckingCache.into());
    let missing = cache.missing_gadgets(&options.architectures);
    if !missing.is_empty() {
        let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
        bail!(
            "No cached frida-gadget for {} in {}",
            names.join(", "),
            cache.home().display()
        );
    }
    if !cache.apkeditor_path().is_file() {
        bail!("APKEditor not found at {}", cache.apkeditor_path().display());
    }
    info!(
        "Using frida-gadget {} and APKEditor {}",
        cache.version(FRIDA_KEY).unwrap_or("unknown"),
        cache.version(APKEDITOR_KEY).unwrap_or("unknown")
    );
    report_progress(PatchingEvent::done(Stage::CheckingCache));

    let editor = ApkEditor::new(cache.apkeditor_path());
    let workspace = PackageWorkspace::create(&options.temp_root, options.no_cleanup)?;
    if options.no_cleanup {
        info!("Intermediate files go to {}", workspace.root().display());
    }

    let source_apk = if options.is_split_apk() {
        report_progress(Stage::MergingSplits.into());
        let parts = workspace.stage_split_parts(&options.input)?;
        let merged = workspace.merged_apk();
        editor.merge(&parts, &merged)?;
        report_progress(PatchingEvent::done(Stage::MergingSplits));
        merged
    } else {
        report_progress(PatchingEvent::skipped(Stage::MergingSplits));
        options.input.clone()
    };

    report_progress(Stage::Decoding.into());
    let decoded = workspace.decoded_dir();
    editor.decode(&source_apk, &decoded)?;
    report_progress(PatchingEvent::done(Stage::Decoding));

    report_progress(Stage::LocatingEntryActivity.into());
    let entry_activity = editor.entry_activity(&source_apk)?;
    info!("Entry activity: {}", entry_activity);
    let mut smali = SmaliFile::find(&decoded, &entry_activity)?;
    report_progress(PatchingEvent::done(Stage::LocatingEntryActivity));

    report_progress(Stage::InjectingSmali.into());
    let report = smali
        .inject(&options.library_name)
        .with_context(|| format!("Failed to patch {}", smali.path().display()))?;
    smali.commit()?;
    info!(
        "Injected {:?} loadLibrary(\"{}\") at line {}",
        report.mode,
        report.library,
        report.inserted.start + 1
    );
    report_progress(PatchingEvent::done(Stage::InjectingSmali));

    report_progress(Stage::CopyingPayloads.into());
    let installer = GadgetInstaller::new(&options.library_name, &options.architectures, &decoded);
    installer.copy_gadget(cache)?;
    installer.write_config(&options.config.render(&options.script_name)?)?;
    if let Some(script_path) = &options.script_path {
        let script = fs::read(script_path)
            .with_context(|| format!("Failed to read script {}", script_path.display()))?;
        installer.write_script(&options.script_name, &script)?;
    }
    report_progress(PatchingEvent::done(Stage::CopyingPayloads));

    report_progress(Stage::PatchingManifest.into());
    if manifest::enable_extract_native_libs(&decoded.join("AndroidManifest.xml"))? {
        report_progress(PatchingEvent::done(Stage::PatchingManifest));
    } else {
        report_progress(PatchingEvent::skipped(Stage::PatchingManifest));
    }

    report_progress(Stage::Building.into());
    let built = workspace.built_apk();
    editor.build(&decoded, &built)?;
    report_progress(PatchingEvent::done(Stage::Building));

    report_progress(Stage::Aligning.into());
    let aligned = workspace.aligned_apk();
    apk::zipalign(&built, &aligned)?;
    if let Err(err) = fs::remove_file(&built) {
        warn!("Failed to remove {}: {}", built.display(), err);
    }
    report_progress(PatchingEvent::done(Stage::Aligning));

    report_progress(Stage::Signing.into());
    let key_path = cache.key_path();
    if !key_path.exists() {
        apk::generate_debug_key(&key_path)?;
    }
    apk::sign(&key_path, &aligned)?;
    move_file(&aligned, &options.out)?;
    report_progress(PatchingEvent::done(Stage::Signing));

    info!("APK is ready at {}", options.out.display());
    Ok(options.out.clone())
}

// `rename` does not work across filesystems
fn move_file(from: &Path, to: &Path) -> anyhow::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)
        .with_context(|| format!("Failed to move {} to {}", from.display(), to.display()))?;
    fs::remove_file(from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gadget::ConfigSource,
        types::{Architecture, ConfigType, StageProgress},
    };

    fn options(dir: &Path) -> Options {
        Options {
            input: dir.join("app.apk"),
            out: dir.join("app.patched.apk"),
            architectures: vec![Architecture::Arm64],
            config: ConfigSource::Builtin(ConfigType::Listen),
            script_path: None,
            library_name: "libfrida.so".into(),
            script_name: "libscript.so".into(),
            temp_root: dir.to_path_buf(),
            no_cleanup: false,
            offline: true,
        }
    }

    #[test]
    fn missing_gadget_stops_before_any_work() {
        let temp = tempfile::tempdir().unwrap();
        let mut cache = Cache::open(temp.path().join("cache")).unwrap();

        let mut events = Vec::new();
        let err =
            patch_apk(&options(temp.path()), &mut cache, |event| events.push(event)).unwrap_err();

        assert!(err.to_string().contains("arm64"));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].stage, Stage::UpdatingCache);
        assert_eq!(events[0].progress, StageProgress::Skipped);
        assert_eq!(events[1].stage, Stage::CheckingCache);
        assert_eq!(events[1].progress, StageProgress::Started);
    }

    #[test]
    fn missing_apkeditor_is_reported() {
        let temp = tempfile::tempdir().unwrap();
        let mut cache = Cache::open(temp.path().join("cache")).unwrap();
        fs::write(cache.gadget_path(Architecture::Arm64), b"\x7fELF").unwrap();

        let err = patch_apk(&options(temp.path()), &mut cache, |_| {}).unwrap_err();
        assert!(err.to_string().starts_with("APKEditor not found"));
    }

    #[test]
    fn move_file_replaces_source() {
        let temp = tempfile::tempdir().unwrap();
        let from = temp.path().join("aligned.apk");
        let to = temp.path().join("out.apk");
        fs::write(&from, b"PK").unwrap();

        move_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"PK");
    }
}
