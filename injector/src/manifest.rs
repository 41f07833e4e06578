use std::{fs, path::Path};

use anyhow::Context;
use thiserror::Error;
use tracing::debug;
use xmltree::Element;

const EXTRACT_NATIVE_LIBS: &str = "extractNativeLibs";
const EXTRACT_NATIVE_LIBS_QUALIFIED: &str = "android:extractNativeLibs";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Manifest parse error: {0}")]
    Parse(#[from] xmltree::ParseError),
    #[error("Manifest has no <application> element")]
    NoApplication,
}

/// Value of `android:extractNativeLibs` on `<application>`, if declared.
pub fn extract_native_libs(manifest: &str) -> Result<Option<String>, ManifestError> {
    let root = Element::parse(manifest.as_bytes())?;
    let application = root
        .get_child("application")
        .ok_or(ManifestError::NoApplication)?;

    Ok(application
        .attributes
        .get(EXTRACT_NATIVE_LIBS)
        .or_else(|| application.attributes.get(EXTRACT_NATIVE_LIBS_QUALIFIED))
        .cloned())
}

/// Flip `extractNativeLibs="false"` to `"true"` so the gadget is unpacked at install.
///
/// Only the attribute value is touched, the rest of the manifest is kept as is.
/// Returns `None` when no change is needed.
pub fn enable_extract_native_libs_in(manifest: &str) -> Result<Option<String>, ManifestError> {
    if extract_native_libs(manifest)?.as_deref() != Some("false") {
        return Ok(None);
    }

    let Some(application) = manifest.find("<application") else {
        return Err(ManifestError::NoApplication);
    };
    let tag_end = manifest[application..]
        .find('>')
        .map_or(manifest.len(), |end| application + end);
    let tag = &manifest[application..tag_end];

    let Some(attr) = tag.find(EXTRACT_NATIVE_LIBS) else {
        return Ok(None);
    };
    let after_name = &tag[attr + EXTRACT_NATIVE_LIBS.len()..];
    let Some(value_offset) = after_name.find("false") else {
        return Ok(None);
    };

    let start = application + attr + EXTRACT_NATIVE_LIBS.len() + value_offset;
    let mut patched = String::with_capacity(manifest.len());
    patched.push_str(&manifest[..start]);
    patched.push_str("true");
    patched.push_str(&manifest[start + "false".len()..]);
    Ok(Some(patched))
}

/// Patch the decoded `AndroidManifest.xml` at `path` in place.
pub fn enable_extract_native_libs(path: &Path) -> anyhow::Result<bool> {
    let manifest =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    match enable_extract_native_libs_in(&manifest)? {
        Some(patched) => {
            debug!("Enabling extractNativeLibs in manifest");
            fs::write(path, patched)?;
            Ok(true)
        }
        None => Ok(false),
    }
}
