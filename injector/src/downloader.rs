//! Release downloads that keep the cache current.
//!
//! The latest frida-gadget and APKEditor releases are looked up on GitHub and only
//! fetched when their tag differs from the one recorded in `metadata.json`.

use std::{fs, io::Cursor};

use anyhow::Context;
use serde::Deserialize;
use strum::IntoEnumIterator as _;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    cache::{Cache, APKEDITOR_KEY, FRIDA_KEY},
    types::Architecture,
};

pub const FRIDA_REPO: &str = "frida/frida";
pub const APKEDITOR_REPO: &str = "REAndroid/APKEditor";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decompress {asset}: {reason}")]
    Decompress { asset: String, reason: String },
    #[error("release {tag} of {repo} has no {what} asset")]
    MissingAsset {
        repo: String,
        tag: String,
        what: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
}

/// Where releases and their assets come from.
pub trait ReleaseSource {
    fn latest_release(&self, repo: &str) -> Result<Release, DownloadError>;

    fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError>;
}

/// The GitHub releases API over a blocking client.
#[derive(Debug, Clone)]
pub struct GithubReleases {
    client: reqwest::blocking::Client,
}

impl GithubReleases {
    pub fn new() -> Result<Self, DownloadError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| DownloadError::Http {
                url: "https://api.github.com".into(),
                source,
            })?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, DownloadError> {
        debug!("Requesting {}...", url);
        self.client
            .get(url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|source| DownloadError::Http {
                url: url.to_owned(),
                source,
            })
    }
}

impl ReleaseSource for GithubReleases {
    fn latest_release(&self, repo: &str) -> Result<Release, DownloadError> {
        let url = format!("https://api.github.com/repos/{repo}/releases/latest");
        self.get(&url)?
            .json()
            .map_err(|source| DownloadError::Http { url, source })
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let bytes = self
            .get(url)?
            .bytes()
            .map_err(|source| DownloadError::Http {
                url: url.to_owned(),
                source,
            })?;
        Ok(bytes.to_vec())
    }
}

/// Architecture of a `frida-gadget-<version>-android-<arch>.so.xz` asset.
pub fn gadget_asset_architecture(asset_name: &str) -> Option<Architecture> {
    if !asset_name.starts_with("frida-gadget-") {
        return None;
    }
    let stem = asset_name.strip_suffix(".so.xz")?;
    let (_, arch) = stem.rsplit_once("-android-")?;
    Architecture::iter().find(|candidate| candidate.to_string() == arch)
}

pub fn decompress_xz(asset: &str, data: &[u8]) -> Result<Vec<u8>, DownloadError> {
    let mut decompressed = Vec::new();
    lzma_rs::xz_decompress(&mut Cursor::new(data), &mut decompressed).map_err(|err| {
        DownloadError::Decompress {
            asset: asset.to_owned(),
            reason: err.to_string(),
        }
    })?;
    Ok(decompressed)
}

/// Download the gadget for every architecture if a newer frida release is out.
///
/// Returns whether anything was downloaded.
pub fn update_frida(cache: &mut Cache, source: &impl ReleaseSource) -> anyhow::Result<bool> {
    let release = source.latest_release(FRIDA_REPO)?;
    let all_archs: Vec<Architecture> = Architecture::iter().collect();
    if cache.version(FRIDA_KEY) == Some(release.tag_name.as_str())
        && cache.missing_gadgets(&all_archs).is_empty()
    {
        debug!("frida-gadget {} is up to date", release.tag_name);
        return Ok(false);
    }

    info!("Downloading frida-gadget {}...", release.tag_name);
    let mut downloaded = 0;
    for asset in &release.assets {
        let Some(arch) = gadget_asset_architecture(&asset.name) else {
            continue;
        };
        info!("Downloading {} frida-gadget...", arch);
        let data = source.fetch(&asset.browser_download_url)?;
        let gadget = decompress_xz(&asset.name, &data)?;
        let path = cache.gadget_path(arch);
        fs::write(&path, gadget).with_context(|| format!("Failed to write {}", path.display()))?;
        downloaded += 1;
    }

    if downloaded == 0 {
        return Err(DownloadError::MissingAsset {
            repo: FRIDA_REPO.into(),
            tag: release.tag_name,
            what: "android gadget",
        }
        .into());
    }

    cache.set_version(FRIDA_KEY, &release.tag_name)?;
    Ok(true)
}

/// Download the APKEditor jar if a newer release is out.
pub fn update_apkeditor(cache: &mut Cache, source: &impl ReleaseSource) -> anyhow::Result<bool> {
    let release = source.latest_release(APKEDITOR_REPO)?;
    if cache.version(APKEDITOR_KEY) == Some(release.tag_name.as_str())
        && cache.apkeditor_path().is_file()
    {
        debug!("APKEditor {} is up to date", release.tag_name);
        return Ok(false);
    }

    let asset = release
        .assets
        .iter()
        .find(|asset| asset.name.ends_with(".jar"))
        .ok_or_else(|| DownloadError::MissingAsset {
            repo: APKEDITOR_REPO.into(),
            tag: release.tag_name.clone(),
            what: "jar",
        })?;

    info!("Downloading APKEditor {}...", release.tag_name);
    let data = source.fetch(&asset.browser_download_url)?;
    let path = cache.apkeditor_path();
    fs::write(&path, data).with_context(|| format!("Failed to write {}", path.display()))?;

    cache.set_version(APKEDITOR_KEY, &release.tag_name)?;
    Ok(true)
}
