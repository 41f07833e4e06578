//! Frida gadget injection for Android packages
//!
//! The heart of the crate is [`smali`], a structural editor that makes an entry
//! activity call `System.loadLibrary` on initialization. The remaining modules drive
//! the external tooling around it:
//!
//! - `apk`: APKEditor, zipalign, keytool and apksigner invocations
//! - `cache`: the local store of gadget binaries, APKEditor and the debug key
//! - `downloader`: keeps the cache on the latest frida-gadget and APKEditor releases
//! - `gadget`: gadget config generation and per-architecture payload copy
//! - `manifest`: the `extractNativeLibs` fix
//! - `options`: validated run settings
//! - `pipeline`: the end-to-end patch

pub mod apk;
pub mod cache;
pub mod cmd;
pub mod downloader;
pub mod gadget;
pub mod manifest;
pub mod options;
pub mod pipeline;
pub mod smali;
pub mod types;

pub use pipeline::patch_apk;
pub use smali::{find_smali, perform_injection, InjectionError, InjectionReport, SmaliFile};
