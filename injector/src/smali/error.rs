use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort an injection. Line numbers in messages are 1-based.
#[derive(Debug, Error)]
pub enum InjectionError {
    #[error("couldn't find a \"# direct methods\" section to inject a loadLibrary call into")]
    NoAnchor,
    #[error("failed to determine injection point in the constructor at line {}", .method_start + 1)]
    NoInjectionPoint { method_start: usize },
    #[error("couldn't find the end of the constructor starting at line {}", .method_start + 1)]
    NoMethodEnd { method_start: usize },
    #[error("loadLibrary(\"{library}\") is already present in this class")]
    AlreadyInjected { library: String },
    #[error("couldn't find smali containing entry activity ({entry_activity})")]
    SmaliNotFound { entry_activity: String },
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
