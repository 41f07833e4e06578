//! Smali injection engine
//!
//! Structural editing of a single disassembled class so that it calls
//! `System.loadLibrary` when initialized. The sub-modules follow the order the
//! engine runs in:
//!
//! - `buffer`: the class as an ordered line container with a single splice primitive
//! - `scanner`: anchor lookup and line classification with explicit annotation state
//! - `resolver`: partial vs. full mode and the exact insertion line
//! - `locals`: keeps the constructor's `.locals` count in step with the inserted code
//! - `injection`: ties the above together over an in-memory buffer
//! - `file`: locating the entry activity's smali and writing the result back
//!
//! # Example Usage
//!
//! ```no_run
//! use injector::smali::{find_smali, SmaliFile};
//! use std::path::Path;
//!
//! let path = find_smali(Path::new("/tmp/decoded"), "com.example.MainActivity")?;
//! let report = SmaliFile::patch(path, "libfrida.so")?;
//! println!("{:?}", report.mode);
//! # Ok::<(), injector::smali::InjectionError>(())
//! ```

pub mod buffer;
pub mod error;
pub mod file;
pub mod injection;
pub mod locals;
pub mod resolver;
pub mod scanner;
pub mod templates;

pub use buffer::LineBuffer;
pub use error::InjectionError;
pub use file::{find_smali, SmaliFile};
pub use injection::{bare_library_name, perform_injection, InjectionReport};
pub use locals::LocalsUpdate;
pub use resolver::{InjectionMode, InjectionPoint};
