use std::{env, path::PathBuf};

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use strum::IntoEnumIterator as _;
use tracing::Level;

use injector::{
    cache::Cache,
    options::{RawOptions, DEFAULT_LIBRARY_NAME, DEFAULT_SCRIPT_NAME},
    patch_apk,
    types::{Architecture, ConfigType, Stage, StageProgress},
};

/// Inject frida-gadget into an Android package
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Target APK file, or a directory holding split APKs
    #[arg(short, long)]
    input: PathBuf,

    /// Output APK file [default: <input>.patched.apk in the current directory]
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Target architecture(s) for frida-gadget [default: all]
    #[arg(short, long, value_enum, num_args = 1..)]
    architectures: Vec<Architecture>,

    /// Built-in gadget config
    #[arg(short = 't', long, value_enum)]
    config_type: Option<ConfigType>,

    /// Custom gadget config
    #[arg(short, long)]
    config_path: Option<PathBuf>,

    /// Script for the "script" interaction type
    #[arg(short = 'l', long)]
    script_path: Option<PathBuf>,

    /// Gadget library name, must start with "lib" and end with ".so"
    #[arg(short = 'n', long, default_value = DEFAULT_LIBRARY_NAME)]
    library_name: String,

    /// Script file name inside the package, must start with "lib" and end with ".so"
    #[arg(short, long, default_value = DEFAULT_SCRIPT_NAME)]
    script_name: String,

    /// Where the temporary working directory is created [default: system temp]
    #[arg(short = 'r', long)]
    temp_root_path: Option<PathBuf>,

    /// Keep the temporary directory (useful for debugging)
    #[arg(long)]
    no_cleanup: bool,

    /// Cache holding gadget binaries, APKEditor and the debug key [default: ~/.fgi]
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Don't check GitHub for new frida-gadget and APKEditor releases
    #[arg(long)]
    offline_mode: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .init();

    let architectures = if args.architectures.is_empty() {
        Architecture::iter().collect()
    } else {
        args.architectures
    };

    let options = RawOptions {
        input: args.input,
        out: args.out,
        architectures,
        config_type: args.config_type,
        config_path: args.config_path,
        script_path: args.script_path,
        library_name: args.library_name,
        script_name: args.script_name,
        temp_root: args.temp_root_path.unwrap_or_else(env::temp_dir),
        no_cleanup: args.no_cleanup,
        offline: args.offline_mode,
    }
    .validate(&env::current_dir()?)?;

    let cache_home = match args.cache_dir {
        Some(dir) => dir,
        None => Cache::default_home()?,
    };
    let mut cache = Cache::open(cache_home)?;

    let bar = ProgressBar::new(Stage::iter().count() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let result = patch_apk(&options, &mut cache, |event| match event.progress {
        StageProgress::Started => bar.set_message(event.stage.as_str()),
        StageProgress::Done | StageProgress::Skipped => bar.inc(1),
    });
    bar.finish_and_clear();

    result.map(drop)
}
