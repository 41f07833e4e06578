use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

/// CPU architectures a gadget can be installed for.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Deserialize,
    Serialize,
    Display,
    EnumIter,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Architecture {
    Arm,
    Arm64,
    X86,
    #[value(name = "x86_64")]
    #[strum(serialize = "x86_64")]
    #[serde(rename = "x86_64")]
    X86_64,
}

impl Architecture {
    /// Directory name under `lib/` inside the package.
    pub fn abi(&self) -> &'static str {
        match self {
            Architecture::Arm => "armeabi-v7a",
            Architecture::Arm64 => "arm64-v8a",
            Architecture::X86 => "x86",
            Architecture::X86_64 => "x86_64",
        }
    }
}

/// Built-in gadget interaction modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Display, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConfigType {
    Listen,
    Connect,
    Script,
}

#[derive(Debug)]
pub struct PatchingEvent {
    pub stage: Stage,
    pub progress: StageProgress,
}

impl PatchingEvent {
    pub fn done(stage: Stage) -> Self {
        PatchingEvent {
            stage,
            progress: StageProgress::Done,
        }
    }

    pub fn skipped(stage: Stage) -> Self {
        PatchingEvent {
            stage,
            progress: StageProgress::Skipped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Stage {
    UpdatingCache,
    CheckingCache,
    MergingSplits,
    Decoding,
    LocatingEntryActivity,
    InjectingSmali,
    CopyingPayloads,
    PatchingManifest,
    Building,
    Aligning,
    Signing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::UpdatingCache => "Updating Cache",
            Stage::CheckingCache => "Checking Cache",
            Stage::MergingSplits => "Merging Split APKs",
            Stage::Decoding => "Decoding APK",
            Stage::LocatingEntryActivity => "Locating Entry Activity",
            Stage::InjectingSmali => "Injecting loadLibrary",
            Stage::CopyingPayloads => "Copying Payloads",
            Stage::PatchingManifest => "Patching Manifest",
            Stage::Building => "Building APK",
            Stage::Aligning => "Zipaligning APK",
            Stage::Signing => "Signing APK",
        }
    }
}

impl From<Stage> for PatchingEvent {
    fn from(value: Stage) -> Self {
        PatchingEvent {
            stage: value,
            progress: StageProgress::Started,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageProgress {
    Started,
    Skipped,
    Done,
}
