//! Configuration management for batch conversion

use crate::error::{Error, Result};
use crate::format::{ImageTarget, SoundTarget};
use crate::image::SgiStorage;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub inputs: Vec<PathBuf>,
    pub output: OutputConfig,
    pub sgi: SgiConfig,
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub sound_targets: Vec<SoundTarget>,
    pub image_targets: Vec<ImageTarget>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SgiConfig {
    pub storage: SgiStorage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub workers: usize,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output: OutputConfig::default(),
            sgi: SgiConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("out"),
            sound_targets: vec![SoundTarget::Wav],
            image_targets: vec![ImageTarget::Sgi],
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: utils::recommended_workers(),
            verbose: false,
        }
    }
}

impl Config {
    /// Get output directory (convenience method)
    pub fn output_dir(&self) -> &Path {
        &self.output.directory
    }

    pub fn workers(&self) -> usize {
        self.processing.workers
    }

    pub fn verbose(&self) -> bool {
        self.processing.verbose
    }
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "media-convert",
    about = "Convert AU/WAV sounds and SGI images",
    version,
    author
)]
pub struct Args {
    #[arg(
        required_unless_present = "print_config",
        help = "Input files (format is detected from content)"
    )]
    pub inputs: Vec<PathBuf>,

    #[arg(short = 'o', long = "output-dir", help = "Directory receiving converted files")]
    pub output_dir: Option<PathBuf>,

    #[arg(
        short = 's',
        long = "sound-target",
        value_enum,
        value_delimiter = ',',
        help = "Encodings written for sound inputs"
    )]
    pub sound_targets: Vec<SoundTarget>,

    #[arg(
        short = 'i',
        long = "image-target",
        value_enum,
        value_delimiter = ',',
        help = "Encodings written for image inputs"
    )]
    pub image_targets: Vec<ImageTarget>,

    #[arg(long = "sgi-storage", value_enum, help = "Pixel storage of written SGI files")]
    pub sgi_storage: Option<SgiStorage>,

    #[arg(short = 'j', long = "workers", help = "Number of files converted in parallel")]
    pub workers: Option<usize>,

    #[arg(short = 'v', long = "verbose", help = "Enable verbose output mode")]
    pub verbose: bool,

    #[arg(short = 'c', long = "config", help = "Config file path (TOML format)")]
    pub config_file: Option<PathBuf>,

    #[arg(long = "print-config", help = "Print the effective configuration as TOML and exit")]
    pub print_config: bool,
}

impl Config {
    /// Create config from command line arguments and config file
    pub fn from_args_and_config(args: Args) -> Result<Self> {
        let mut config = if let Some(config_path) = &args.config_file {
            Self::from_file(config_path)?
        } else {
            Self::default()
        };

        // Flags given on the command line override the file
        if !args.inputs.is_empty() {
            config.inputs = args.inputs;
        }
        if let Some(dir) = args.output_dir {
            config.output.directory = dir;
        }
        if !args.sound_targets.is_empty() {
            config.output.sound_targets = args.sound_targets;
        }
        if !args.image_targets.is_empty() {
            config.output.image_targets = args.image_targets;
        }
        if let Some(storage) = args.sgi_storage {
            config.sgi.storage = storage;
        }
        if let Some(workers) = args.workers {
            config.processing.workers = workers;
        }
        config.processing.verbose |= args.verbose;

        config.validate()?;

        Ok(config)
    }

    /// Load config from TOML config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let origin = "Config::from_file";
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::filesystem(origin, format!("failed to read '{}': {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            Error::invalid_argument(origin, format!("failed to parse '{}': {}", path.display(), e))
        })
    }

    /// Validate configuration parameter validity
    pub fn validate(&self) -> Result<()> {
        let origin = "Config::validate";

        if self.output.directory.as_os_str().is_empty() {
            return Err(Error::invalid_argument(origin, "output directory cannot be empty"));
        }
        if self.output.sound_targets.is_empty() && self.output.image_targets.is_empty() {
            return Err(Error::invalid_argument(origin, "no output targets"));
        }
        let output = &self.output;
        if has_duplicates(&output.sound_targets) || has_duplicates(&output.image_targets) {
            return Err(Error::invalid_argument(origin, "output targets listed twice"));
        }

        if self.processing.workers == 0 {
            return Err(Error::invalid_argument(origin, "worker count must be greater than 0"));
        }
        if self.processing.workers > utils::cpu_count() * 2 {
            return Err(Error::invalid_argument(
                origin,
                "worker count cannot exceed 2x logical CPU cores",
            ));
        }

        // Every input writes <stem>.<ext> into the same directory
        let mut stems = HashSet::new();
        for input in &self.inputs {
            let stem = input.file_stem().ok_or_else(|| {
                Error::invalid_argument(origin, format!("'{}' has no file name", input.display()))
            })?;
            if !stems.insert(stem.to_os_string()) {
                return Err(Error::invalid_argument(
                    origin,
                    format!("more than one input named '{}'", stem.to_string_lossy()),
                ));
            }
        }

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            Error::invalid_argument("Config::to_toml", format!("failed to serialize config: {}", e))
        })
    }

    /// Save config to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| {
            Error::filesystem("Config::save_to_file", format!("failed to write config file: {}", e))
        })
    }
}

fn has_duplicates<T: Eq + std::hash::Hash>(items: &[T]) -> bool {
    let mut seen = HashSet::new();
    !items.iter().all(|item| seen.insert(item))
}

pub mod utils {
    pub fn cpu_count() -> usize {
        num_cpus::get()
    }

    /// One worker per physical core, at least one
    pub fn recommended_workers() -> usize {
        num_cpus::get_physical().clamp(1, cpu_count().max(1))
    }
}
