//! MediaCodec - Sound and Image Codec Library
//!
//! Decodes AU/WAV sounds and SGI images into owned host-order buffers,
//! encodes them back to AU, WAV, SGI or raw dumps, and reports every
//! outcome through one [`Status`] model.

pub mod config;
pub mod convert;
pub mod endian;
pub mod error;
pub mod format;
pub mod image;
pub mod io;
pub mod sound;

pub use config::{Args, Config};
pub use endian::Endianness;
pub use error::{Error, ErrorKind, Result, Status};
pub use format::{FileFormat, Media, MediaFamily, Target};
pub use image::{Image, ImageFormat, ImageInfo, ImageStorage, SgiStorage};
pub use sound::{Sound, SoundFormat, SoundInfo, SoundStorage};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// `RUST_LOG` still wins when set.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .try_init()
        .ok();
}

pub fn get_library_info() -> LibraryInfo {
    LibraryInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl std::fmt::Display for LibraryInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} v{} - {}", self.name, self.version, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_info() {
        let info = get_library_info();
        assert_eq!(info.name, "media-codec");
        assert!(info.to_string().starts_with("media-codec v"));
    }
}
