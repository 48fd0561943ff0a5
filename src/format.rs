//! Format detection and dispatch
//!
//! Files are recognised by their leading bytes, never by extension. The
//! signature table is checked in order and the first match wins.

use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::image::{self, sgi, Image, SgiStorage};
use crate::io;
use crate::sound::{self, au, wav, Sound};

/// Bytes read from the start of a stream for detection
pub const PROBE_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaFamily {
    Sound,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Au,
    Wav,
    Sgi,
}

impl FileFormat {
    pub fn name(&self) -> &'static str {
        match self {
            FileFormat::Au => "au",
            FileFormat::Wav => "wav",
            FileFormat::Sgi => "sgi",
        }
    }

    pub fn family(&self) -> MediaFamily {
        match self {
            FileFormat::Au | FileFormat::Wav => MediaFamily::Sound,
            FileFormat::Sgi => MediaFamily::Image,
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const SIGNATURES: &[(FileFormat, fn(&[u8]) -> bool)] = &[
    (FileFormat::Au, au::is_au),
    (FileFormat::Wav, wav::is_wav),
    (FileFormat::Sgi, sgi::is_sgi),
];

/// Match the leading bytes of a stream against the known signatures.
pub fn sniff(probe: &[u8]) -> Option<FileFormat> {
    SIGNATURES.iter().find(|(_, matches)| matches(probe)).map(|(format, _)| *format)
}

/// Sniff a stream from its start and rewind it for the decoder.
pub(crate) fn detect<R: Read + Seek>(
    reader: &mut R,
    family: Option<MediaFamily>,
    origin: &str,
) -> Result<FileFormat> {
    let mut probe = [0u8; PROBE_LEN];
    io::seek(reader, SeekFrom::Start(0), origin, "probe seek")?;
    let read = io::read_up_to(reader, &mut probe, origin, "near magic")?;
    io::seek(reader, SeekFrom::Start(0), origin, "probe seek")?;

    if read == 0 {
        return Err(Error::truncated(origin, "near magic"));
    }

    let format = sniff(&probe[..read])
        .ok_or_else(|| Error::unknown_file_format(origin, "no known signature"))?;
    match family {
        Some(family) if family != format.family() => {
            let kind = if family == MediaFamily::Sound { "a sound" } else { "an image" };
            Err(Error::unknown_file_format(origin, format!("{} is not {} format", format, kind)))
        }
        _ => Ok(format),
    }
}

/// A decoded file of either family
#[derive(Debug, Clone, PartialEq)]
pub enum Media {
    Sound(Sound),
    Image(Image),
}

impl Media {
    pub fn family(&self) -> MediaFamily {
        match self {
            Media::Sound(_) => MediaFamily::Sound,
            Media::Image(_) => MediaFamily::Image,
        }
    }
}

/// Output encodings a sound can be written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SoundTarget {
    Au,
    Wav,
    Raw,
}

/// Output encodings an image can be written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ImageTarget {
    Sgi,
    Raw,
}

/// An encoder selection for [`save`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Au,
    Wav,
    Sgi(SgiStorage),
    /// Buffer dump of either family
    Raw,
}

impl Target {
    pub fn extension(&self) -> &'static str {
        match self {
            Target::Au => "au",
            Target::Wav => "wav",
            Target::Sgi(_) => "sgi",
            Target::Raw => "data",
        }
    }
}

impl From<SoundTarget> for Target {
    fn from(target: SoundTarget) -> Self {
        match target {
            SoundTarget::Au => Target::Au,
            SoundTarget::Wav => Target::Wav,
            SoundTarget::Raw => Target::Raw,
        }
    }
}

impl ImageTarget {
    pub fn with_storage(self, storage: SgiStorage) -> Target {
        match self {
            ImageTarget::Sgi => Target::Sgi(storage),
            ImageTarget::Raw => Target::Raw,
        }
    }
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<Media> {
    let path = path.as_ref();
    let mut reader = io::open(path, "format::load")?;
    let media = read_from(&mut reader)?;
    debug!("Loaded {:?} from '{}'", media.family(), path.display());
    Ok(media)
}

pub fn read_from<R: Read + Seek>(reader: &mut R) -> Result<Media> {
    match detect(reader, None, "format::load")?.family() {
        MediaFamily::Sound => Ok(Media::Sound(Sound::read_from(reader)?)),
        MediaFamily::Image => Ok(Media::Image(Image::read_from(reader)?)),
    }
}

pub fn save<P: AsRef<Path>>(media: &Media, path: P, target: Target) -> Result<()> {
    match (media, target) {
        (Media::Sound(s), Target::Au) => s.save_au(path),
        (Media::Sound(s), Target::Wav) => s.save_wav(path),
        (Media::Sound(s), Target::Raw) => s.save_raw(path),
        (Media::Image(i), Target::Sgi(storage)) => i.save_sgi(path, storage),
        (Media::Image(i), Target::Raw) => i.save_raw(path),
        (media, target) => Err(Error::invalid_argument(
            "format::save",
            format!("cannot write a {:?} as {}", media.family(), target.extension()),
        )),
    }
}

/// Encode into memory, for callers that do not write files.
pub fn encode(media: &Media, target: Target) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match (media, target) {
        (Media::Sound(s), Target::Au) => sound::write_au(s, &mut out)?,
        (Media::Sound(s), Target::Wav) => sound::write_wav(s, &mut out)?,
        (Media::Sound(s), Target::Raw) => sound::write_raw(s, &mut out)?,
        (Media::Image(i), Target::Sgi(storage)) => image::write_sgi(i, storage, &mut out)?,
        (Media::Image(i), Target::Raw) => image::write_raw(i, &mut out)?,
        (media, target) => {
            return Err(Error::invalid_argument(
                "format::encode",
                format!("cannot write a {:?} as {}", media.family(), target.extension()),
            ));
        }
    }
    Ok(out)
}
