//! Sound entity and codecs
//!
//! A [`Sound`] owns one interleaved sample buffer in host byte order. AU and
//! WAV streams are decoded into it; AU, WAV and raw dumps are encoded from it.

pub mod au;
pub mod g711;
pub mod wav;

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;

use crate::endian::{self, Endianness};
use crate::error::{Error, Result};
use crate::format::{self, FileFormat, MediaFamily};
use crate::io;

pub use au::write_au;
pub use wav::write_wav;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundFormat {
    I8,
    I16,
    I32,
    F32,
    F64,
}

impl SoundFormat {
    pub fn name(&self) -> &'static str {
        match self {
            SoundFormat::I8 => "int8",
            SoundFormat::I16 => "int16",
            SoundFormat::I32 => "int32",
            SoundFormat::F32 => "float32",
            SoundFormat::F64 => "float64",
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SoundFormat::I8 => 1,
            SoundFormat::I16 => 2,
            SoundFormat::I32 | SoundFormat::F32 => 4,
            SoundFormat::F64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, SoundFormat::F32 | SoundFormat::F64)
    }
}

/// How samples are stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundStorage {
    Uncompressed,
    ALaw,
    ULaw,
}

/// Header description of a sound stream, without its samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundInfo {
    pub frequency: usize,
    pub channels: usize,
    /// In frames. `Sound::load_raw` reads to the end of the stream when 0.
    pub length: usize,
    /// Decoded byte size
    pub uncompressed_size: usize,
    pub minimum_unit_size: usize,
    pub endianness: Endianness,
    pub storage: SoundStorage,
    pub format: SoundFormat,
    pub unsigned_8bit: bool,
    pub unspecified_size: bool,
    pub data_offset: u64,
}

impl SoundInfo {
    /// Bytes one stored sample occupies in the stream.
    pub fn stored_sample_size(&self) -> usize {
        match self.storage {
            SoundStorage::Uncompressed => self.format.bytes_per_sample(),
            SoundStorage::ALaw | SoundStorage::ULaw => 1,
        }
    }

    /// Saturates; [`SoundInfo::validate`] rejects channel counts that overflow.
    pub fn stored_frame_size(&self) -> usize {
        self.stored_sample_size().saturating_mul(self.channels)
    }

    pub fn validate(&self, origin: &str) -> Result<()> {
        if self.frequency == 0 {
            return Err(Error::invalid_argument(origin, "frequency cannot be 0"));
        }
        if self.channels == 0 {
            return Err(Error::invalid_argument(origin, "channel count cannot be 0"));
        }
        if self.stored_sample_size().checked_mul(self.channels).is_none() {
            return Err(Error::invalid_argument(origin, "frame size overflows"));
        }
        if self.storage != SoundStorage::Uncompressed && self.format != SoundFormat::I16 {
            return Err(Error::invalid_argument(origin, "companded storage decodes to int16 only"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sound {
    frequency: usize,
    channels: usize,
    length: usize,
    format: SoundFormat,
    data: Vec<u8>,
}

impl Sound {
    /// Silent sound of `length` frames.
    pub fn new(
        format: SoundFormat,
        length: usize,
        channels: usize,
        frequency: usize,
    ) -> Result<Self> {
        let size = buffer_size(format, length, channels, "Sound::new")?;
        Self::from_data(format, channels, frequency, vec![0u8; size])
    }

    /// Wrap interleaved, host-order sample bytes.
    pub fn from_data(
        format: SoundFormat,
        channels: usize,
        frequency: usize,
        data: Vec<u8>,
    ) -> Result<Self> {
        if frequency == 0 {
            return Err(Error::invalid_argument("Sound::from_data", "frequency cannot be 0"));
        }
        if channels == 0 {
            return Err(Error::invalid_argument("Sound::from_data", "channel count cannot be 0"));
        }

        let frame_size = buffer_size(format, 1, channels, "Sound::from_data")?;
        if data.len() % frame_size != 0 {
            return Err(Error::invalid_argument(
                "Sound::from_data",
                format!("{} bytes is not a whole number of {}-byte frames", data.len(), frame_size),
            ));
        }

        Ok(Self { frequency, channels, length: data.len() / frame_size, format, data })
    }

    pub fn frequency(&self) -> usize {
        self.frequency
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Frame count
    pub fn length(&self) -> usize {
        self.length
    }

    /// Buffer size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn format(&self) -> SoundFormat {
        self.format
    }

    pub fn duration(&self) -> f64 {
        self.length as f64 / self.frequency as f64
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = io::open(path, "Sound::load")?;
        let sound = Self::read_from(&mut reader)?;
        debug!("Loaded sound '{}'", path.display());
        Ok(sound)
    }

    /// Decode an AU or WAV stream positioned anywhere; it is rewound first.
    pub fn read_from<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let info = inspect(reader)?;
        let origin = "Sound::read_from";

        debug!(
            "{} Hz, {} channels, {} frames, {} ({:?}, {} endian), data at 0x{:X}",
            info.frequency,
            info.channels,
            info.length,
            info.format.name(),
            info.storage,
            info.endianness.name(),
            info.data_offset
        );

        let stored = (info.length * info.stored_frame_size()) as u64;
        io::ensure_available(reader, info.data_offset, stored, origin, "sample data")?;
        io::seek(reader, SeekFrom::Start(info.data_offset), origin, "data seek")?;

        let data = read_samples(reader, &info, info.length, origin)?;
        Ok(Self {
            frequency: info.frequency,
            channels: info.channels,
            length: info.length,
            format: info.format,
            data,
        })
    }

    /// Decode samples from the reader's current position as described by `info`.
    pub fn load_raw<R: Read + Seek>(reader: &mut R, info: &SoundInfo) -> Result<Self> {
        let origin = "Sound::load_raw";
        info.validate(origin)?;

        let position = io::position(reader, origin)?;
        let length = if info.length == 0 {
            let remaining = io::stream_len(reader, origin)?.saturating_sub(position);
            remaining as usize / info.stored_frame_size()
        } else {
            let stored = info.length.saturating_mul(info.stored_frame_size()) as u64;
            io::ensure_available(reader, position, stored, origin, "sample data")?;
            info.length
        };

        let data = read_samples(reader, info, length, origin)?;
        Ok(Self {
            frequency: info.frequency,
            channels: info.channels,
            length,
            format: info.format,
            data,
        })
    }

    pub fn save_au<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        au::check_encodable(self)?;
        io::save(path, "Sound::save_au", |w| write_au(self, w))
    }

    pub fn save_wav<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        wav::check_encodable(self)?;
        io::save(path, "Sound::save_wav", |w| write_wav(self, w))
    }

    pub fn save_raw<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        io::save(path, "Sound::save_raw", |w| write_raw(self, w))
    }
}

/// Read only the header of an AU or WAV stream.
pub fn inspect<R: Read + Seek>(reader: &mut R) -> Result<SoundInfo> {
    match format::detect(reader, Some(MediaFamily::Sound), "sound::inspect")? {
        FileFormat::Au => au::read_info(reader),
        FileFormat::Wav => wav::read_info(reader),
        other => Err(Error::unknown_file_format(
            "sound::inspect",
            format!("{} is not a sound format", other.name()),
        )),
    }
}

/// Host-order sample dump, no header.
pub fn write_raw<W: Write>(sound: &Sound, writer: &mut W) -> Result<()> {
    io::write_all(writer, sound.data(), "sound::write_raw", "data")
}

fn buffer_size(format: SoundFormat, length: usize, channels: usize, origin: &str) -> Result<usize> {
    length
        .checked_mul(channels)
        .and_then(|n| n.checked_mul(format.bytes_per_sample()))
        .ok_or_else(|| Error::invalid_argument(origin, "sound size overflows"))
}

fn read_samples<R: Read>(
    reader: &mut R,
    info: &SoundInfo,
    length: usize,
    origin: &str,
) -> Result<Vec<u8>> {
    let samples = length
        .checked_mul(info.channels)
        .ok_or_else(|| Error::invalid_argument(origin, "sound size overflows"))?;
    buffer_size(info.format, length, info.channels, origin)?;

    match info.storage {
        SoundStorage::Uncompressed => {
            let bps = info.format.bytes_per_sample();
            let mut data = io::read_vec(reader, samples * bps, origin, "sample data")?;

            if info.format == SoundFormat::I8 {
                if info.unsigned_8bit {
                    for byte in data.iter_mut() {
                        *byte ^= 0x80;
                    }
                }
            } else {
                endian::convert_units(&mut data, bps, info.endianness, Endianness::NATIVE);
            }
            Ok(data)
        }
        SoundStorage::ALaw | SoundStorage::ULaw => {
            let compressed = io::read_vec(reader, samples, origin, "companded data")?;
            let expand: fn(u8) -> i16 = match info.storage {
                SoundStorage::ALaw => g711::alaw_to_i16,
                _ => g711::ulaw_to_i16,
            };

            Ok(compressed.into_iter().flat_map(|c| expand(c).to_ne_bytes()).collect())
        }
    }
}
