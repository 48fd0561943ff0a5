//! Image entity and codecs
//!
//! An [`Image`] owns one row-major, top-to-bottom pixel buffer without
//! padding. 16-bit components are kept in host byte order.

pub mod sgi;

use std::io::{Read, Seek, Write};
use std::path::Path;

use log::debug;

use crate::endian::{self, Endianness};
use crate::error::{Error, Result};
use crate::format::{self, FileFormat, MediaFamily};
use crate::io;

pub use sgi::{write_sgi, SgiStorage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Gray8,
    GrayA8,
    Rgb8,
    Rgba8,
    Gray16,
    GrayA16,
    Rgb16,
    Rgba16,
}

impl ImageFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ImageFormat::Gray8 => "gray8",
            ImageFormat::GrayA8 => "graya8",
            ImageFormat::Rgb8 => "rgb8",
            ImageFormat::Rgba8 => "rgba8",
            ImageFormat::Gray16 => "gray16",
            ImageFormat::GrayA16 => "graya16",
            ImageFormat::Rgb16 => "rgb16",
            ImageFormat::Rgba16 => "rgba16",
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            ImageFormat::Gray8 | ImageFormat::Gray16 => 1,
            ImageFormat::GrayA8 | ImageFormat::GrayA16 => 2,
            ImageFormat::Rgb8 | ImageFormat::Rgb16 => 3,
            ImageFormat::Rgba8 | ImageFormat::Rgba16 => 4,
        }
    }

    pub fn bytes_per_component(&self) -> usize {
        match self {
            ImageFormat::Gray8 | ImageFormat::GrayA8 | ImageFormat::Rgb8 | ImageFormat::Rgba8 => 1,
            _ => 2,
        }
    }

    pub fn bits_per_component(&self) -> usize {
        self.bytes_per_component() * 8
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.channels() * self.bytes_per_component()
    }

    pub fn from_layout(channels: usize, bytes_per_component: usize) -> Option<Self> {
        match (channels, bytes_per_component) {
            (1, 1) => Some(ImageFormat::Gray8),
            (2, 1) => Some(ImageFormat::GrayA8),
            (3, 1) => Some(ImageFormat::Rgb8),
            (4, 1) => Some(ImageFormat::Rgba8),
            (1, 2) => Some(ImageFormat::Gray16),
            (2, 2) => Some(ImageFormat::GrayA16),
            (3, 2) => Some(ImageFormat::Rgb16),
            (4, 2) => Some(ImageFormat::Rgba16),
            _ => None,
        }
    }
}

/// Arrangement of pixel data in a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStorage {
    /// (r, g, b), (r, g, b)...
    Interleaved,
    /// (r, r, r...), (g, g, g...), (b, b, b...)
    Planar,
    SgiRle,
}

/// Header description of an image stream, without its pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: usize,
    /// `Image::load_raw` derives the height from the stream length when 0.
    pub height: usize,
    pub uncompressed_size: usize,
    pub endianness: Endianness,
    pub storage: ImageStorage,
    pub format: ImageFormat,
    pub data_offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: usize,
    height: usize,
    format: ImageFormat,
    data: Vec<u8>,
}

impl Image {
    pub fn new(format: ImageFormat, width: usize, height: usize) -> Result<Self> {
        let size = buffer_size(format, width, height, "Image::new")?;
        Self::from_data(format, width, height, vec![0u8; size])
    }

    /// Wrap row-major, host-order pixel bytes.
    pub fn from_data(
        format: ImageFormat,
        width: usize,
        height: usize,
        data: Vec<u8>,
    ) -> Result<Self> {
        let origin = "Image::from_data";
        if width == 0 || height == 0 {
            return Err(Error::invalid_argument(origin, format!("{}x{} image", width, height)));
        }

        let expected = buffer_size(format, width, height, origin)?;
        if data.len() != expected {
            return Err(Error::invalid_argument(
                origin,
                format!(
                    "{} bytes for a {}x{} {} image, expected {}",
                    data.len(),
                    width,
                    height,
                    format.name(),
                    expected
                ),
            ));
        }

        Ok(Self { width, height, format, data })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Buffer size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
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

    /// Component `channel` of pixel (`col`, `row`), widened to 16 bits.
    pub fn component(&self, col: usize, row: usize, channel: usize) -> Option<u16> {
        if col >= self.width || row >= self.height || channel >= self.format.channels() {
            return None;
        }
        let bpc = self.format.bytes_per_component();
        let at = ((row * self.width + col) * self.format.channels() + channel) * bpc;
        Some(match bpc {
            1 => self.data[at] as u16,
            _ => u16::from_ne_bytes([self.data[at], self.data[at + 1]]),
        })
    }

    pub(crate) fn set_component(&mut self, col: usize, row: usize, channel: usize, value: u16) {
        let bpc = self.format.bytes_per_component();
        let at = ((row * self.width + col) * self.format.channels() + channel) * bpc;
        match bpc {
            1 => self.data[at] = value as u8,
            _ => self.data[at..at + 2].copy_from_slice(&value.to_ne_bytes()),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = io::open(path, "Image::load")?;
        let image = Self::read_from(&mut reader)?;
        debug!("Loaded image '{}'", path.display());
        Ok(image)
    }

    /// Decode an image stream positioned anywhere; it is rewound first.
    pub fn read_from<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let info = inspect(reader)?;

        debug!(
            "{}x{} px, {} ({:?}, {} endian), data at 0x{:X}",
            info.width,
            info.height,
            info.format.name(),
            info.storage,
            info.endianness.name(),
            info.data_offset
        );

        sgi::read_pixels(reader, &info)
    }

    /// Decode pixels from the reader's current position as described by `info`.
    pub fn load_raw<R: Read + Seek>(reader: &mut R, info: &ImageInfo) -> Result<Self> {
        let origin = "Image::load_raw";
        if info.width == 0 {
            return Err(Error::invalid_argument(origin, "width cannot be 0"));
        }
        if info.storage == ImageStorage::SgiRle {
            return Err(Error::unsupported(origin, "rle storage outside an sgi stream"));
        }

        let format = info.format;
        let row_size = buffer_size(format, info.width, 1, origin)?;
        let position = io::position(reader, origin)?;

        let height = if info.height == 0 {
            let remaining = io::stream_len(reader, origin)?.saturating_sub(position);
            let rows = remaining as usize / row_size;
            if rows == 0 {
                return Err(Error::truncated(origin, "less than one row of pixel data"));
            }
            rows
        } else {
            info.height
        };
        let size = buffer_size(format, info.width, height, origin)?;
        io::ensure_available(reader, position, size as u64, origin, "pixel data")?;

        let mut stored = io::read_vec(reader, size, origin, "pixel data")?;
        let bpc = format.bytes_per_component();
        endian::convert_units(&mut stored, bpc, info.endianness, Endianness::NATIVE);

        let data = match info.storage {
            ImageStorage::Interleaved => stored,
            _ => interleave(&stored, format, info.width * height),
        };
        Self::from_data(format, info.width, height, data)
    }

    pub fn save_sgi<P: AsRef<Path>>(&self, path: P, storage: SgiStorage) -> Result<()> {
        sgi::check_encodable(self)?;
        io::save(path, "Image::save_sgi", |w| write_sgi(self, storage, w))
    }

    pub fn save_raw<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        io::save(path, "Image::save_raw", |w| write_raw(self, w))
    }
}

/// Read only the header of an image stream.
pub fn inspect<R: Read + Seek>(reader: &mut R) -> Result<ImageInfo> {
    match format::detect(reader, Some(MediaFamily::Image), "image::inspect")? {
        FileFormat::Sgi => sgi::read_info(reader),
        other => Err(Error::unknown_file_format(
            "image::inspect",
            format!("{} is not an image format", other.name()),
        )),
    }
}

/// Host-layout pixel dump, no header.
pub fn write_raw<W: Write>(image: &Image, writer: &mut W) -> Result<()> {
    io::write_all(writer, image.data(), "image::write_raw", "data")
}

fn buffer_size(format: ImageFormat, width: usize, height: usize, origin: &str) -> Result<usize> {
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(format.bytes_per_pixel()))
        .ok_or_else(|| Error::invalid_argument(origin, "image size overflows"))
}

fn interleave(planar: &[u8], format: ImageFormat, pixels: usize) -> Vec<u8> {
    let bpc = format.bytes_per_component();
    let channels = format.channels();
    let mut data = vec![0u8; planar.len()];

    for channel in 0..channels {
        for pixel in 0..pixels {
            let src = (channel * pixels + pixel) * bpc;
            let dst = (pixel * channels + channel) * bpc;
            data[dst..dst + bpc].copy_from_slice(&planar[src..src + bpc]);
        }
    }
    data
}
