//! SGI image format
//!
//! 512-byte big-endian header followed by planar scanlines stored bottom-up,
//! either verbatim or run-length encoded through offset/length tables.

use std::io::{Read, Seek, SeekFrom, Write};

use serde::{Deserialize, Serialize};

use crate::endian::{self, Endianness};
use crate::error::{Error, Result};
use crate::io;

use super::{Image, ImageFormat, ImageInfo, ImageStorage};

pub const MAGIC: u16 = 474;
pub const HEADER_LEN: usize = 512;

const STORAGE_VERBATIM: u8 = 0;
const STORAGE_RLE: u8 = 1;

/// Longest run a single count word can describe.
const MAX_RUN: usize = 0x7F;
const LITERAL_FLAG: u16 = 0x80;

const DECODE: &str = "sgi::decode";
const ENCODE: &str = "sgi::encode";

/// Pixel storage used when writing SGI files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SgiStorage {
    #[default]
    Uncompressed,
    Rle,
}

pub fn is_sgi(probe: &[u8]) -> bool {
    probe.len() >= 2 && u16::from_be_bytes([probe[0], probe[1]]) == MAGIC
}

fn be_u16(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

pub(crate) fn read_info<R: Read + Seek>(reader: &mut R) -> Result<ImageInfo> {
    let head: [u8; HEADER_LEN] = io::read_array(reader, DECODE, "near head")?;

    if !is_sgi(&head) {
        return Err(Error::unknown_file_format(DECODE, "bad magic"));
    }

    let storage = head[2];
    let precision = head[3];
    let dimension = be_u16(&head[4..6]);
    let width = be_u16(&head[6..8]) as usize;
    let mut height = be_u16(&head[8..10]) as usize;
    let mut channels = be_u16(&head[10..12]) as usize;
    let colormap = be_u32(&head[104..108]);

    let storage = match storage {
        STORAGE_VERBATIM => ImageStorage::Planar,
        STORAGE_RLE => ImageStorage::SgiRle,
        other => return Err(Error::unknown_data_format(DECODE, format!("storage ({})", other))),
    };

    match colormap {
        0 => {}
        1 => return Err(Error::obsolete(DECODE, "dithered image")),
        2 => return Err(Error::obsolete(DECODE, "indexed image")),
        3 => return Err(Error::obsolete(DECODE, "palette data")),
        other => return Err(Error::unknown_data_format(DECODE, format!("colormap ({})", other))),
    }

    match dimension {
        1 => {
            height = 1;
            channels = 1;
        }
        2 => channels = 1,
        3 => {}
        other => return Err(Error::unknown_data_format(DECODE, format!("dimension ({})", other))),
    }

    if width == 0 || height == 0 || channels == 0 {
        return Err(Error::unexpected(
            DECODE,
            format!("{}x{} px with {} channels", width, height, channels),
        ));
    }
    if channels > 4 {
        return Err(Error::unsupported(DECODE, format!("number of channels ({})", channels)));
    }

    let format = match precision {
        1 | 2 => ImageFormat::from_layout(channels, precision as usize).ok_or_else(|| {
            Error::unsupported(DECODE, format!("number of channels ({})", channels))
        })?,
        other => return Err(Error::unsupported(DECODE, format!("precision ({})", other))),
    };

    let uncompressed_size = width
        .checked_mul(height)
        .and_then(|pixels| pixels.checked_mul(format.bytes_per_pixel()))
        .ok_or_else(|| Error::unsupported(DECODE, "image size exceeds the address space"))?;

    Ok(ImageInfo {
        width,
        height,
        uncompressed_size,
        endianness: Endianness::Big,
        storage,
        format,
        data_offset: HEADER_LEN as u64,
    })
}

pub(crate) fn read_pixels<R: Read + Seek>(reader: &mut R, info: &ImageInfo) -> Result<Image> {
    // every declared span is checked against the stream before the pixel buffer exists
    match info.storage {
        ImageStorage::SgiRle => {
            let scanlines = read_scanline_table(reader, info)?;
            let mut image = Image::new(info.format, info.width, info.height)?;
            read_rle(reader, info, &scanlines, &mut image)?;
            Ok(image)
        }
        _ => {
            let size = info.uncompressed_size as u64;
            io::ensure_available(reader, info.data_offset, size, DECODE, "uncompressed data")?;
            let mut image = Image::new(info.format, info.width, info.height)?;
            read_verbatim(reader, info, &mut image)?;
            Ok(image)
        }
    }
}

fn read_verbatim<R: Read + Seek>(
    reader: &mut R,
    info: &ImageInfo,
    image: &mut Image,
) -> Result<()> {
    let bpc = info.format.bytes_per_component();
    io::seek(reader, SeekFrom::Start(info.data_offset), DECODE, "at data seek")?;
    let mut planes =
        io::read_vec(reader, info.uncompressed_size, DECODE, "reading uncompressed data")?;
    endian::convert_units(&mut planes, bpc, Endianness::Big, Endianness::NATIVE);

    let mut units = planes.chunks_exact(bpc);
    for channel in 0..info.format.channels() {
        for scanline in 0..info.height {
            let row = info.height - 1 - scanline;
            for col in 0..info.width {
                let value = match units.next() {
                    Some([byte]) => *byte as u16,
                    Some(pair) => u16::from_ne_bytes([pair[0], pair[1]]),
                    None => return Err(Error::truncated(DECODE, "reading uncompressed data")),
                };
                image.set_component(col, row, channel, value);
            }
        }
    }
    Ok(())
}

/// Offset and length of every packed scanline, channel-major. Each span
/// must lie inside the stream and be long enough to describe `width` values.
fn read_scanline_table<R: Read + Seek>(
    reader: &mut R,
    info: &ImageInfo,
) -> Result<Vec<(u64, usize)>> {
    let table_len = info.height * info.format.channels();

    let table_size = table_len as u64 * 8;
    io::ensure_available(reader, info.data_offset, table_size, DECODE, "scanline tables")?;
    let total = io::stream_len(reader, DECODE)?;
    io::seek(reader, SeekFrom::Start(info.data_offset), DECODE, "at data seek")?;
    let tables = io::read_vec(reader, table_len * 8, DECODE, "at scanline tables")?;
    let (offsets, lengths) = tables.split_at(table_len * 4);

    // a repeat word pair is the densest encoding
    let shortest = info.width.div_ceil(MAX_RUN) * 2 * info.format.bytes_per_component();

    offsets
        .chunks_exact(4)
        .zip(lengths.chunks_exact(4))
        .map(|(offset, length)| {
            let offset = be_u32(offset) as u64;
            let length = be_u32(length) as usize;
            io::check_span(total, offset, length as u64, DECODE, "rle scanline")?;
            if length < shortest {
                return Err(Error::unexpected(
                    DECODE,
                    format!("rle scanline of {} bytes cannot hold {} px", length, info.width),
                ));
            }
            Ok((offset, length))
        })
        .collect()
}

fn read_rle<R: Read + Seek>(
    reader: &mut R,
    info: &ImageInfo,
    scanlines: &[(u64, usize)],
    image: &mut Image,
) -> Result<()> {
    let bpc = info.format.bytes_per_component();

    let mut line = Vec::with_capacity(info.width);
    for channel in 0..info.format.channels() {
        for scanline in 0..info.height {
            let (offset, length) = scanlines[channel * info.height + scanline];

            io::seek(reader, SeekFrom::Start(offset), DECODE, "rle scanline seek")?;
            let packed = io::read_vec(reader, length, DECODE, "reading compressed data")?;

            expand_scanline(&packed, bpc, info.width, &mut line)?;

            let row = info.height - 1 - scanline;
            for (col, value) in line.iter().enumerate() {
                image.set_component(col, row, channel, *value);
            }
        }
    }
    Ok(())
}

/// Expand one packed scanline of `bpc`-byte words into exactly `width` values.
fn expand_scanline(packed: &[u8], bpc: usize, width: usize, out: &mut Vec<u16>) -> Result<()> {
    out.clear();
    let mut words = packed
        .chunks_exact(bpc)
        .map(|w| if bpc == 1 { w[0] as u16 } else { be_u16(w) });

    while let Some(word) = words.next() {
        let count = (word & 0x7F) as usize;
        if count == 0 {
            break;
        }
        if out.len() + count > width {
            return Err(Error::unexpected(DECODE, "rle run overruns the scanline"));
        }

        if word & LITERAL_FLAG != 0 {
            for _ in 0..count {
                let value = words
                    .next()
                    .ok_or_else(|| Error::unexpected(DECODE, "rle literal run ends short"))?;
                out.push(value);
            }
        } else {
            let value = words
                .next()
                .ok_or_else(|| Error::unexpected(DECODE, "rle repeat without value"))?;
            out.extend(std::iter::repeat(value).take(count));
        }
    }

    if out.len() != width {
        return Err(Error::unexpected(
            DECODE,
            format!("rle scanline of {} px, expected {}", out.len(), width),
        ));
    }
    Ok(())
}

/// Pack one scanline: literal spans until three equal values start a
/// maximal repeat, both split at `MAX_RUN`. Ends with a zero count.
fn compact(values: &[u16]) -> Vec<u16> {
    let mut out = Vec::with_capacity(values.len() + values.len() / MAX_RUN + 2);
    let starts_run = |i: usize| {
        i + 2 < values.len() && values[i] == values[i + 1] && values[i + 1] == values[i + 2]
    };

    let mut i = 0;
    while i < values.len() {
        let literal_start = i;
        while i < values.len() && !starts_run(i) {
            i += 1;
        }
        for span in values[literal_start..i].chunks(MAX_RUN) {
            out.push(LITERAL_FLAG | span.len() as u16);
            out.extend_from_slice(span);
        }

        if i < values.len() {
            let value = values[i];
            let run_start = i;
            while i < values.len() && values[i] == value {
                i += 1;
            }
            let mut run = i - run_start;
            while run > 0 {
                let take = run.min(MAX_RUN);
                out.push(take as u16);
                out.push(value);
                run -= take;
            }
        }
    }

    out.push(0);
    out
}

pub(crate) fn check_encodable(image: &Image) -> Result<()> {
    if image.width() > u16::MAX as usize || image.height() > u16::MAX as usize {
        return Err(Error::unsupported(
            ENCODE,
            format!("{}x{} px exceeds 16-bit dimensions", image.width(), image.height()),
        ));
    }
    Ok(())
}

fn header(image: &Image, storage: SgiStorage) -> [u8; HEADER_LEN] {
    let format = image.format();
    let pixmax: u32 = if format.bytes_per_component() == 1 { 0xFF } else { 0xFFFF };

    let mut head = [0u8; HEADER_LEN];
    head[0..2].copy_from_slice(&MAGIC.to_be_bytes());
    head[2] = match storage {
        SgiStorage::Uncompressed => STORAGE_VERBATIM,
        SgiStorage::Rle => STORAGE_RLE,
    };
    head[3] = format.bytes_per_component() as u8;
    head[4..6].copy_from_slice(&3u16.to_be_bytes());
    head[6..8].copy_from_slice(&(image.width() as u16).to_be_bytes());
    head[8..10].copy_from_slice(&(image.height() as u16).to_be_bytes());
    head[10..12].copy_from_slice(&(format.channels() as u16).to_be_bytes());
    head[12..16].copy_from_slice(&0u32.to_be_bytes());
    head[16..20].copy_from_slice(&pixmax.to_be_bytes());
    // name and colormap stay zeroed
    head
}

/// Values of one bottom-up scanline of one channel
fn scanline(image: &Image, channel: usize, scanline: usize) -> Vec<u16> {
    let row = image.height() - 1 - scanline;
    (0..image.width()).filter_map(|col| image.component(col, row, channel)).collect()
}

fn push_word(out: &mut Vec<u8>, word: u16, bpc: usize) {
    match bpc {
        1 => out.push(word as u8),
        _ => out.extend_from_slice(&word.to_be_bytes()),
    }
}

pub fn write_sgi<W: Write>(image: &Image, storage: SgiStorage, writer: &mut W) -> Result<()> {
    check_encodable(image)?;

    let bpc = image.format().bytes_per_component();
    let channels = image.format().channels();
    io::write_all(writer, &header(image, storage), ENCODE, "head")?;

    match storage {
        SgiStorage::Uncompressed => {
            let mut planes = Vec::with_capacity(image.size());
            for channel in 0..channels {
                for line in 0..image.height() {
                    for value in scanline(image, channel, line) {
                        push_word(&mut planes, value, bpc);
                    }
                }
            }
            io::write_all(writer, &planes, ENCODE, "data")
        }
        SgiStorage::Rle => {
            let table_len = image.height() * channels;
            let mut offsets = Vec::with_capacity(table_len * 4);
            let mut lengths = Vec::with_capacity(table_len * 4);
            let mut packed = Vec::new();
            let data_start = HEADER_LEN + table_len * 8;

            for channel in 0..channels {
                for line in 0..image.height() {
                    let start = packed.len();
                    for word in compact(&scanline(image, channel, line)) {
                        push_word(&mut packed, word, bpc);
                    }

                    let offset = u32::try_from(data_start + start).map_err(|_| {
                        Error::unsupported(ENCODE, "rle data exceeds 32-bit offsets")
                    })?;
                    offsets.extend_from_slice(&offset.to_be_bytes());
                    lengths.extend_from_slice(&((packed.len() - start) as u32).to_be_bytes());
                }
            }

            io::write_all(writer, &offsets, ENCODE, "offset table")?;
            io::write_all(writer, &lengths, ENCODE, "length table")?;
            io::write_all(writer, &packed, ENCODE, "rle data")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Cursor;

    fn rgba8_4x4() -> Image {
        let mut data = Vec::with_capacity(64);
        for row in 0..4u8 {
            for col in 0..4u8 {
                // flat alpha and a repeating top row exercise both run kinds
                let red = if row == 0 { 200 } else { row * 16 + col };
                data.extend_from_slice(&[red, col * 50, 7, 255]);
            }
        }
        Image::from_data(ImageFormat::Rgba8, 4, 4, data).unwrap()
    }

    fn encode(image: &Image, storage: SgiStorage) -> Vec<u8> {
        let mut out = Vec::new();
        write_sgi(image, storage, &mut out).unwrap();
        out
    }

    fn decode(file: Vec<u8>) -> Result<Image> {
        Image::read_from(&mut Cursor::new(file))
    }

    #[test]
    fn test_header_layout() {
        let image = rgba8_4x4();
        let out = encode(&image, SgiStorage::Uncompressed);

        assert_eq!(out.len(), HEADER_LEN + 64);
        assert_eq!(&out[0..2], &[0x01, 0xDA]);
        assert_eq!(out[2], 0);
        assert_eq!(out[3], 1);
        assert_eq!(&out[4..12], &[0, 3, 0, 4, 0, 4, 0, 4]);
        assert_eq!(&out[16..20], &[0, 0, 0, 255]);
        assert!(out[20..HEADER_LEN].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_uncompressed_planes_are_bottom_up() {
        let image = Image::from_data(ImageFormat::Gray8, 2, 2, vec![1, 2, 3, 4]).unwrap();
        let out = encode(&image, SgiStorage::Uncompressed);
        assert_eq!(&out[HEADER_LEN..], &[3, 4, 1, 2]);
    }

    #[test]
    fn test_roundtrip_rgba8_rle() {
        let image = rgba8_4x4();
        let out = encode(&image, SgiStorage::Rle);
        assert_eq!(out[2], 1);

        let loaded = decode(out).unwrap();
        assert_eq!(loaded.data(), image.data());
        assert_eq!(loaded.size(), 64);
    }

    #[test]
    fn test_roundtrip_16bit() {
        let data: Vec<u8> = (0..3 * 2 * 3u16).flat_map(|v| (v * 3001).to_ne_bytes()).collect();
        let image = Image::from_data(ImageFormat::Rgb16, 3, 2, data).unwrap();

        for storage in [SgiStorage::Uncompressed, SgiStorage::Rle] {
            let loaded = decode(encode(&image, storage)).unwrap();
            assert_eq!(loaded, image, "{:?}", storage);
        }
    }

    #[test]
    fn test_compact() {
        assert_eq!(compact(&[]), vec![0]);
        assert_eq!(compact(&[5]), vec![0x81, 5, 0]);
        assert_eq!(compact(&[1, 2, 9, 9, 9, 9, 3]), vec![0x82, 1, 2, 4, 9, 0x81, 3, 0]);
        assert_eq!(compact(&[4, 4]), vec![0x82, 4, 4, 0]);

        let long = vec![6u16; 130];
        assert_eq!(compact(&long), vec![127, 6, 3, 6, 0]);
    }

    #[test]
    fn test_expand_scanline_errors() {
        let mut out = Vec::new();
        expand_scanline(&[0x03, 7, 0], 1, 3, &mut out).unwrap();
        assert_eq!(out, vec![7, 7, 7]);

        let err = expand_scanline(&[0x05, 7, 0], 1, 3, &mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedData);

        let err = expand_scanline(&[0x02, 7, 0], 1, 3, &mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedData);

        let err = expand_scanline(&[0x83, 1, 2], 1, 3, &mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedData);
    }

    fn patched(offset: usize, bytes: &[u8]) -> Vec<u8> {
        let mut file = encode(&rgba8_4x4(), SgiStorage::Uncompressed);
        file[offset..offset + bytes.len()].copy_from_slice(bytes);
        file
    }

    #[test]
    fn test_header_errors() {
        let cases: [(usize, &[u8], ErrorKind); 7] = [
            (104, &[0, 0, 0, 1], ErrorKind::ObsoleteFeature),
            (104, &[0, 0, 0, 3], ErrorKind::ObsoleteFeature),
            (104, &[0, 0, 0, 9], ErrorKind::UnknownDataFormat),
            (10, &[0, 5], ErrorKind::UnsupportedFeature),
            (3, &[4], ErrorKind::UnsupportedFeature),
            (2, &[2], ErrorKind::UnknownDataFormat),
            (6, &[0, 0], ErrorKind::UnexpectedData),
        ];
        for (offset, bytes, kind) in cases {
            let err = decode(patched(offset, bytes)).unwrap_err();
            assert_eq!(err.kind(), kind, "offset {}", offset);
        }
    }

    #[test]
    fn test_low_dimensions() {
        // dimension 2 keeps one channel of the stored planes
        let info = read_info(&mut Cursor::new(patched(4, &[0, 2]))).unwrap();
        assert_eq!((info.width, info.height, info.format), (4, 4, ImageFormat::Gray8));

        let info = read_info(&mut Cursor::new(patched(4, &[0, 1]))).unwrap();
        assert_eq!((info.width, info.height, info.format), (4, 1, ImageFormat::Gray8));
    }

    #[test]
    fn test_truncated() {
        let mut file = encode(&rgba8_4x4(), SgiStorage::Uncompressed);
        file.truncate(HEADER_LEN + 20);
        assert_eq!(decode(file).unwrap_err().kind(), ErrorKind::TruncatedData);

        let mut file = encode(&rgba8_4x4(), SgiStorage::Rle);
        file.truncate(file.len() - 2);
        assert_eq!(decode(file).unwrap_err().kind(), ErrorKind::TruncatedData);

        let file = encode(&rgba8_4x4(), SgiStorage::Rle)[..100].to_vec();
        assert_eq!(decode(file).unwrap_err().kind(), ErrorKind::TruncatedData);
    }

    #[test]
    fn test_header_only_file_is_truncated() {
        // 65535x65535 RGBA16 declared, no pixel data
        let mut head = encode(&rgba8_4x4(), SgiStorage::Uncompressed)[..HEADER_LEN].to_vec();
        head[3] = 2;
        head[6..10].copy_from_slice(&[0xFF; 4]);

        for storage in [STORAGE_VERBATIM, STORAGE_RLE] {
            let mut file = head.clone();
            file[2] = storage;
            let err = decode(file).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::TruncatedData, "storage {}", storage);
        }
    }

    #[test]
    fn test_rle_table_checked_before_pixels() {
        let mut head = encode(&rgba8_4x4(), SgiStorage::Rle)[..HEADER_LEN].to_vec();
        head[6..10].copy_from_slice(&[0xFF, 0xFF, 0x00, 0x10]);
        let entries = 16 * 4;

        // spans past the end of the stream
        let mut file = head.clone();
        file.extend((0..entries).flat_map(|_| 0x00FF_FFFFu32.to_be_bytes()));
        file.extend((0..entries).flat_map(|_| 1034u32.to_be_bytes()));
        assert_eq!(decode(file).unwrap_err().kind(), ErrorKind::TruncatedData);

        // spans too short to cover 65535 px
        let mut file = head;
        file.extend((0..entries).flat_map(|_| (HEADER_LEN as u32).to_be_bytes()));
        file.extend((0..entries).flat_map(|_| 4u32.to_be_bytes()));
        assert_eq!(decode(file).unwrap_err().kind(), ErrorKind::UnexpectedData);
    }

    #[test]
    fn test_dimensions_over_16_bits() {
        let image = Image::new(ImageFormat::Gray8, 65536, 1).unwrap();
        let err = write_sgi(&image, SgiStorage::Uncompressed, &mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
    }
}
