//! WAV audio file processing
//!
//! RIFF container, little-endian. The encoder writes `fmt `, `fact` and
//! `data` chunks; the decoder walks chunks in order and skips unknown ones.

use std::io::{Read, Seek, SeekFrom, Write};

use log::debug;

use crate::endian::{self, Endianness};
use crate::error::{Error, Result};
use crate::io;

use super::{Sound, SoundFormat, SoundInfo, SoundStorage};

pub const RIFF_ID: [u8; 4] = *b"RIFF";
pub const WAVE_SIGNATURE: [u8; 4] = *b"WAVE";
const FMT_ID: [u8; 4] = *b"fmt ";
const FACT_ID: [u8; 4] = *b"fact";
const DATA_ID: [u8; 4] = *b"data";

const FMT_LEN: u32 = 16;
const FMT_EXTENSIBLE_LEN: u32 = 40;

/// Format tags of the `fmt ` chunk
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatTag {
    Pcm = 0x0001,
    IeeeFloat = 0x0003,
    ALaw = 0x0006,
    ULaw = 0x0007,
    Extensible = 0xFFFE,
}

impl FormatTag {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::Pcm),
            0x0003 => Some(Self::IeeeFloat),
            0x0006 => Some(Self::ALaw),
            0x0007 => Some(Self::ULaw),
            0xFFFE => Some(Self::Extensible),
            _ => None,
        }
    }
}

const DECODE: &str = "wav::decode";
const ENCODE: &str = "wav::encode";

pub fn is_wav(probe: &[u8]) -> bool {
    probe.starts_with(&RIFF_ID)
}

fn le_u16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// RIFF chunks are word aligned; odd sizes carry one pad byte.
fn padded(size: u32) -> u64 {
    size as u64 + (size as u64 & 1)
}

struct Fmt {
    format: SoundFormat,
    storage: SoundStorage,
    channels: usize,
    frequency: usize,
    unsigned_8bit: bool,
}

fn parse_fmt(block: &[u8]) -> Result<Fmt> {
    let raw_tag = le_u16(&block[0..2]);
    let channels = le_u16(&block[2..4]) as usize;
    let frequency = le_u32(&block[4..8]) as usize;
    let bits_per_sample = le_u16(&block[14..16]);

    if channels == 0 {
        return Err(Error::unexpected(DECODE, "zero channels"));
    }
    if frequency == 0 {
        return Err(Error::unexpected(DECODE, "zero sample rate"));
    }

    let mut tag = FormatTag::from_u16(raw_tag).ok_or_else(|| {
        Error::unknown_data_format(DECODE, format!("format tag 0x{:04X}", raw_tag))
    })?;

    if tag == FormatTag::Extensible {
        if block.len() < FMT_EXTENSIBLE_LEN as usize {
            return Err(Error::unsupported(DECODE, "extensible format without sub-format"));
        }
        // The first two bytes of the sub-format GUID hold the plain tag
        let sub_tag = le_u16(&block[24..26]);
        tag = match FormatTag::from_u16(sub_tag) {
            Some(FormatTag::Extensible) | None => {
                let message = format!("extensible sub-format 0x{:04X}", sub_tag);
                return Err(Error::unsupported(DECODE, message));
            }
            Some(tag) => tag,
        };
    }

    let (format, storage) = match tag {
        FormatTag::Pcm => match bits_per_sample {
            8 => (SoundFormat::I8, SoundStorage::Uncompressed),
            16 => (SoundFormat::I16, SoundStorage::Uncompressed),
            32 => (SoundFormat::I32, SoundStorage::Uncompressed),
            other => {
                return Err(Error::unsupported(DECODE, format!("pcm bits per sample ({})", other)));
            }
        },
        FormatTag::IeeeFloat => match bits_per_sample {
            32 => (SoundFormat::F32, SoundStorage::Uncompressed),
            64 => (SoundFormat::F64, SoundStorage::Uncompressed),
            other => {
                let message = format!("float bits per sample ({})", other);
                return Err(Error::unsupported(DECODE, message));
            }
        },
        FormatTag::ALaw => (SoundFormat::I16, SoundStorage::ALaw),
        FormatTag::ULaw => (SoundFormat::I16, SoundStorage::ULaw),
        FormatTag::Extensible => return Err(Error::unsupported(DECODE, "nested extensible format")),
    };

    Ok(Fmt { format, storage, channels, frequency, unsigned_8bit: format == SoundFormat::I8 })
}

pub(crate) fn read_info<R: Read + Seek>(reader: &mut R) -> Result<SoundInfo> {
    let mut riff_read = false;
    let mut fmt: Option<Fmt> = None;
    let mut data: Option<(u64, u32)> = None;

    loop {
        let mut head = [0u8; 8];
        let read = io::read_up_to(reader, &mut head, DECODE, "chunk head")?;
        if read < head.len() {
            if riff_read && fmt.is_some() && data.is_some() {
                break;
            }
            return Err(Error::truncated(DECODE, "at chunk head"));
        }

        let id = [head[0], head[1], head[2], head[3]];
        let size = le_u32(&head[4..8]);

        if id == RIFF_ID {
            if size < 4 {
                return Err(Error::unknown_data_format(DECODE, "riff chunk"));
            }
            let signature: [u8; 4] = io::read_array(reader, DECODE, "at riff chunk")?;
            if signature != WAVE_SIGNATURE {
                return Err(Error::unknown_file_format(DECODE, "invalid wave signature"));
            }
            riff_read = true;
            continue;
        }

        if !riff_read {
            return Err(Error::unexpected(DECODE, "expected riff chunk"));
        }

        if id == FMT_ID {
            if size < FMT_LEN {
                let message = format!("fmt chunk of {} bytes", size);
                return Err(Error::unknown_data_format(DECODE, message));
            }
            let position = io::position(reader, DECODE)?;
            io::ensure_available(reader, position, size as u64, DECODE, "fmt chunk")?;
            let block = io::read_vec(reader, size as usize, DECODE, "at fmt chunk")?;
            fmt = Some(parse_fmt(&block)?);

            if size & 1 == 1 {
                io::seek(reader, SeekFrom::Current(1), DECODE, "fmt pad")?;
            }
        } else if id == DATA_ID {
            if fmt.is_none() {
                return Err(Error::unexpected(DECODE, "expected fmt chunk"));
            }
            let offset = io::position(reader, DECODE)?;
            io::ensure_available(reader, offset, size as u64, DECODE, "data chunk")?;
            data = Some((offset, size));
            io::seek(reader, SeekFrom::Start(offset + padded(size)), DECODE, "data seek")?;
        } else {
            debug!("Ignored '{}' chunk ({} bytes)", String::from_utf8_lossy(&id), size);
            io::seek(reader, SeekFrom::Current(padded(size) as i64), DECODE, "chunk seek")?;
        }
    }

    let (Some(fmt), Some((data_offset, data_size))) = (fmt, data) else {
        return Err(Error::truncated(DECODE, "missing fmt or data chunk"));
    };

    let mut info = SoundInfo {
        frequency: fmt.frequency,
        channels: fmt.channels,
        length: 0,
        uncompressed_size: 0,
        minimum_unit_size: fmt.format.bytes_per_sample(),
        endianness: Endianness::Little,
        storage: fmt.storage,
        format: fmt.format,
        unsigned_8bit: fmt.unsigned_8bit,
        unspecified_size: false,
        data_offset,
    };
    info.length = data_size as usize / info.stored_frame_size();
    info.uncompressed_size = info.length * info.channels * info.format.bytes_per_sample();

    Ok(info)
}

fn riff_size(sound: &Sound) -> u64 {
    let data = padded(sound.size().min(u32::MAX as usize) as u32);
    4 + (8 + FMT_LEN as u64) + (8 + 4) + 8 + data
}

pub(crate) fn check_encodable(sound: &Sound) -> Result<()> {
    let block_align = sound.channels() as u64 * sound.format().bytes_per_sample() as u64;

    if sound.channels() > u16::MAX as usize || block_align > u16::MAX as u64 {
        return Err(Error::unsupported(ENCODE, format!("{} channels", sound.channels())));
    }
    if block_align * sound.frequency() as u64 > u32::MAX as u64 {
        return Err(Error::unsupported(ENCODE, format!("{} Hz", sound.frequency())));
    }
    if sound.size() > u32::MAX as usize
        || sound.length() > u32::MAX as usize
        || riff_size(sound) > u32::MAX as u64
    {
        return Err(Error::unsupported(ENCODE, format!("{} bytes of data", sound.size())));
    }
    Ok(())
}

pub fn write_wav<W: Write>(sound: &Sound, writer: &mut W) -> Result<()> {
    check_encodable(sound)?;

    let format = sound.format();
    let bps = format.bytes_per_sample();
    let tag = if format.is_float() { FormatTag::IeeeFloat } else { FormatTag::Pcm };
    let block_align = (sound.channels() * bps) as u16;

    let mut head = Vec::with_capacity(56);
    head.extend_from_slice(&RIFF_ID);
    head.extend_from_slice(&(riff_size(sound) as u32).to_le_bytes());
    head.extend_from_slice(&WAVE_SIGNATURE);

    head.extend_from_slice(&FMT_ID);
    head.extend_from_slice(&FMT_LEN.to_le_bytes());
    head.extend_from_slice(&(tag as u16).to_le_bytes());
    head.extend_from_slice(&(sound.channels() as u16).to_le_bytes());
    head.extend_from_slice(&(sound.frequency() as u32).to_le_bytes());
    head.extend_from_slice(&(block_align as u32 * sound.frequency() as u32).to_le_bytes());
    head.extend_from_slice(&block_align.to_le_bytes());
    head.extend_from_slice(&((bps * 8) as u16).to_le_bytes());

    head.extend_from_slice(&FACT_ID);
    head.extend_from_slice(&4u32.to_le_bytes());
    head.extend_from_slice(&(sound.length() as u32).to_le_bytes());

    head.extend_from_slice(&DATA_ID);
    head.extend_from_slice(&(sound.size() as u32).to_le_bytes());
    io::write_all(writer, &head, ENCODE, "head")?;

    let samples = if format == SoundFormat::I8 {
        // WAV stores 8-bit samples unsigned
        sound.data().iter().map(|b| b ^ 0x80).collect()
    } else {
        endian::native_to(sound.data(), bps, Endianness::Little)
    };
    io::write_all(writer, &samples, ENCODE, "data")?;

    if sound.size() % 2 == 1 {
        io::write_all(writer, &[0], ENCODE, "pad")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Cursor;

    fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(body);
        if body.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn fmt_body(tag: u16, channels: u16, frequency: u32, bits: u16) -> Vec<u8> {
        let align = channels * bits / 8;
        let mut body = Vec::new();
        body.extend_from_slice(&tag.to_le_bytes());
        body.extend_from_slice(&channels.to_le_bytes());
        body.extend_from_slice(&frequency.to_le_bytes());
        body.extend_from_slice(&(frequency * align as u32).to_le_bytes());
        body.extend_from_slice(&align.to_le_bytes());
        body.extend_from_slice(&bits.to_le_bytes());
        body
    }

    fn riff(chunks: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = chunks.concat();
        let mut out = RIFF_ID.to_vec();
        out.extend_from_slice(&(body.len() as u32 + 4).to_le_bytes());
        out.extend_from_slice(&WAVE_SIGNATURE);
        out.extend_from_slice(&body);
        out
    }

    fn decode(file: Vec<u8>) -> Result<Sound> {
        Sound::read_from(&mut Cursor::new(file))
    }

    #[test]
    fn test_write_wav_layout() {
        let data: Vec<u8> = [1i16, -1].iter().flat_map(|s| s.to_ne_bytes()).collect();
        let sound = Sound::from_data(SoundFormat::I16, 1, 8000, data).unwrap();

        let mut out = Vec::new();
        write_wav(&sound, &mut out).unwrap();

        let expected = riff(&[
            chunk(b"fmt ", &fmt_body(1, 1, 8000, 16)),
            chunk(b"fact", &2u32.to_le_bytes()),
            chunk(b"data", &[0x01, 0x00, 0xFF, 0xFF]),
        ]);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_int8_stored_unsigned() {
        let sound = Sound::from_data(SoundFormat::I8, 1, 8000, vec![0x00, 0x7F, 0x80]).unwrap();
        let mut out = Vec::new();
        write_wav(&sound, &mut out).unwrap();

        // odd data size gets a pad byte
        assert_eq!(&out[out.len() - 4..], &[0x80, 0xFF, 0x00, 0x00]);
        assert_eq!(decode(out).unwrap(), sound);
    }

    #[test]
    fn test_roundtrip_all_formats() {
        let formats = [
            SoundFormat::I8,
            SoundFormat::I16,
            SoundFormat::I32,
            SoundFormat::F32,
            SoundFormat::F64,
        ];
        for format in formats {
            let size = 3 * 2 * format.bytes_per_sample();
            let data: Vec<u8> = (0..size).map(|i| (i * 37 % 251) as u8).collect();
            let sound = Sound::from_data(format, 2, 11025, data).unwrap();

            let mut out = Vec::new();
            write_wav(&sound, &mut out).unwrap();
            assert_eq!(decode(out).unwrap(), sound, "{}", format.name());
        }
    }

    #[test]
    fn test_skips_unknown_chunks() {
        let file = riff(&[
            chunk(b"LIST", b"odd"),
            chunk(b"fmt ", &fmt_body(1, 1, 8000, 16)),
            chunk(b"data", &[0x10, 0x00]),
            chunk(b"cue ", &[0; 4]),
        ]);
        let sound = decode(file).unwrap();
        assert_eq!(sound.length(), 1);
        assert_eq!(sound.data(), &16i16.to_ne_bytes());
    }

    #[test]
    fn test_extensible_format() {
        let mut body = fmt_body(0xFFFE, 1, 48000, 32);
        body.extend_from_slice(&22u16.to_le_bytes());
        body.extend_from_slice(&32u16.to_le_bytes());
        body.extend_from_slice(&4u32.to_le_bytes());
        body.extend_from_slice(&[0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00]);
        body.extend_from_slice(&[0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71]);

        let file = riff(&[chunk(b"fmt ", &body), chunk(b"data", &1.5f32.to_le_bytes())]);
        let sound = decode(file).unwrap();
        assert_eq!(sound.format(), SoundFormat::F32);
        assert_eq!(sound.data(), &1.5f32.to_ne_bytes());
    }

    #[test]
    fn test_companded_data() {
        let file = riff(&[chunk(b"fmt ", &fmt_body(6, 1, 8000, 8)), chunk(b"data", &[0xD5, 0x55])]);
        let sound = decode(file).unwrap();
        assert_eq!(sound.format(), SoundFormat::I16);
        assert_eq!(sound.length(), 2);
        let decoded: Vec<i16> =
            sound.data().chunks_exact(2).map(|c| i16::from_ne_bytes([c[0], c[1]])).collect();
        assert_eq!(decoded, vec![8, -8]);
    }

    #[test]
    fn test_chunk_order_errors() {
        let file = riff(&[chunk(b"data", &[0, 0]), chunk(b"fmt ", &fmt_body(1, 1, 8000, 16))]);
        assert_eq!(decode(file).unwrap_err().kind(), ErrorKind::UnexpectedData);

        let mut file = riff(&[chunk(b"fmt ", &fmt_body(1, 1, 8000, 16))]);
        file[8..12].copy_from_slice(b"AVI ");
        assert_eq!(decode(file).unwrap_err().kind(), ErrorKind::UnknownFileFormat);
    }

    #[test]
    fn test_missing_data_chunk() {
        let file = riff(&[chunk(b"fmt ", &fmt_body(1, 1, 8000, 16))]);
        assert_eq!(decode(file).unwrap_err().kind(), ErrorKind::TruncatedData);
    }

    #[test]
    fn test_format_errors() {
        let file = riff(&[chunk(b"fmt ", &fmt_body(1, 1, 8000, 24)), chunk(b"data", &[0; 3])]);
        assert_eq!(decode(file).unwrap_err().kind(), ErrorKind::UnsupportedFeature);

        let file = riff(&[chunk(b"fmt ", &fmt_body(3, 1, 8000, 16)), chunk(b"data", &[0; 2])]);
        assert_eq!(decode(file).unwrap_err().kind(), ErrorKind::UnsupportedFeature);

        let file = riff(&[chunk(b"fmt ", &fmt_body(0x0055, 1, 8000, 16)), chunk(b"data", &[0; 2])]);
        assert_eq!(decode(file).unwrap_err().kind(), ErrorKind::UnknownDataFormat);

        let file = riff(&[chunk(b"fmt ", &[0; 12]), chunk(b"data", &[0; 2])]);
        assert_eq!(decode(file).unwrap_err().kind(), ErrorKind::UnknownDataFormat);

        let file = riff(&[chunk(b"fmt ", &fmt_body(1, 0, 8000, 16)), chunk(b"data", &[0; 2])]);
        assert_eq!(decode(file).unwrap_err().kind(), ErrorKind::UnexpectedData);
    }

    #[test]
    fn test_declared_data_exceeds_file() {
        let mut file = riff(&[chunk(b"fmt ", &fmt_body(1, 1, 8000, 16)), chunk(b"data", &[0; 8])]);
        file.truncate(file.len() - 3);
        assert_eq!(decode(file).unwrap_err().kind(), ErrorKind::TruncatedData);
    }

    #[test]
    fn test_hound_reads_our_output() {
        let samples = [0i16, 1200, -1200, i16::MAX, i16::MIN, 7];
        let data = samples.iter().flat_map(|s| s.to_ne_bytes()).collect();
        let sound = Sound::from_data(SoundFormat::I16, 2, 16000, data).unwrap();

        let mut out = Vec::new();
        write_wav(&sound, &mut out).unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(out)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);

        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, samples);
    }

    #[test]
    fn test_we_read_hound_output() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for sample in [0.25f32, -0.5, 1.0] {
                writer.write_sample(sample).unwrap();
            }
            writer.finalize().unwrap();
        }

        let sound = decode(cursor.into_inner()).unwrap();
        assert_eq!(sound.format(), SoundFormat::F32);
        assert_eq!(sound.frequency(), 44100);
        let decoded: Vec<f32> = sound
            .data()
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(decoded, vec![0.25, -0.5, 1.0]);
    }
}
