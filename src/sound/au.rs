//! Sun/NeXT AU: 24-byte big-endian header followed by big-endian samples

use std::io::{Read, Seek, Write};

use crate::endian::{self, Endianness};
use crate::error::{Error, Result};
use crate::io;

use super::{Sound, SoundFormat, SoundInfo, SoundStorage};

pub const MAGIC: [u8; 4] = *b".snd";
pub const HEADER_LEN: u32 = 24;

const UNKNOWN_SIZE: u32 = 0xFFFF_FFFF;

const ENCODING_ULAW: u32 = 1;
const ENCODING_PCM8: u32 = 2;
const ENCODING_PCM16: u32 = 3;
const ENCODING_PCM24: u32 = 4;
const ENCODING_PCM32: u32 = 5;
const ENCODING_FLOAT: u32 = 6;
const ENCODING_DOUBLE: u32 = 7;
const ENCODING_ADPCM_G721: u32 = 23;
const ENCODING_ADPCM_G723_5BIT: u32 = 26;
const ENCODING_ALAW: u32 = 27;

const DECODE: &str = "au::decode";
const ENCODE: &str = "au::encode";

pub fn is_au(probe: &[u8]) -> bool {
    probe.starts_with(&MAGIC)
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

pub(crate) fn read_info<R: Read + Seek>(reader: &mut R) -> Result<SoundInfo> {
    let head: [u8; HEADER_LEN as usize] = io::read_array(reader, DECODE, "head")?;

    if !is_au(&head) {
        return Err(Error::unknown_file_format(DECODE, "bad magic"));
    }

    let data_offset = be_u32(&head[4..8]);
    let data_size = be_u32(&head[8..12]);
    let encoding = be_u32(&head[12..16]);
    let frequency = be_u32(&head[16..20]) as usize;
    let channels = be_u32(&head[20..24]) as usize;

    if data_offset < HEADER_LEN {
        return Err(Error::unexpected(DECODE, format!("data offset {} inside header", data_offset)));
    }
    if channels == 0 {
        return Err(Error::unexpected(DECODE, "zero channels"));
    }
    if frequency == 0 {
        return Err(Error::unexpected(DECODE, "zero sample rate"));
    }

    let (format, storage) = match encoding {
        ENCODING_PCM8 => (SoundFormat::I8, SoundStorage::Uncompressed),
        ENCODING_PCM16 => (SoundFormat::I16, SoundStorage::Uncompressed),
        ENCODING_PCM32 => (SoundFormat::I32, SoundStorage::Uncompressed),
        ENCODING_FLOAT => (SoundFormat::F32, SoundStorage::Uncompressed),
        ENCODING_DOUBLE => (SoundFormat::F64, SoundStorage::Uncompressed),
        ENCODING_ULAW => (SoundFormat::I16, SoundStorage::ULaw),
        ENCODING_ALAW => (SoundFormat::I16, SoundStorage::ALaw),
        ENCODING_PCM24 => return Err(Error::unsupported(DECODE, "24-bit pcm")),
        ENCODING_ADPCM_G721..=ENCODING_ADPCM_G723_5BIT => {
            return Err(Error::unsupported(DECODE, format!("adpcm encoding {}", encoding)));
        }
        other => return Err(Error::unknown_data_format(DECODE, format!("encoding {}", other))),
    };

    let unspecified_size = data_size == UNKNOWN_SIZE;
    let stored_size = if unspecified_size {
        io::stream_len(reader, DECODE)?.saturating_sub(data_offset as u64) as usize
    } else {
        data_size as usize
    };

    let mut info = SoundInfo {
        frequency,
        channels,
        length: 0,
        uncompressed_size: 0,
        minimum_unit_size: format.bytes_per_sample(),
        endianness: Endianness::Big,
        storage,
        format,
        unsigned_8bit: false,
        unspecified_size,
        data_offset: data_offset as u64,
    };
    info.length = stored_size / info.stored_frame_size();
    info.uncompressed_size = info.length * channels * format.bytes_per_sample();

    Ok(info)
}

fn encoding_for(format: SoundFormat) -> u32 {
    match format {
        SoundFormat::I8 => ENCODING_PCM8,
        SoundFormat::I16 => ENCODING_PCM16,
        SoundFormat::I32 => ENCODING_PCM32,
        SoundFormat::F32 => ENCODING_FLOAT,
        SoundFormat::F64 => ENCODING_DOUBLE,
    }
}

/// Header fields are 32 bits and `0xFFFFFFFF` is reserved for "unknown size".
pub(crate) fn check_encodable(sound: &Sound) -> Result<()> {
    if sound.channels() > u32::MAX as usize || sound.frequency() > u32::MAX as usize {
        return Err(Error::unsupported(ENCODE, "channels or frequency exceed 32 bits"));
    }
    if sound.size() >= UNKNOWN_SIZE as usize {
        return Err(Error::unsupported(ENCODE, format!("{} bytes of data", sound.size())));
    }
    Ok(())
}

pub fn write_au<W: Write>(sound: &Sound, writer: &mut W) -> Result<()> {
    check_encodable(sound)?;

    let mut head = Vec::with_capacity(HEADER_LEN as usize);
    head.extend_from_slice(&MAGIC);
    head.extend_from_slice(&HEADER_LEN.to_be_bytes());
    head.extend_from_slice(&(sound.size() as u32).to_be_bytes());
    head.extend_from_slice(&encoding_for(sound.format()).to_be_bytes());
    head.extend_from_slice(&(sound.frequency() as u32).to_be_bytes());
    head.extend_from_slice(&(sound.channels() as u32).to_be_bytes());
    io::write_all(writer, &head, ENCODE, "head")?;

    let bps = sound.format().bytes_per_sample();
    let samples = endian::native_to(sound.data(), bps, Endianness::Big);
    io::write_all(writer, &samples, ENCODE, "data")
}
