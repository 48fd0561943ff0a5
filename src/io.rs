//! Scoped file access with status mapping
//!
//! Opening maps to `Filesystem` failures, streaming to `Io` or
//! `TruncatedData`. Handles are released on every path by ownership.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Error, Result};

pub fn open<P: AsRef<Path>>(path: P, origin: &str) -> Result<BufReader<File>> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| Error::filesystem(origin, format!("'{}': {}", path.display(), e)))?;
    Ok(BufReader::new(file))
}

/// Create `path`, run `encode` against a buffered writer, then flush and sync.
///
/// A failed encode or flush removes the partially written file.
pub fn save<P, F>(path: P, origin: &str, encode: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let path = path.as_ref();
    let file = File::create(path)
        .map_err(|e| Error::filesystem(origin, format!("'{}': {}", path.display(), e)))?;

    let mut writer = BufWriter::new(file);
    let result = encode(&mut writer).and_then(|_| {
        let file = writer
            .into_inner()
            .map_err(|e| Error::io(origin, format!("flush '{}': {}", path.display(), e.error())))?;
        file.sync_all()
            .map_err(|e| Error::io(origin, format!("close '{}': {}", path.display(), e)))
    });

    if result.is_err() {
        let _ = fs::remove_file(path);
    }
    result
}

pub fn read_exact<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    origin: &str,
    context: &str,
) -> Result<()> {
    reader.read_exact(buf).map_err(|e| Error::from_io(origin, context, e))
}

pub fn read_array<R: Read, const N: usize>(
    reader: &mut R,
    origin: &str,
    context: &str,
) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    read_exact(reader, &mut buf, origin, context)?;
    Ok(buf)
}

pub fn read_vec<R: Read>(
    reader: &mut R,
    len: usize,
    origin: &str,
    context: &str,
) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    read_exact(reader, &mut buf, origin, context)?;
    Ok(buf)
}

/// Fill as much of `buf` as the stream allows; returns the byte count.
pub fn read_up_to<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    origin: &str,
    context: &str,
) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::io(origin, format!("{}: {}", context, e))),
        }
    }
    Ok(filled)
}

pub fn seek<S: Seek>(stream: &mut S, pos: SeekFrom, origin: &str, context: &str) -> Result<u64> {
    stream.seek(pos).map_err(|e| Error::io(origin, format!("{}: {}", context, e)))
}

pub fn position<S: Seek>(stream: &mut S, origin: &str) -> Result<u64> {
    seek(stream, SeekFrom::Current(0), origin, "position")
}

/// Total length of the stream; the current position is preserved.
pub fn stream_len<S: Seek>(stream: &mut S, origin: &str) -> Result<u64> {
    let current = position(stream, origin)?;
    let end = seek(stream, SeekFrom::End(0), origin, "length")?;
    seek(stream, SeekFrom::Start(current), origin, "length")?;
    Ok(end)
}

/// Fail with `TruncatedData` unless `len` bytes are available at `offset`.
pub fn ensure_available<S: Seek>(
    stream: &mut S,
    offset: u64,
    len: u64,
    origin: &str,
    context: &str,
) -> Result<()> {
    let total = stream_len(stream, origin)?;
    check_span(total, offset, len, origin, context)
}

/// Same as [`ensure_available`] against an already known stream length.
pub fn check_span(total: u64, offset: u64, len: u64, origin: &str, context: &str) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= total => Ok(()),
        _ => Err(Error::truncated(
            origin,
            format!("{} declares {} bytes at 0x{:X}, stream holds {}", context, len, offset, total),
        )),
    }
}

pub fn write_all<W: Write>(writer: &mut W, data: &[u8], origin: &str, context: &str) -> Result<()> {
    writer.write_all(data).map_err(|e| Error::io(origin, format!("{}: {}", context, e)))
}
