//! Byte order of stored samples and pixel components

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    #[cfg(target_endian = "little")]
    pub const NATIVE: Endianness = Endianness::Little;
    #[cfg(target_endian = "big")]
    pub const NATIVE: Endianness = Endianness::Big;

    pub fn name(self) -> &'static str {
        match self {
            Endianness::Little => "little",
            Endianness::Big => "big",
        }
    }
}

/// Reverse every `width`-byte unit of `data` in place.
///
/// A trailing partial unit is left untouched.
pub fn swap_units(data: &mut [u8], width: usize) {
    if width < 2 {
        return;
    }
    for unit in data.chunks_exact_mut(width) {
        unit.reverse();
    }
}

/// Convert `data` between `from` and `to` byte order in place.
pub fn convert_units(data: &mut [u8], width: usize, from: Endianness, to: Endianness) {
    if from != to {
        swap_units(data, width);
    }
}

/// Copy of `data` in byte order `to`, assuming it is currently native.
pub fn native_to(data: &[u8], width: usize, to: Endianness) -> Vec<u8> {
    let mut out = data.to_vec();
    convert_units(&mut out, width, Endianness::NATIVE, to);
    out
}
