//! G.711 A-law and µ-law expansion to 16-bit linear PCM

const ULAW_BIAS: i32 = 0x84;
const ALAW_AMI_MASK: u8 = 0x55;

pub fn alaw_to_i16(compressed: u8) -> i16 {
    let compressed = compressed ^ ALAW_AMI_MASK;
    let mut t = ((compressed & 0x0F) as i32) << 4;
    let segment = ((compressed & 0x70) >> 4) as i32;

    if segment != 0 {
        t = (t + 0x108) << (segment - 1);
    } else {
        t += 8;
    }

    (if compressed & 0x80 != 0 { t } else { -t }) as i16
}

pub fn ulaw_to_i16(compressed: u8) -> i16 {
    let compressed = !compressed;
    let exponent = ((compressed & 0x70) >> 4) as i32;
    let t = ((((compressed & 0x0F) as i32) << 3) + ULAW_BIAS) << exponent;

    (if compressed & 0x80 != 0 { ULAW_BIAS - t } else { t - ULAW_BIAS }) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alaw_known_values() {
        assert_eq!(alaw_to_i16(0xD5), 8);
        assert_eq!(alaw_to_i16(0x55), -8);
        assert_eq!(alaw_to_i16(0xAA), 32256);
        assert_eq!(alaw_to_i16(0x2A), -32256);
    }

    #[test]
    fn test_ulaw_known_values() {
        assert_eq!(ulaw_to_i16(0xFF), 0);
        assert_eq!(ulaw_to_i16(0x7F), 0);
        assert_eq!(ulaw_to_i16(0x80), 32124);
        assert_eq!(ulaw_to_i16(0x00), -32124);
    }

    #[test]
    fn test_laws_are_odd_symmetric() {
        for code in 0u8..0x80 {
            assert_eq!(ulaw_to_i16(code), -ulaw_to_i16(code | 0x80));
            assert_eq!(alaw_to_i16(code), -alaw_to_i16(code | 0x80));
        }
    }
}
