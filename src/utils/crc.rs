//! CRC32 as used by MPEG-2 PSI sections (ITU-T H.222.0 annex A): polynomial 0x04C11DB7,
//! initial value 0xFFFFFFFF, no reflection, no final xor.

const CRC32_MPEG2: u32 = 0x04C11DB7;

const TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ CRC32_MPEG2
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// MPEG-2 CRC32 calculator.
///
/// ```
/// use live_segmenter::utils::Crc32Mpeg2;
///
/// assert_eq!(Crc32Mpeg2::checksum(&[0x01, 0x01]), 0xD66F_B816);
/// ```
pub struct Crc32Mpeg2;

impl Crc32Mpeg2 {
    pub fn checksum(data: &[u8]) -> u32 {
        data.iter().fold(0xFFFF_FFFF, |crc, &byte| {
            let index = ((crc >> 24) ^ byte as u32) & 0xFF;
            (crc << 8) ^ TABLE[index as usize]
        })
    }

    /// A section followed by its own CRC checksums to zero.
    pub fn verify(section_with_crc: &[u8]) -> bool {
        section_with_crc.len() >= 4 && Self::checksum(section_with_crc) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        assert_eq!(Crc32Mpeg2::checksum(&[0x01, 0x01]), 0xD66F_B816);
    }

    #[test]
    fn test_section_with_crc_verifies() {
        let mut pat = vec![
            0x00, 0xB0, 0x0D, 0x00, 0x01, 0xC1, 0x00, 0x00, 0x00, 0x01, 0xF0, 0x00,
        ];
        let crc = Crc32Mpeg2::checksum(&pat);
        pat.extend_from_slice(&crc.to_be_bytes());
        assert!(Crc32Mpeg2::verify(&pat));

        let last = pat.len() - 1;
        pat[last] ^= 0x01;
        assert!(!Crc32Mpeg2::verify(&pat));
    }
}
