//! POSIX `cksum` checksum.
//!
//! CRC-32 with polynomial `0x04C11DB7`, processed MSB-first from a zero
//! register. After the data, the byte length is fed through the same CRC
//! least-significant byte first (only as many bytes as it takes to hold the
//! length), and the result is complemented. This is the value printed by
//! `printf '%s' <data> | cksum`.

const POLY: u32 = 0x04C1_1DB7;

/// Lookup table for one byte of MSB-first CRC-32, built at compile time.
const TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ POLY
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

#[inline]
fn update(crc: u32, byte: u8) -> u32 {
    (crc << 8) ^ TABLE[((crc >> 24) ^ byte as u32) as usize]
}

/// Compute the POSIX `cksum` value of `data`.
pub fn cksum(data: &[u8]) -> u32 {
    let mut crc = data.iter().fold(0u32, |crc, &b| update(crc, b));

    let mut len = data.len() as u64;
    while len != 0 {
        crc = update(crc, (len & 0xff) as u8);
        len >>= 8;
    }

    !crc
}
