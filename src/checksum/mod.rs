//! Table driven CRC-16 as used by the P1 port (CRC-16/ARC).
//!
//! The engine can be used in one go with [`Crc16::compute`] or fed byte by
//! byte while a telegram is streaming in with [`Crc16::reset`],
//! [`Crc16::update`] and [`Crc16::current`].

use lazy_static::lazy_static;

/* x^16 + x^15 + x^2 + 1 in bit reversed notation */
pub const CRC16_POLYNOMIAL: u16 = 0xA001;

lazy_static! {
    static ref CRC16_TABLE: [u16; 256] = build_table(CRC16_POLYNOMIAL);
}

fn build_table(polynomial: u16) -> [u16; 256] {
    let mut table = [0u16; 256];

    for (i, entry) in table.iter_mut().enumerate() {
        let mut crc = i as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ polynomial;
            } else {
                crc >>= 1;
            }
        }
        *entry = crc;
    }

    return table;
}

pub struct Crc16 {
    table: &'static [u16; 256],
    value: u16,
}

impl Crc16 {
    pub fn new() -> Self {
        Self {
            table: &*CRC16_TABLE,
            value: 0,
        }
    }

    #[inline]
    fn step(&self, crc: u16, byte: u8) -> u16 {
        (crc >> 8) ^ self.table[((crc ^ byte as u16) & 0x00FF) as usize]
    }

    /// Runs the whole buffer through the table starting at `initial`.
    /// The live accumulator is not touched.
    pub fn compute(&self, buffer: &[u8], initial: u16) -> u16 {
        buffer.iter().fold(initial, |crc, byte| self.step(crc, *byte))
    }

    pub fn reset(&mut self, initial: u16) {
        self.value = initial;
    }

    pub fn update(&mut self, byte: u8) {
        self.value = self.step(self.value, byte);
    }

    pub fn current(&self) -> u16 {
        self.value
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crc16::{State, ARC};

    #[test]
    fn test_table_entries() {
        let table = build_table(CRC16_POLYNOMIAL);
        assert_eq!(table[0], 0x0000);
        assert_eq!(table[1], 0xC0C1);
        assert_eq!(table[2], 0xC181);
        assert_eq!(table[128], 0xA001);
        assert_eq!(table[255], 0x4040);
    }

    #[test]
    fn test_check_value() {
        let crc = Crc16::new();
        assert_eq!(crc.compute(b"123456789", 0), 0xBB3D);
        assert_eq!(crc.compute(b"", 0), 0x0000);
        assert_eq!(crc.compute(b"", 0x1234), 0x1234);
    }

    #[test]
    fn test_compute_matches_reference() {
        let crc = Crc16::new();
        let samples: [&[u8]; 4] = [
            b"/ISk5\\2MT382-1000\r\n\r\n1-3:0.2.8(50)\r\n!",
            b"1-0:1.8.0(00123.456*kWh)",
            &[0x00, 0xFF, 0x7F, 0x80],
            b"!",
        ];

        for sample in samples {
            assert_eq!(crc.compute(sample, 0), State::<ARC>::calculate(sample));
        }
    }

    #[test]
    fn test_incremental_matches_compute() {
        let data = b"/HEADER\r\n\r\n1-0:1.8.0(00123.456*kWh)!";
        let mut crc = Crc16::new();

        crc.reset(0);
        for byte in data.iter() {
            crc.update(*byte);
        }

        assert_eq!(crc.current(), crc.compute(data, 0));
    }

    #[test]
    fn test_compute_is_pure() {
        let mut crc = Crc16::new();
        crc.reset(0x4242);
        let first = crc.compute(b"some bytes", 0);
        let second = crc.compute(b"some bytes", 0);
        assert_eq!(first, second);
        assert_eq!(crc.current(), 0x4242);
    }

    #[test]
    fn test_compute_can_continue() {
        let crc = Crc16::new();
        let head = crc.compute(b"1234", 0);
        assert_eq!(crc.compute(b"56789", head), 0xBB3D);
    }
}
