//! Binary and Intel HEX serialization of an assembled program.

use crate::PROGRAM_SIZE;
use byteorder::{BigEndian, WriteBytesExt};
use std::io::{self, Write};

/// Writes exactly 512 bytes: 128 words, big-endian, MSB first.
pub fn write_binary<W: Write>(program: &[u32], mut writer: W) -> io::Result<()> {
    debug_assert_eq!(program.len(), PROGRAM_SIZE);
    for &word in program {
        writer.write_u32::<BigEndian>(word)?;
    }
    Ok(())
}

/// Writes the program as Intel HEX, 16 data bytes (4 instructions) per
/// record, based at `0x0200 * slot`, terminated with an EOF record.
pub fn write_intel_hex<W: Write>(program: &[u32], slot: u8, mut writer: W) -> io::Result<()> {
    debug_assert_eq!(program.len(), PROGRAM_SIZE);
    let base = 0x0200u32 * slot as u32;

    for (chunk_index, chunk) in program.chunks(4).enumerate() {
        let mut data = Vec::with_capacity(16);
        for &word in chunk {
            data.extend_from_slice(&word.to_be_bytes());
        }
        let address = base + (chunk_index as u32) * 16;
        write_record(&mut writer, address, 0x00, &data)?;
    }
    write_record(&mut writer, 0, 0x01, &[])?;
    Ok(())
}

fn write_record<W: Write>(writer: &mut W, address: u32, record_type: u8, data: &[u8]) -> io::Result<()> {
    let mut bytes = Vec::with_capacity(5 + data.len());
    bytes.push(data.len() as u8);
    bytes.push((address >> 8) as u8);
    bytes.push(address as u8);
    bytes.push(record_type);
    bytes.extend_from_slice(data);

    let checksum = (!bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))).wrapping_add(1);

    write!(writer, ":")?;
    for byte in &bytes {
        write!(writer, "{:02X}", byte)?;
    }
    writeln!(writer, "{:02X}", checksum)
}

#[cfg(test)]
mod test {
    use super::*;

    fn full_program(word: u32) -> Vec<u32> {
        vec![word; PROGRAM_SIZE]
    }

    #[test]
    fn binary_output_is_exactly_512_bytes() {
        let mut buf = Vec::new();
        write_binary(&full_program(0x00000011), &mut buf).unwrap();
        assert_eq!(buf.len(), 512);
        assert_eq!(&buf[0..4], &[0x00, 0x00, 0x00, 0x11]);
    }

    #[test]
    fn intel_hex_has_32_data_records_and_an_eof_record() {
        let mut buf = Vec::new();
        write_intel_hex(&full_program(0x00000011), 0, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 33);
        assert!(lines[0].starts_with(":10000000"));
        assert_eq!(lines[32], ":00000001FF");
    }

    #[test]
    fn intel_hex_base_address_accounts_for_program_slot() {
        let mut buf = Vec::new();
        write_intel_hex(&full_program(0), 3, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let first_line = text.lines().next().unwrap();
        // base = 0x0200 * 3 = 0x0600
        assert!(first_line.starts_with(":100600"));
    }
}
