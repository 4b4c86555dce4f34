use std::io::Cursor;

use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter};

use super::ParseError;
use super::constants::MAX_POINTER_HOPS;

pub type PacketReader<'a> = BitReader<Cursor<&'a [u8]>, BigEndian>;
pub type PacketWriter<'a> = BitWriter<&'a mut Vec<u8>, BigEndian>;

pub trait PacketComponent {
    fn write(&self, writer: &mut PacketWriter<'_>) -> Result<(), ParseError>;

    /// Read the component at the reader's position. `packet` is the whole
    /// message, needed to follow compression pointers.
    fn read(&mut self, reader: &mut PacketReader<'_>, packet: &[u8]) -> Result<(), ParseError>;

    fn read_labels(
        &mut self,
        reader: &mut PacketReader<'_>,
        packet: &[u8],
    ) -> Result<Vec<String>, ParseError> {
        let offset = (reader.position_in_bits()? / 8) as usize;
        let (labels, consumed) = read_name(packet, offset)?;
        reader.skip((consumed * 8) as u32)?;
        Ok(labels)
    }

    fn write_labels(
        &self,
        writer: &mut PacketWriter<'_>,
        labels: &[String],
    ) -> Result<(), ParseError> {
        write_name(writer, labels)
    }
}

/// Decode the name starting at `offset`, following compression pointers.
///
/// Returns the labels (root label omitted) and the number of bytes the name
/// occupies at `offset` itself.
pub fn read_name(packet: &[u8], offset: usize) -> Result<(Vec<String>, usize), ParseError> {
    let mut labels = Vec::new();
    let mut pos = offset;
    let mut consumed = None;
    let mut hops = 0;
    let mut total_len = 0usize;

    loop {
        let len = *packet.get(pos).ok_or(ParseError::InvalidLabel)? as usize;
        match len & 0xC0 {
            0x00 if len == 0 => {
                pos += 1;
                break;
            }
            0x00 => {
                let start = pos + 1;
                let end = start + len;
                let bytes = packet.get(start..end).ok_or(ParseError::InvalidLabel)?;
                let label =
                    String::from_utf8(bytes.to_vec()).map_err(|_| ParseError::InvalidLabel)?;
                total_len += len + 1;
                if total_len > 255 {
                    return Err(ParseError::InvalidLabel);
                }
                labels.push(label);
                pos = end;
            }
            0xC0 => {
                let low = *packet.get(pos + 1).ok_or(ParseError::InvalidLabel)? as usize;
                let target = ((len & 0x3F) << 8) | low;
                // Pointers may only refer backwards.
                if target >= pos || hops >= MAX_POINTER_HOPS {
                    return Err(ParseError::InvalidLabel);
                }
                if consumed.is_none() {
                    consumed = Some(pos + 2 - offset);
                }
                hops += 1;
                pos = target;
            }
            _ => return Err(ParseError::InvalidLabel),
        }
    }

    Ok((labels, consumed.unwrap_or(pos - offset)))
}

/// Write `labels` as an uncompressed name terminated by the root label.
pub fn write_name(writer: &mut PacketWriter<'_>, labels: &[String]) -> Result<(), ParseError> {
    for label in labels.iter().filter(|l| !l.is_empty()) {
        if label.len() > 63 {
            return Err(ParseError::InvalidLabel);
        }
        writer.write_var::<u8>(8, label.len() as u8)?;
        writer.write_bytes(label.as_bytes())?;
    }
    writer.write_var::<u8>(8, 0)?;
    Ok(())
}

/// Encode `labels` into a standalone wire-format name.
pub fn encode_name(labels: &[String]) -> Result<Vec<u8>, ParseError> {
    let mut buf = Vec::new();
    {
        let mut writer: PacketWriter<'_> = BitWriter::new(&mut buf);
        write_name(&mut writer, labels)?;
    }
    Ok(buf)
}

/// Split a presentation-format name into labels, dropping the root.
pub fn name_to_labels(name: &str) -> Vec<String> {
    name.trim_end_matches('.')
        .split('.')
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect()
}

/// Presentation form of a name, always fully qualified.
pub fn labels_to_name(labels: &[String]) -> String {
    let mut name = labels
        .iter()
        .filter(|l| !l.is_empty())
        .map(|l| l.as_str())
        .collect::<Vec<_>>()
        .join(".");
    name.push('.');
    name
}

/// Case-insensitive owner-name comparison (RFC 4343).
pub fn names_equal(a: &[String], b: &[String]) -> bool {
    let a: Vec<&String> = a.iter().filter(|l| !l.is_empty()).collect();
    let b: Vec<&String> = b.iter().filter(|l| !l.is_empty()).collect();
    a.len() == b.len() && a.iter().zip(&b).all(|(x, y)| x.eq_ignore_ascii_case(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_compressed_name() {
        // "example.com" at offset 0, "www" + pointer to 0 at offset 13
        let mut packet = vec![7];
        packet.extend_from_slice(b"example");
        packet.push(3);
        packet.extend_from_slice(b"com");
        packet.push(0);
        packet.push(3);
        packet.extend_from_slice(b"www");
        packet.extend_from_slice(&[0xC0, 0x00]);

        let (labels, consumed) = read_name(&packet, 13).unwrap();
        assert_eq!(labels, vec!["www", "example", "com"]);
        assert_eq!(consumed, 6);

        let (labels, consumed) = read_name(&packet, 0).unwrap();
        assert_eq!(labels, vec!["example", "com"]);
        assert_eq!(consumed, 13);
    }

    #[test]
    fn test_pointer_loop_rejected() {
        let packet = vec![0xC0, 0x00];
        assert!(read_name(&packet, 0).is_err());
    }

    #[test]
    fn test_names_equal_ignores_case_and_root() {
        let a = name_to_labels("WWW.Example.com.");
        let b = vec!["www".to_string(), "example".to_string(), "com".to_string(), String::new()];
        assert!(names_equal(&a, &b));
        assert!(!names_equal(&a, &name_to_labels("example.com")));
        assert_eq!(labels_to_name(&a), "WWW.Example.com.");
    }
}
