use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use bitstream_io::{BitRead, BitWrite};

use super::{
    ParseError,
    common::{PacketComponent, PacketReader, PacketWriter, labels_to_name, read_name},
    enums::{DNSResourceClass, DNSResourceType},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSResource {
    pub labels: Vec<String>,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
    pub ttl: u32,
    /// Uncompressed wire-format rdata.
    pub rdata: Vec<u8>,
}

impl DNSResource {
    pub fn new(
        labels: Vec<String>,
        rtype: DNSResourceType,
        rclass: DNSResourceClass,
        ttl: u32,
        rdata: Vec<u8>,
    ) -> Self {
        Self {
            labels,
            rtype,
            rclass,
            ttl,
            rdata,
        }
    }

    /// Fully qualified owner name.
    pub fn name(&self) -> String {
        labels_to_name(&self.labels)
    }

    /// Target labels of a CNAME record; `None` for every other type.
    pub fn cname_target(&self) -> Option<Vec<String>> {
        if self.rtype != DNSResourceType::CNAME {
            return None;
        }
        read_name(&self.rdata, 0).ok().map(|(labels, _)| labels)
    }
}

impl fmt::Display for DNSResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} ",
            self.name(),
            self.ttl,
            self.rclass,
            self.rtype
        )?;
        match self.rtype {
            DNSResourceType::A if self.rdata.len() == 4 => {
                let octets: [u8; 4] = self.rdata[..4].try_into().map_err(|_| fmt::Error)?;
                write!(f, "{}", Ipv4Addr::from(octets))
            }
            DNSResourceType::AAAA if self.rdata.len() == 16 => {
                let octets: [u8; 16] = self.rdata[..16].try_into().map_err(|_| fmt::Error)?;
                write!(f, "{}", Ipv6Addr::from(octets))
            }
            DNSResourceType::NS | DNSResourceType::CNAME | DNSResourceType::PTR => {
                match read_name(&self.rdata, 0) {
                    Ok((labels, _)) => write!(f, "{}", labels_to_name(&labels)),
                    Err(_) => write!(f, "\\# {}", self.rdata.len()),
                }
            }
            _ => write!(f, "\\# {}", self.rdata.len()),
        }
    }
}

impl PacketComponent for DNSResource {
    fn write(&self, writer: &mut PacketWriter<'_>) -> Result<(), ParseError> {
        self.write_labels(writer, &self.labels)?;
        writer.write_var::<u16>(16, self.rtype.into())?;
        writer.write_var::<u16>(16, self.rclass.into())?;
        writer.write_var::<u32>(32, self.ttl)?;
        let rdlength = u16::try_from(self.rdata.len()).map_err(|_| {
            ParseError::TooLarge(format!("rdata of {} ({} bytes)", self.name(), self.rdata.len()))
        })?;
        writer.write_var::<u16>(16, rdlength)?;
        writer.write_bytes(&self.rdata)?;
        Ok(())
    }

    fn read(&mut self, reader: &mut PacketReader<'_>, packet: &[u8]) -> Result<(), ParseError> {
        self.labels = self.read_labels(reader, packet)?;
        self.rtype = reader.read_var::<u16>(16)?.into();
        self.rclass = reader.read_var::<u16>(16)?.into();
        self.ttl = reader.read_var::<u32>(32)?;
        let rdlength = reader.read_var::<u16>(16)?;
        let offset = (reader.position_in_bits()? / 8) as usize;
        let mut buf = vec![0_u8; rdlength as usize];
        reader.read_bytes(&mut buf)?;

        self.rdata = expand_rdata(self.rtype, packet, offset, buf)?;
        Ok(())
    }
}

/// Replace compression pointers inside name-bearing rdata with the full
/// names, so the record stays valid outside the message it arrived in.
fn expand_rdata(
    rtype: DNSResourceType,
    packet: &[u8],
    offset: usize,
    raw: Vec<u8>,
) -> Result<Vec<u8>, ParseError> {
    // (fixed bytes before the names, number of names, fixed bytes after)
    let layout = match rtype {
        DNSResourceType::NS
        | DNSResourceType::CNAME
        | DNSResourceType::PTR
        | DNSResourceType::MD
        | DNSResourceType::MF => (0, 1, 0),
        DNSResourceType::MX => (2, 1, 0),
        DNSResourceType::SRV => (6, 1, 0),
        DNSResourceType::SOA => (0, 2, 20),
        _ => return Ok(raw),
    };
    let (prefix, names, suffix) = layout;
    if raw.len() < prefix {
        return Err(ParseError::InvalidAnswerSection);
    }

    let mut expanded = raw[..prefix].to_vec();
    let mut pos = offset + prefix;
    for _ in 0..names {
        let (labels, consumed) = read_name(packet, pos)?;
        expanded.extend_from_slice(&super::common::encode_name(&labels)?);
        pos += consumed;
    }

    let used = pos - offset;
    if used + suffix != raw.len() {
        return Err(ParseError::InvalidAnswerSection);
    }
    expanded.extend_from_slice(&raw[used..]);
    Ok(expanded)
}
