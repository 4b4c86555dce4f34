use bitstream_io::{BitRead, BitWrite};

use super::{
    ParseError,
    common::{PacketComponent, PacketReader, PacketWriter, labels_to_name, name_to_labels},
    enums::{DNSResourceClass, DNSResourceType},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSQuestion {
    pub labels: Vec<String>,
    pub qtype: DNSResourceType,
    pub qclass: DNSResourceClass,
}

impl DNSQuestion {
    pub fn new(name: &str, qtype: DNSResourceType, qclass: DNSResourceClass) -> Self {
        Self {
            labels: name_to_labels(name),
            qtype,
            qclass,
        }
    }

    /// Fully qualified presentation form of the queried name.
    pub fn name(&self) -> String {
        labels_to_name(&self.labels)
    }
}

impl PacketComponent for DNSQuestion {
    fn write(&self, writer: &mut PacketWriter<'_>) -> Result<(), ParseError> {
        self.write_labels(writer, &self.labels)?;
        writer.write_var::<u16>(16, self.qtype.into())?;
        writer.write_var::<u16>(16, self.qclass.into())?;
        Ok(())
    }

    fn read(&mut self, reader: &mut PacketReader<'_>, packet: &[u8]) -> Result<(), ParseError> {
        let labels = self.read_labels(reader, packet)?;
        let qtype = reader.read_var::<u16>(16)?.into();
        let qclass = reader.read_var::<u16>(16)?.into();
        *self = DNSQuestion {
            labels,
            qtype,
            qclass,
        };
        Ok(())
    }
}
