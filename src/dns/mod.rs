pub mod common;
pub mod constants;
pub mod enums;
pub mod header;
pub mod question;
pub mod resource;

use std::io::Cursor;

use bitstream_io::{BigEndian, BitReader, BitWriter};
use common::{PacketComponent, PacketReader, PacketWriter};
use constants::DNSRcode;
use header::DNSHeader;
use question::DNSQuestion;
use resource::DNSResource;
use tracing::{debug, trace};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSPacket {
    pub header: DNSHeader,
    pub questions: Vec<DNSQuestion>,
    pub answers: Vec<DNSResource>,
    pub authorities: Vec<DNSResource>,
    pub resources: Vec<DNSResource>,
}

#[derive(Debug)]
pub enum ParseError {
    InvalidHeader,
    InvalidLabel,
    InvalidQuestionSection,
    InvalidAnswerSection,
    InvalidAuthoritySection,
    InvalidAdditionalSection,
    InvalidBitStream(String),
    TooLarge(String),
}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        ParseError::InvalidBitStream(e.to_string())
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::InvalidHeader => write!(f, "Invalid DNS header"),
            ParseError::InvalidLabel => write!(f, "Invalid DNS label"),
            ParseError::InvalidQuestionSection => write!(f, "Invalid question section"),
            ParseError::InvalidAnswerSection => write!(f, "Invalid answer section"),
            ParseError::InvalidAuthoritySection => write!(f, "Invalid authority section"),
            ParseError::InvalidAdditionalSection => write!(f, "Invalid additional section"),
            ParseError::InvalidBitStream(e) => write!(f, "Invalid bit stream: {}", e),
            ParseError::TooLarge(what) => write!(f, "{} exceeds the 16-bit wire limit", what),
        }
    }
}

impl std::error::Error for ParseError {}

impl DNSPacket {
    /// Build a standard recursive query for a single question.
    pub fn query(id: u16, question: DNSQuestion) -> Self {
        DNSPacket {
            header: DNSHeader {
                id,
                rd: true,
                qdcount: 1,
                ..Default::default()
            },
            questions: vec![question],
            ..Default::default()
        }
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        trace!("Parsing DNS packet, size: {} bytes", buf.len());
        if buf.len() < 12 {
            return Err(ParseError::InvalidHeader);
        }
        let mut reader: PacketReader<'_> = BitReader::<_, BigEndian>::new(Cursor::new(buf));
        let mut packet = DNSPacket::default();
        packet
            .header
            .read(&mut reader, buf)
            .map_err(|_| ParseError::InvalidHeader)?;
        debug!(
            "Parsed DNS header: id={}, qr={}, opcode={}, questions={}",
            packet.header.id, packet.header.qr, packet.header.opcode, packet.header.qdcount
        );

        for _ in 0..packet.header.qdcount {
            let mut question = DNSQuestion::default();
            question
                .read(&mut reader, buf)
                .map_err(|_| ParseError::InvalidQuestionSection)?;
            packet.questions.push(question);
        }

        for _ in 0..packet.header.ancount {
            let mut answer = DNSResource::default();
            answer
                .read(&mut reader, buf)
                .map_err(|_| ParseError::InvalidAnswerSection)?;
            packet.answers.push(answer);
        }

        for _ in 0..packet.header.nscount {
            let mut authority = DNSResource::default();
            authority
                .read(&mut reader, buf)
                .map_err(|_| ParseError::InvalidAuthoritySection)?;
            packet.authorities.push(authority);
        }

        for _ in 0..packet.header.arcount {
            let mut resource = DNSResource::default();
            resource
                .read(&mut reader, buf)
                .map_err(|_| ParseError::InvalidAdditionalSection)?;
            packet.resources.push(resource);
        }

        Ok(packet)
    }

    pub fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        let mut buf = Vec::new();
        let mut writer: PacketWriter<'_> = BitWriter::new(&mut buf);

        // Counts always follow the sections actually written
        let mut header = self.header.clone();
        header.qdcount = section_count(self.questions.len(), "question count")?;
        header.ancount = section_count(self.answers.len(), "answer count")?;
        header.nscount = section_count(self.authorities.len(), "authority count")?;
        header.arcount = section_count(self.resources.len(), "additional count")?;
        header.write(&mut writer)?;

        for question in self.questions.iter() {
            question.write(&mut writer)?;
        }

        for answer in self.answers.iter() {
            answer.write(&mut writer)?;
        }

        for authority in self.authorities.iter() {
            authority.write(&mut writer)?;
        }

        for resource in self.resources.iter() {
            resource.write(&mut writer)?;
        }

        drop(writer);
        Ok(buf)
    }

    /// Empty response skeleton echoing the id, opcode, RD bit and questions.
    pub fn response_to(query: &DNSPacket) -> Self {
        DNSPacket {
            header: DNSHeader {
                id: query.header.id,
                qr: true,
                opcode: query.header.opcode,
                rd: query.header.rd,
                rcode: DNSRcode::NOERROR,
                ..Default::default()
            },
            questions: query.questions.clone(),
            ..Default::default()
        }
    }

    /// Response carrying only an rcode, e.g. NOTIMP or SERVFAIL.
    pub fn error_response(query: &DNSPacket, rcode: u8) -> Self {
        let mut packet = Self::response_to(query);
        packet.header.rcode = rcode;
        packet
    }

    /// FORMERR reply for a query whose header decodes but whose body does not.
    /// Returns `None` when the header itself is unreadable or marks a response.
    pub fn format_error_reply(buf: &[u8]) -> Option<Self> {
        if buf.len() < 12 {
            return None;
        }
        let mut reader: PacketReader<'_> = BitReader::<_, BigEndian>::new(Cursor::new(buf));
        let mut header = DNSHeader::default();
        header.read(&mut reader, buf).ok()?;
        if header.qr {
            return None;
        }
        Some(DNSPacket {
            header: DNSHeader {
                id: header.id,
                qr: true,
                opcode: header.opcode,
                rd: header.rd,
                rcode: DNSRcode::FORMERR,
                ..Default::default()
            },
            ..Default::default()
        })
    }

    /// Drop every record section and set TC so the client retries over TCP.
    pub fn truncate(&mut self) {
        self.header.tc = true;
        self.answers.clear();
        self.authorities.clear();
        self.resources.clear();
    }
}

fn section_count(len: usize, what: &str) -> Result<u16, ParseError> {
    u16::try_from(len).map_err(|_| ParseError::TooLarge(format!("{} {}", what, len)))
}

#[cfg(test)]
mod test {
    use super::*;
    use enums::{DNSResourceClass, DNSResourceType};

    #[test]
    fn test_default_packet_serializes_to_bare_header() {
        let packet = DNSPacket::default();
        assert_eq!(packet.serialize().unwrap().len(), 12);
    }

    #[test]
    fn test_oversized_rdata_rejected_on_serialize() {
        let mut packet = DNSPacket::default();
        packet.answers.push(DNSResource::new(
            vec!["big".to_string(), "example".to_string()],
            DNSResourceType::TXT,
            DNSResourceClass::IN,
            60,
            vec![b'a'; 70_000],
        ));
        assert!(matches!(packet.serialize(), Err(ParseError::TooLarge(_))));
    }

    #[test]
    fn test_oversized_section_count_rejected_on_serialize() {
        let record = DNSResource::new(
            vec!["a".to_string()],
            DNSResourceType::A,
            DNSResourceClass::IN,
            60,
            vec![127, 0, 0, 1],
        );
        let mut packet = DNSPacket::default();
        packet.answers = vec![record; u16::MAX as usize + 1];
        assert!(matches!(packet.serialize(), Err(ParseError::TooLarge(_))));
    }

    #[test]
    fn test_query_serializes_and_parses() {
        let question = DNSQuestion::new("www.example.com.", DNSResourceType::A, DNSResourceClass::IN);
        let query = DNSPacket::query(0xBEEF, question.clone());

        let bytes = query.serialize().unwrap();
        // header + 3www7example3com0 + type + class
        assert_eq!(bytes.len(), 12 + 17 + 4);
        assert_eq!(&bytes[..2], &[0xBE, 0xEF]);
        assert_eq!(bytes[2], 0x01); // RD only

        let parsed = DNSPacket::parse(&bytes).unwrap();
        assert_eq!(parsed.header.id, 0xBEEF);
        assert!(parsed.header.rd);
        assert!(!parsed.header.qr);
        assert_eq!(parsed.questions, vec![question]);
    }

    #[test]
    fn test_parse_compressed_answer() {
        // Response for www.example.com CNAME example.com, target compressed
        let mut bytes = vec![
            0x12, 0x34, 0x81, 0x80, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
        ];
        bytes.push(3);
        bytes.extend_from_slice(b"www");
        bytes.push(7);
        bytes.extend_from_slice(b"example");
        bytes.push(3);
        bytes.extend_from_slice(b"com");
        bytes.push(0);
        bytes.extend_from_slice(&[0x00, 0x05, 0x00, 0x01]);
        // answer: name pointer to question (offset 12), CNAME IN, ttl 60
        bytes.extend_from_slice(&[0xC0, 0x0C, 0x00, 0x05, 0x00, 0x01, 0x00, 0x00, 0x00, 0x3C]);
        // rdata: pointer to "example.com" at offset 16
        bytes.extend_from_slice(&[0x00, 0x02, 0xC0, 0x10]);

        let packet = DNSPacket::parse(&bytes).unwrap();
        assert!(packet.header.qr);
        assert_eq!(packet.answers.len(), 1);
        let answer = &packet.answers[0];
        assert_eq!(answer.name(), "www.example.com.");
        assert_eq!(answer.rtype, DNSResourceType::CNAME);
        assert_eq!(answer.ttl, 60);
        assert_eq!(
            answer.cname_target().unwrap(),
            vec!["example".to_string(), "com".to_string()]
        );
        // Pointer was expanded into a standalone name
        assert_eq!(answer.rdata.len(), 13);
    }

    #[test]
    fn test_truncated_header_rejected() {
        assert!(matches!(
            DNSPacket::parse(&[0x00, 0x01, 0x02]),
            Err(ParseError::InvalidHeader)
        ));
    }
}
