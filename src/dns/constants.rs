/// DNS Response Code constants from RFC 1035
pub struct DNSRcode;

impl DNSRcode {
    pub const NOERROR: u8 = 0; // No error
    pub const FORMERR: u8 = 1; // Format error
    pub const SERVFAIL: u8 = 2; // Server failure
    pub const NXDOMAIN: u8 = 3; // Name error
    pub const NOTIMP: u8 = 4; // Not implemented
    pub const REFUSED: u8 = 5; // Query refused
}

/// DNS Opcode constants from RFC 1035
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Opcode {
    QUERY = 0,
    IQUERY = 1,
    STATUS = 2,
    NOTIFY = 4,
    UPDATE = 5,
    Other = 15,
}

impl From<u8> for Opcode {
    fn from(value: u8) -> Self {
        match value {
            0 => Opcode::QUERY,
            1 => Opcode::IQUERY,
            2 => Opcode::STATUS,
            4 => Opcode::NOTIFY,
            5 => Opcode::UPDATE,
            _ => Opcode::Other,
        }
    }
}

/// Largest response a plain (non-EDNS) UDP client accepts.
pub const MAX_UDP_PAYLOAD: usize = 512;

/// Largest message carried over TCP (two-byte length prefix).
pub const MAX_TCP_PAYLOAD: usize = 65535;

/// Compression pointers followed before a name is rejected as looping.
pub const MAX_POINTER_HOPS: usize = 32;
