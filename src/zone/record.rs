use std::net::{Ipv4Addr, Ipv6Addr};

use crate::dns::common::{encode_name, name_to_labels};
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::resource::DNSResource;

/// A single resource record as written in a zone file, before its rdata is
/// converted to wire format.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneRecord {
    /// Owner name, fully qualified
    pub name: String,
    /// Time to live in seconds
    pub ttl: u32,
    /// Record class (usually IN)
    pub class: DNSResourceClass,
    /// Record type (A, AAAA, MX, etc.)
    pub rtype: DNSResourceType,
    /// Record data in text format
    pub rdata: String,
}

impl ZoneRecord {
    pub fn new(
        name: String,
        ttl: u32,
        class: DNSResourceClass,
        rtype: DNSResourceType,
        rdata: String,
    ) -> Self {
        Self {
            name,
            ttl,
            class,
            rtype,
            rdata,
        }
    }

    /// Convert to a wire-format resource. Relative names inside the rdata
    /// are qualified with `origin`.
    pub fn to_dns_resource(&self, origin: &str) -> Result<DNSResource, String> {
        let rdata = self.parse_rdata(origin)?;
        if rdata.len() > u16::MAX as usize {
            return Err(format!(
                "RDATA is {} bytes, the limit is {}",
                rdata.len(),
                u16::MAX
            ));
        }
        Ok(DNSResource::new(
            name_to_labels(&self.name),
            self.rtype,
            self.class,
            self.ttl,
            rdata,
        ))
    }

    fn parse_rdata(&self, origin: &str) -> Result<Vec<u8>, String> {
        match self.rtype {
            DNSResourceType::A => self.parse_a_record(),
            DNSResourceType::AAAA => self.parse_aaaa_record(),
            DNSResourceType::NS | DNSResourceType::CNAME | DNSResourceType::PTR => {
                encode_domain_name(self.rdata.trim(), origin)
            }
            DNSResourceType::SOA => self.parse_soa_record(origin),
            DNSResourceType::MX => self.parse_mx_record(origin),
            DNSResourceType::TXT => Ok(self.parse_txt_record()),
            DNSResourceType::SRV => self.parse_srv_record(origin),
            DNSResourceType::CAA => self.parse_caa_record(),
            _ => Err(format!(
                "Unsupported record type for zone files: {}",
                self.rtype
            )),
        }
    }

    fn parse_a_record(&self) -> Result<Vec<u8>, String> {
        let addr: Ipv4Addr = self
            .rdata
            .trim()
            .parse()
            .map_err(|_| format!("Invalid IPv4 address: {}", self.rdata))?;
        Ok(addr.octets().to_vec())
    }

    fn parse_aaaa_record(&self) -> Result<Vec<u8>, String> {
        let addr: Ipv6Addr = self
            .rdata
            .trim()
            .parse()
            .map_err(|_| format!("Invalid IPv6 address: {}", self.rdata))?;
        Ok(addr.octets().to_vec())
    }

    /// SOA: mname rname serial refresh retry expire minimum
    fn parse_soa_record(&self, origin: &str) -> Result<Vec<u8>, String> {
        let parts: Vec<&str> = self.rdata.split_whitespace().collect();
        if parts.len() != 7 {
            return Err(format!("SOA record requires 7 fields, got {}", parts.len()));
        }

        let mut rdata = encode_domain_name(parts[0], origin)?;
        rdata.extend_from_slice(&encode_domain_name(parts[1], origin)?);

        for part in &parts[2..] {
            let value: u32 = part
                .parse()
                .map_err(|_| format!("Invalid SOA numeric value: {}", part))?;
            rdata.extend_from_slice(&value.to_be_bytes());
        }

        Ok(rdata)
    }

    fn parse_mx_record(&self, origin: &str) -> Result<Vec<u8>, String> {
        let parts: Vec<&str> = self.rdata.split_whitespace().collect();
        if parts.len() != 2 {
            return Err(format!("MX record requires 2 fields, got {}", parts.len()));
        }

        let priority: u16 = parts[0]
            .parse()
            .map_err(|_| format!("Invalid MX priority: {}", parts[0]))?;

        let mut rdata = priority.to_be_bytes().to_vec();
        rdata.extend_from_slice(&encode_domain_name(parts[1], origin)?);
        Ok(rdata)
    }

    /// TXT: one or more quoted character-strings. Unquoted text is treated as
    /// a single string; strings longer than 255 bytes are split.
    fn parse_txt_record(&self) -> Vec<u8> {
        let mut strings = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut saw_quotes = false;

        for ch in self.rdata.chars() {
            match ch {
                '"' => {
                    if in_quotes {
                        strings.push(std::mem::take(&mut current));
                    }
                    in_quotes = !in_quotes;
                    saw_quotes = true;
                }
                _ if in_quotes => current.push(ch),
                _ => {}
            }
        }
        if !saw_quotes {
            strings.push(self.rdata.trim().to_string());
        }

        let mut rdata = Vec::new();
        for text in strings {
            if text.is_empty() {
                rdata.push(0);
                continue;
            }
            for chunk in text.as_bytes().chunks(255) {
                rdata.push(chunk.len() as u8);
                rdata.extend_from_slice(chunk);
            }
        }
        rdata
    }

    /// SRV: priority weight port target
    fn parse_srv_record(&self, origin: &str) -> Result<Vec<u8>, String> {
        let parts: Vec<&str> = self.rdata.split_whitespace().collect();
        if parts.len() != 4 {
            return Err(format!("SRV record requires 4 fields, got {}", parts.len()));
        }

        let mut rdata = Vec::new();
        for (label, field) in ["priority", "weight", "port"].iter().zip(&parts[..3]) {
            let value: u16 = field
                .parse()
                .map_err(|_| format!("Invalid SRV {}: {}", label, field))?;
            rdata.extend_from_slice(&value.to_be_bytes());
        }
        rdata.extend_from_slice(&encode_domain_name(parts[3], origin)?);
        Ok(rdata)
    }

    /// CAA: flags tag value
    fn parse_caa_record(&self) -> Result<Vec<u8>, String> {
        let parts: Vec<&str> = self.rdata.splitn(3, char::is_whitespace).collect();
        if parts.len() != 3 {
            return Err(format!("CAA record requires 3 fields, got {}", parts.len()));
        }

        let flags: u8 = parts[0]
            .parse()
            .map_err(|_| format!("Invalid CAA flags: {}", parts[0]))?;

        let tag = parts[1];
        if tag.is_empty() || tag.len() > 255 {
            return Err(format!("Invalid CAA tag: {}", tag));
        }

        let mut rdata = vec![flags, tag.len() as u8];
        rdata.extend_from_slice(tag.as_bytes());
        rdata.extend_from_slice(parts[2].trim().trim_matches('"').as_bytes());
        Ok(rdata)
    }
}

/// Qualify `name` against `origin` and encode it in wire format.
fn encode_domain_name(name: &str, origin: &str) -> Result<Vec<u8>, String> {
    let qualified = qualify(name, origin);
    let labels = name_to_labels(&qualified);
    if let Some(label) = labels.iter().find(|l| l.len() > 63) {
        return Err(format!("Label too long: {}", label));
    }
    encode_name(&labels).map_err(|e| e.to_string())
}

/// Resolve `@`, relative and absolute names against `origin`.
pub fn qualify(name: &str, origin: &str) -> String {
    let origin = origin.trim_end_matches('.');
    if name == "@" || name.is_empty() {
        format!("{}.", origin)
    } else if name.ends_with('.') {
        name.to_string()
    } else if origin.is_empty() {
        format!("{}.", name)
    } else {
        format!("{}.{}.", name, origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(rtype: DNSResourceType, rdata: &str) -> ZoneRecord {
        ZoneRecord::new(
            "www.example.com.".to_string(),
            300,
            DNSResourceClass::IN,
            rtype,
            rdata.to_string(),
        )
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("@", "example.com."), "example.com.");
        assert_eq!(qualify("www", "example.com."), "www.example.com.");
        assert_eq!(qualify("host.other.", "example.com."), "host.other.");
        assert_eq!(qualify("www", ""), "www.");
    }

    #[test]
    fn test_a_record() {
        let resource = record(DNSResourceType::A, "192.0.2.1")
            .to_dns_resource("example.com.")
            .unwrap();
        assert_eq!(resource.rdata, vec![192, 0, 2, 1]);
        assert_eq!(resource.name(), "www.example.com.");
        assert!(record(DNSResourceType::A, "not-an-ip").to_dns_resource("").is_err());
    }

    #[test]
    fn test_relative_cname_target_is_qualified() {
        let resource = record(DNSResourceType::CNAME, "target")
            .to_dns_resource("example.com.")
            .unwrap();
        assert_eq!(
            resource.cname_target().unwrap(),
            vec!["target", "example", "com"]
        );
    }

    #[test]
    fn test_txt_multiple_strings() {
        let resource = record(DNSResourceType::TXT, r#""v=spf1 " "-all""#)
            .to_dns_resource("example.com.")
            .unwrap();
        let mut expected = vec![7];
        expected.extend_from_slice(b"v=spf1 ");
        expected.push(4);
        expected.extend_from_slice(b"-all");
        assert_eq!(resource.rdata, expected);
    }

    #[test]
    fn test_soa_record_length() {
        let resource = record(
            DNSResourceType::SOA,
            "ns1 admin.example.com. 2024010101 3600 900 604800 86400",
        )
        .to_dns_resource("example.com.")
        .unwrap();
        // ns1.example.com. (17) + admin.example.com. (19) + 5 * 4
        assert_eq!(resource.rdata.len(), 17 + 19 + 20);
    }

    #[test]
    fn test_txt_over_rdata_limit_rejected() {
        let text = "a".repeat(70_000);
        let err = record(DNSResourceType::TXT, &text)
            .to_dns_resource("example.com.")
            .unwrap_err();
        assert!(err.contains("RDATA"));
    }
}
