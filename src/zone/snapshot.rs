use std::collections::BTreeMap;
use std::fmt;

use crate::dns::enums::DNSResourceType;
use crate::dns::resource::DNSResource;

/// Immutable record set served by the resolver.
///
/// `ns` is derived from `records` on construction and never edited on its
/// own, so it always equals the NS-type subset of the full set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneSnapshot {
    records: Vec<DNSResource>,
    ns: Vec<DNSResource>,
}

impl ZoneSnapshot {
    /// Build a snapshot, keeping records in file order.
    pub fn from_records(records: Vec<DNSResource>) -> Self {
        let ns = records
            .iter()
            .filter(|r| r.rtype == DNSResourceType::NS)
            .cloned()
            .collect();
        Self { records, ns }
    }

    pub fn records(&self) -> &[DNSResource] {
        &self.records
    }

    /// Authority records of the zone.
    pub fn ns_records(&self) -> &[DNSResource] {
        &self.ns
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> ZoneStats {
        let mut by_type = BTreeMap::new();
        for record in &self.records {
            *by_type.entry(record.rtype.to_string()).or_insert(0) += 1;
        }
        ZoneStats {
            total_records: self.records.len(),
            ns_records: self.ns.len(),
            by_type,
        }
    }
}

/// Record counts of a snapshot, for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneStats {
    pub total_records: usize,
    pub ns_records: usize,
    pub by_type: BTreeMap<String, usize>,
}

impl fmt::Display for ZoneStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} records (", self.total_records)?;
        for (i, (rtype, count)) in self.by_type.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", count, rtype)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::common::name_to_labels;
    use crate::dns::enums::DNSResourceClass;

    fn resource(name: &str, rtype: DNSResourceType) -> DNSResource {
        DNSResource::new(
            name_to_labels(name),
            rtype,
            DNSResourceClass::IN,
            300,
            vec![0],
        )
    }

    #[test]
    fn test_ns_subset_derived() {
        let snapshot = ZoneSnapshot::from_records(vec![
            resource("example.com.", DNSResourceType::NS),
            resource("www.example.com.", DNSResourceType::A),
            resource("example.com.", DNSResourceType::NS),
            resource("sub.example.com.", DNSResourceType::NS),
        ]);

        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.ns_records().len(), 3);
        assert!(
            snapshot
                .ns_records()
                .iter()
                .all(|r| r.rtype == DNSResourceType::NS)
        );
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = ZoneSnapshot::default();
        assert!(snapshot.is_empty());
        assert!(snapshot.ns_records().is_empty());
        assert_eq!(snapshot.stats().to_string(), "0 records ()");
    }

    #[test]
    fn test_stats() {
        let snapshot = ZoneSnapshot::from_records(vec![
            resource("example.com.", DNSResourceType::NS),
            resource("www.example.com.", DNSResourceType::A),
            resource("ftp.example.com.", DNSResourceType::A),
        ]);
        let stats = snapshot.stats();
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.ns_records, 1);
        assert_eq!(stats.to_string(), "3 records (2 A, 1 NS)");
    }
}
