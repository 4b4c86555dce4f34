use crate::config::{ChaseMode, ServerConfig};
use crate::dns::DNSPacket;
use crate::dns::common::{labels_to_name, names_equal};
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::question::DNSQuestion;
use crate::dns::resource::DNSResource;
use crate::forwarder::Forwarder;
use crate::zone::{RecordStore, ZoneSnapshot};
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Records and flags for one response, built fresh per query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Answer {
    pub answers: Vec<DNSResource>,
    /// Zone NS records, present when the zone asserts authority
    pub authorities: Option<Vec<DNSResource>>,
    pub authoritative: bool,
    pub recursion_available: bool,
}

impl Answer {
    /// Build the response message for `query`.
    pub fn into_response(self, query: &DNSPacket) -> DNSPacket {
        let mut response = DNSPacket::response_to(query);
        response.header.aa = self.authoritative;
        response.header.ra = self.recursion_available;
        response.answers = self.answers;
        response.authorities = self.authorities.unwrap_or_default();
        response
    }
}

/// Per-question result.
struct QuestionAnswer {
    records: Vec<DNSResource>,
    /// Answered by the upstream rather than the zone
    forwarded: bool,
}

type ChaseKey = (String, DNSResourceType);

/// Holds one slot of a loopback chase counter; releasing it drops the entry
/// once no chase of that key remains.
struct ChaseGuard<'a> {
    in_flight: &'a DashMap<ChaseKey, usize>,
    key: ChaseKey,
}

impl<'a> ChaseGuard<'a> {
    /// Take a slot and return the number of chases of `key` now in flight.
    fn acquire(in_flight: &'a DashMap<ChaseKey, usize>, key: ChaseKey) -> (Self, usize) {
        let count = {
            let mut entry = in_flight.entry(key.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        (Self { in_flight, key }, count)
    }
}

impl Drop for ChaseGuard<'_> {
    fn drop(&mut self) {
        if let Some(mut count) = self.in_flight.get_mut(&self.key) {
            *count = count.saturating_sub(1);
        }
        self.in_flight.remove_if(&self.key, |_, count| *count == 0);
    }
}

/// Answers questions from the current zone snapshot, chasing CNAMEs and
/// falling back to the forward server.
pub struct ResolutionEngine {
    store: Arc<RecordStore>,
    forwarder: Forwarder,
    forward_server: Option<SocketAddr>,
    self_addr: SocketAddr,
    chase_mode: ChaseMode,
    max_cname_depth: usize,
    /// Loopback chases currently waiting on our own listener, per target.
    /// Nested self-queries share the map, so a cycle shows up as a climbing
    /// count for one key.
    in_flight: DashMap<ChaseKey, usize>,
}

impl ResolutionEngine {
    pub fn new(config: &ServerConfig, store: Arc<RecordStore>) -> Self {
        Self {
            store,
            forwarder: Forwarder::new(config.forward_timeout),
            forward_server: config.forward_server,
            self_addr: config.self_addr(),
            chase_mode: config.cname_chase,
            max_cname_depth: config.max_cname_depth,
            in_flight: DashMap::new(),
        }
    }

    /// Override the address used for loopback CNAME chases.
    pub fn with_self_addr(mut self, self_addr: SocketAddr) -> Self {
        self.self_addr = self_addr;
        self
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Resolve every question of `query` against one consistent snapshot.
    pub async fn resolve(&self, query: &DNSPacket) -> Answer {
        let snapshot = self.store.snapshot();
        self.resolve_questions(&query.questions, &snapshot).await
    }

    pub async fn resolve_questions(
        &self,
        questions: &[DNSQuestion],
        snapshot: &ZoneSnapshot,
    ) -> Answer {
        let mut answer = Answer {
            recursion_available: self.forward_server.is_some(),
            ..Default::default()
        };
        let mut all_forwarded = !questions.is_empty();

        for question in questions {
            debug!(
                "Resolving {} {} {}",
                question.name(),
                question.qtype,
                question.qclass
            );
            let result = self
                .resolve_question(&question.labels, question.qtype, question.qclass, snapshot, 0)
                .await;

            if !result.forwarded && answer.authorities.is_none() {
                answer.authorities = Some(snapshot.ns_records().to_vec());
            }
            all_forwarded &= result.forwarded;
            answer.answers.extend(result.records);
        }

        answer.authoritative = !all_forwarded;
        answer
    }

    fn resolve_question<'a>(
        &'a self,
        qname: &'a [String],
        qtype: DNSResourceType,
        qclass: DNSResourceClass,
        snapshot: &'a ZoneSnapshot,
        depth: usize,
    ) -> BoxFuture<'a, QuestionAnswer> {
        async move {
            let mut records = Vec::new();

            for record in snapshot.records() {
                if !names_equal(&record.labels, qname) {
                    continue;
                }

                let is_cname = record.rtype == DNSResourceType::CNAME;
                let cname_rule = is_cname || qtype == DNSResourceType::CNAME;
                let exact_rule = record.rtype == qtype && record.rclass == qclass;
                if !cname_rule && !exact_rule {
                    continue;
                }

                trace!("Matched {}", record);
                records.push(record.clone());

                if is_cname {
                    if let Some(target) = record.cname_target() {
                        let chased = self
                            .chase(&target, qtype, qclass, snapshot, depth + 1)
                            .await;
                        records.extend(chased);
                    }
                }
            }

            if records.is_empty() {
                if let Some(server) = self.forward_server {
                    return QuestionAnswer {
                        records: self.forwarder.forward(server, qname, qtype).await,
                        forwarded: true,
                    };
                }
            }

            QuestionAnswer {
                records,
                forwarded: false,
            }
        }
        .boxed()
    }

    async fn chase(
        &self,
        target: &[String],
        qtype: DNSResourceType,
        qclass: DNSResourceClass,
        snapshot: &ZoneSnapshot,
        depth: usize,
    ) -> Vec<DNSResource> {
        if depth > self.max_cname_depth {
            warn!(
                "CNAME chain exceeds {} hops at {}, returning partial answer",
                self.max_cname_depth,
                labels_to_name(target)
            );
            return Vec::new();
        }

        match self.chase_mode {
            ChaseMode::InProcess => {
                self.resolve_question(target, qtype, qclass, snapshot, depth)
                    .await
                    .records
            }
            ChaseMode::Loopback => {
                let key = (labels_to_name(target).to_lowercase(), qtype);
                let (_guard, count) = ChaseGuard::acquire(&self.in_flight, key);
                if count > self.max_cname_depth {
                    warn!(
                        "{} loopback chases of {} {} in flight, not chasing",
                        count,
                        labels_to_name(target),
                        qtype
                    );
                    return Vec::new();
                }
                self.forwarder.forward(self.self_addr, target, qtype).await
            }
        }
    }
}
