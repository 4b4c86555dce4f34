//! Shared helpers for the integration tests.

#![allow(dead_code)] // Not every test file uses every helper

use bifrost::{
    config::ServerConfig,
    dns::{
        DNSPacket,
        common::name_to_labels,
        enums::{DNSResourceClass, DNSResourceType},
        question::DNSQuestion,
        resource::DNSResource,
    },
    resolver::ResolutionEngine,
    zone::{RecordStore, ZoneLoader, load_initial},
};
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::net::UdpSocket;

/// Create a basic test DNS query packet
pub fn create_test_query(domain: &str, qtype: DNSResourceType) -> DNSPacket {
    create_test_query_with_id(1234, domain, qtype)
}

/// Create a test DNS query packet with specific ID
pub fn create_test_query_with_id(id: u16, domain: &str, qtype: DNSResourceType) -> DNSPacket {
    DNSPacket::query(id, DNSQuestion::new(domain, qtype, DNSResourceClass::IN))
}

pub fn a_record(name: &str, ttl: u32, octets: [u8; 4]) -> DNSResource {
    DNSResource::new(
        name_to_labels(name),
        DNSResourceType::A,
        DNSResourceClass::IN,
        ttl,
        octets.to_vec(),
    )
}

/// Write zone text to a fresh temporary file
pub fn write_zone(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp zone");
    file.write_all(contents.as_bytes()).expect("write temp zone");
    file.flush().expect("flush temp zone");
    file
}

/// Config with forwarding off unless a server is given
pub fn test_config(forward_server: Option<SocketAddr>) -> ServerConfig {
    ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        forward_server,
        ..Default::default()
    }
}

/// Store loaded from `path`, plus an engine over it
pub async fn engine_for_zone(
    path: &Path,
    forward_server: Option<SocketAddr>,
) -> (Arc<RecordStore>, Arc<ResolutionEngine>) {
    let store = Arc::new(RecordStore::new());
    load_initial(&ZoneLoader::new(path, None), &store)
        .await
        .expect("initial zone load");
    let engine = Arc::new(ResolutionEngine::new(&test_config(forward_server), store.clone()));
    (store, engine)
}

/// UDP upstream on 127.0.0.1 that answers every question with the given
/// records (owner rewritten to the queried name). Counts the queries it saw.
pub struct MockUpstream {
    pub addr: SocketAddr,
    pub queries: Arc<AtomicUsize>,
}

impl MockUpstream {
    pub async fn start(answer_octets: Vec<[u8; 4]>) -> Self {
        Self::start_with_delay(answer_octets, Duration::ZERO).await
    }

    /// Like `start`, but each reply is sent `delay` after its query arrived.
    /// Replies are sent from separate tasks, so queries overlap.
    pub async fn start_with_delay(answer_octets: Vec<[u8; 4]>, delay: Duration) -> Self {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let addr = socket.local_addr().unwrap();
        let queries = Arc::new(AtomicUsize::new(0));
        let seen = queries.clone();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                    break;
                };
                let Ok(query) = DNSPacket::parse(&buf[..len]) else {
                    continue;
                };
                seen.fetch_add(1, Ordering::SeqCst);

                let mut response = DNSPacket::response_to(&query);
                response.header.ra = true;
                for octets in &answer_octets {
                    response.answers.push(DNSResource::new(
                        query.questions[0].labels.clone(),
                        DNSResourceType::A,
                        DNSResourceClass::IN,
                        30,
                        octets.to_vec(),
                    ));
                }
                let bytes = response.serialize().unwrap();
                let socket = socket.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = socket.send_to(&bytes, peer).await;
                });
            }
        });

        Self { addr, queries }
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}
