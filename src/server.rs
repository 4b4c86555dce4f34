use crate::config::ServerConfig;
use crate::dns::DNSPacket;
use crate::dns::constants::{DNSRcode, MAX_TCP_PAYLOAD, MAX_UDP_PAYLOAD, Opcode};
use crate::error::Result;
use crate::resolver::ResolutionEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::{Semaphore, broadcast};
use tracing::{debug, error, info, trace, warn};

/// Transport a message arrived on; decides how an oversized reply is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Udp,
    Tcp,
}

impl Transport {
    pub fn max_payload(self) -> usize {
        match self {
            Transport::Udp => MAX_UDP_PAYLOAD,
            Transport::Tcp => MAX_TCP_PAYLOAD,
        }
    }
}

/// UDP (and optionally TCP) listener feeding the resolution engine.
pub struct DnsServer {
    udp: Arc<UdpSocket>,
    tcp: Option<TcpListener>,
    engine: Arc<ResolutionEngine>,
    query_semaphore: Arc<Semaphore>,
}

impl DnsServer {
    /// Bind the listeners. TCP shares the port UDP actually bound, so an
    /// ephemeral port works for both.
    pub async fn bind(config: &ServerConfig, engine: Arc<ResolutionEngine>) -> Result<Self> {
        let udp = UdpSocket::bind(config.bind_addr).await?;
        let udp_addr = udp.local_addr()?;
        info!("UDP DNS server listening on {}", udp_addr);

        let tcp = if config.enable_tcp {
            let listener = TcpListener::bind(udp_addr).await?;
            info!("TCP DNS server listening on {}", listener.local_addr()?);
            Some(listener)
        } else {
            None
        };

        Ok(Self {
            udp: Arc::new(udp),
            tcp,
            engine,
            query_semaphore: Arc::new(Semaphore::new(config.max_concurrent_queries)),
        })
    }

    pub fn udp_addr(&self) -> Result<SocketAddr> {
        Ok(self.udp.local_addr()?)
    }

    pub fn tcp_addr(&self) -> Result<Option<SocketAddr>> {
        match &self.tcp {
            Some(listener) => Ok(Some(listener.local_addr()?)),
            None => Ok(None),
        }
    }

    /// Serve until `shutdown` fires.
    pub async fn run(self, shutdown: broadcast::Receiver<()>) -> Result<()> {
        let udp = run_udp_server(
            self.udp,
            self.engine.clone(),
            self.query_semaphore.clone(),
            shutdown.resubscribe(),
        );

        match self.tcp {
            Some(listener) => {
                let tcp = run_tcp_server(listener, self.engine, self.query_semaphore, shutdown);
                let (udp_result, tcp_result) = tokio::join!(udp, tcp);
                udp_result.and(tcp_result)
            }
            None => udp.await,
        }
    }
}

/// Run UDP server with graceful shutdown support
async fn run_udp_server(
    sock: Arc<UdpSocket>,
    engine: Arc<ResolutionEngine>,
    query_semaphore: Arc<Semaphore>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let mut buf = vec![0u8; 4096];

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("UDP server received shutdown signal");
                break;
            }

            result = sock.recv_from(&mut buf) => {
                let (read_bytes, src_addr) = match result {
                    Ok(received) => received,
                    Err(e) => {
                        // ICMP errors from earlier replies surface here; keep serving
                        warn!("UDP receive error: {}", e);
                        continue;
                    }
                };

                let permit = match query_semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!(
                            "Max concurrent queries reached, dropping query from {}",
                            src_addr
                        );
                        continue;
                    }
                };

                let engine = engine.clone();
                let query_data = buf[..read_bytes].to_vec();
                let sock = sock.clone();

                tokio::spawn(async move {
                    let _permit = permit;

                    if let Some(response) = handle_dns_query(&query_data, &engine, Transport::Udp).await {
                        if let Err(e) = sock.send_to(&response, src_addr).await {
                            error!("Failed to send UDP response to {}: {}", src_addr, e);
                        }
                    }
                });
            }
        }
    }

    info!("UDP server shutdown complete");
    Ok(())
}

/// Run TCP server with graceful shutdown support
async fn run_tcp_server(
    listener: TcpListener,
    engine: Arc<ResolutionEngine>,
    query_semaphore: Arc<Semaphore>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("TCP server received shutdown signal");
                break;
            }

            result = listener.accept() => {
                let (stream, src_addr) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("TCP accept error: {}", e);
                        continue;
                    }
                };
                let engine = engine.clone();
                let query_semaphore = query_semaphore.clone();

                tokio::spawn(async move {
                    if let Err(e) = handle_tcp_connection(stream, src_addr, engine, query_semaphore).await {
                        debug!("TCP connection error from {}: {}", src_addr, e);
                    }
                });
            }
        }
    }

    info!("TCP server shutdown complete");
    Ok(())
}

async fn handle_tcp_connection(
    mut stream: TcpStream,
    src_addr: SocketAddr,
    engine: Arc<ResolutionEngine>,
    query_semaphore: Arc<Semaphore>,
) -> Result<()> {
    let mut length_buf = [0u8; 2];

    loop {
        match stream.read_exact(&mut length_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("TCP connection closed by client {}", src_addr);
                break;
            }
            Err(e) => return Err(e.into()),
        }

        let message_length = u16::from_be_bytes(length_buf) as usize;
        let mut message_buf = vec![0u8; message_length];
        stream.read_exact(&mut message_buf).await?;

        let _permit = match query_semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    "Max concurrent queries reached, closing TCP connection from {}",
                    src_addr
                );
                break;
            }
        };

        match handle_dns_query(&message_buf, &engine, Transport::Tcp).await {
            Some(response_data) => {
                let Ok(response_length) = u16::try_from(response_data.len()) else {
                    error!(
                        "Refusing to frame {} byte TCP response to {}",
                        response_data.len(),
                        src_addr
                    );
                    break;
                };
                stream.write_all(&response_length.to_be_bytes()).await?;
                stream.write_all(&response_data).await?;
                stream.flush().await?;
            }
            None => break,
        }
    }

    Ok(())
}

/// Decode one message, resolve it, and encode the reply.
///
/// Returns `None` for input that gets no reply at all: messages without a
/// readable header and messages that are themselves responses. A query whose
/// body does not decode gets FORMERR.
///
/// Replies over the transport's payload limit are truncated on UDP and
/// replaced with SERVFAIL on TCP, where the client has nowhere to retry.
pub async fn handle_dns_query(
    buf: &[u8],
    engine: &ResolutionEngine,
    transport: Transport,
) -> Option<Vec<u8>> {
    let query = match DNSPacket::parse(buf) {
        Ok(query) => query,
        Err(e) => {
            return match DNSPacket::format_error_reply(buf) {
                Some(reply) => {
                    debug!("Answering FORMERR to malformed query id={}: {}", reply.header.id, e);
                    reply.serialize().ok()
                }
                None => {
                    debug!("Dropping malformed DNS message: {}", e);
                    None
                }
            };
        }
    };
    if query.header.qr {
        debug!("Dropping DNS response sent to the server (id {})", query.header.id);
        return None;
    }
    trace!("Received query id={} questions={}", query.header.id, query.questions.len());

    let mut response = if Opcode::from(query.header.opcode) != Opcode::QUERY {
        debug!("Opcode {} not implemented", query.header.opcode);
        DNSPacket::error_response(&query, DNSRcode::NOTIMP)
    } else {
        engine.resolve(&query).await.into_response(&query)
    };

    let mut bytes = match response.serialize() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            DNSPacket::error_response(&query, DNSRcode::SERVFAIL)
                .serialize()
                .ok()?
        }
    };

    let limit = transport.max_payload();
    if bytes.len() > limit {
        match transport {
            Transport::Udp => {
                debug!(
                    "Response too large for UDP ({}>{} bytes), sending truncated response",
                    bytes.len(),
                    limit
                );
                response.truncate();
                bytes = response.serialize().ok()?;
            }
            Transport::Tcp => {
                warn!(
                    "Response too large for TCP ({}>{} bytes), answering SERVFAIL",
                    bytes.len(),
                    limit
                );
                bytes = DNSPacket::error_response(&query, DNSRcode::SERVFAIL)
                    .serialize()
                    .ok()?;
            }
        }
    }

    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::enums::{DNSResourceClass, DNSResourceType};
    use crate::dns::question::DNSQuestion;
    use crate::zone::{RecordStore, ZoneSnapshot, parse_zone_text};

    fn engine(zone: &str) -> ResolutionEngine {
        let config = ServerConfig {
            forward_server: None,
            ..Default::default()
        };
        let store = Arc::new(RecordStore::new());
        store.replace(ZoneSnapshot::from_records(
            parse_zone_text(zone.as_bytes(), "", "test").unwrap(),
        ));
        ResolutionEngine::new(&config, store)
    }

    fn query_bytes(name: &str, qtype: DNSResourceType) -> Vec<u8> {
        DNSPacket::query(99, DNSQuestion::new(name, qtype, DNSResourceClass::IN))
            .serialize()
            .unwrap()
    }

    #[tokio::test]
    async fn test_notimp_for_other_opcodes() {
        let engine = engine("a.example. 60 IN A 10.0.0.1\n");
        let mut query = DNSPacket::query(
            5,
            DNSQuestion::new("a.example.", DNSResourceType::A, DNSResourceClass::IN),
        );
        query.header.opcode = Opcode::STATUS as u8;

        let bytes = handle_dns_query(&query.serialize().unwrap(), &engine, Transport::Tcp)
            .await
            .unwrap();
        let response = DNSPacket::parse(&bytes).unwrap();
        assert_eq!(response.header.rcode, DNSRcode::NOTIMP);
        assert!(response.answers.is_empty());
    }

    #[tokio::test]
    async fn test_garbage_and_responses_dropped() {
        let engine = engine("a.example. 60 IN A 10.0.0.1\n");
        assert!(handle_dns_query(&[1, 2, 3], &engine, Transport::Udp).await.is_none());

        let mut response = DNSPacket::query(
            5,
            DNSQuestion::new("a.example.", DNSResourceType::A, DNSResourceClass::IN),
        );
        response.header.qr = true;
        assert!(
            handle_dns_query(&response.serialize().unwrap(), &engine, Transport::Udp)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_large_udp_response_truncated() {
        let mut zone = String::new();
        for i in 0..40 {
            zone.push_str(&format!("big.example. 60 IN A 10.0.0.{}\n", i));
        }
        let engine = engine(&zone);
        let query = query_bytes("big.example.", DNSResourceType::A);

        let udp = handle_dns_query(&query, &engine, Transport::Udp)
            .await
            .unwrap();
        assert!(udp.len() <= MAX_UDP_PAYLOAD);
        let response = DNSPacket::parse(&udp).unwrap();
        assert!(response.header.tc);
        assert!(response.answers.is_empty());

        let tcp = handle_dns_query(&query, &engine, Transport::Tcp).await.unwrap();
        let response = DNSPacket::parse(&tcp).unwrap();
        assert!(!response.header.tc);
        assert_eq!(response.answers.len(), 40);
    }

    #[tokio::test]
    async fn test_undecodable_query_gets_formerr() {
        let engine = engine("a.example. 60 IN A 10.0.0.1\n");
        let mut query = query_bytes("a.example.", DNSResourceType::A);
        // First label "a" becomes a non-UTF-8 byte
        query[13] = 0xff;

        let bytes = handle_dns_query(&query, &engine, Transport::Udp)
            .await
            .unwrap();
        let response = DNSPacket::parse(&bytes).unwrap();
        assert_eq!(response.header.id, 99);
        assert!(response.header.qr);
        assert_eq!(response.header.rcode, DNSRcode::FORMERR);
        assert!(response.questions.is_empty());
    }

    #[tokio::test]
    async fn test_tcp_response_over_frame_limit_is_servfail() {
        let text = "t".repeat(250);
        let mut zone = String::new();
        for i in 0..300 {
            zone.push_str(&format!("big.example. 60 IN TXT \"{:03}{}\"\n", i, text));
        }
        let engine = engine(&zone);
        let query = query_bytes("big.example.", DNSResourceType::TXT);

        let tcp = handle_dns_query(&query, &engine, Transport::Tcp)
            .await
            .unwrap();
        assert!(tcp.len() <= MAX_TCP_PAYLOAD);
        let response = DNSPacket::parse(&tcp).unwrap();
        assert_eq!(response.header.rcode, DNSRcode::SERVFAIL);
        assert!(response.answers.is_empty());
        assert_eq!(response.questions.len(), 1);
    }
}
