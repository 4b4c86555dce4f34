use crate::dns::DNSPacket;
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::question::DNSQuestion;
use crate::dns::resource::DNSResource;
use crate::error::{DnsError, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

/// Relays single questions to an upstream DNS server.
#[derive(Debug, Clone)]
pub struct Forwarder {
    timeout: Duration,
}

impl Forwarder {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Ask `server` for `(qname, qtype)` and return its answer records.
    ///
    /// Failures are logged and yield an empty answer; they never abort the
    /// query being resolved.
    pub async fn forward(
        &self,
        server: SocketAddr,
        qname: &[String],
        qtype: DNSResourceType,
    ) -> Vec<DNSResource> {
        let question = DNSQuestion {
            labels: qname.to_vec(),
            qtype,
            qclass: DNSResourceClass::IN,
        };
        let query = DNSPacket::query(rand::random::<u16>(), question);

        match self.exchange(server, &query).await {
            Ok(response) => {
                debug!(
                    "Upstream {} returned {} answers for {} {}",
                    server,
                    response.answers.len(),
                    query.questions[0].name(),
                    qtype
                );
                response.answers
            }
            Err(e) => {
                warn!(
                    "Forwarding {} {} to {} failed: {}",
                    query.questions[0].name(),
                    qtype,
                    server,
                    e
                );
                Vec::new()
            }
        }
    }

    /// Send `query` to `server` within the configured timeout, UDP first and
    /// TCP when the UDP answer is truncated.
    pub async fn exchange(&self, server: SocketAddr, query: &DNSPacket) -> Result<DNSPacket> {
        let query_bytes = query.serialize()?;
        trace!("Sending {} bytes to upstream {}", query_bytes.len(), server);

        let exchange = async {
            let response = self.send_udp_query(&query_bytes, server).await?;
            if response.header.tc {
                debug!("UDP response truncated, retrying with TCP");
                self.send_tcp_query(&query_bytes, server).await
            } else {
                Ok(response)
            }
        };

        let response = timeout(self.timeout, exchange)
            .await
            .map_err(|_| DnsError::ForwardingFailure {
                server: server.to_string(),
                reason: format!("no response within {:?}", self.timeout),
            })??;

        if response.header.id != query.header.id || !response.header.qr {
            return Err(DnsError::ForwardingFailure {
                server: server.to_string(),
                reason: format!(
                    "unexpected response (id {} qr {}) to query {}",
                    response.header.id, response.header.qr, query.header.id
                ),
            });
        }
        Ok(response)
    }

    async fn send_udp_query(&self, query_bytes: &[u8], server: SocketAddr) -> Result<DNSPacket> {
        let local: SocketAddr = if server.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(server).await?;
        socket.send(query_bytes).await?;

        let mut response_buf = vec![0u8; 4096];
        let response_len = socket.recv(&mut response_buf).await?;
        trace!(
            "Raw UDP response data ({} bytes): {:02x?}",
            response_len,
            &response_buf[..response_len.min(64)]
        );

        DNSPacket::parse(&response_buf[..response_len]).map_err(|e| {
            debug!("Failed to parse UDP response from {}: {}", server, e);
            DnsError::ForwardingFailure {
                server: server.to_string(),
                reason: format!("malformed response: {}", e),
            }
        })
    }

    async fn send_tcp_query(&self, query_bytes: &[u8], server: SocketAddr) -> Result<DNSPacket> {
        let mut stream = TcpStream::connect(server).await?;

        let query_length = u16::try_from(query_bytes.len()).map_err(|_| {
            DnsError::InvalidPacket(format!("{} byte query exceeds TCP framing", query_bytes.len()))
        })?;
        stream.write_all(&query_length.to_be_bytes()).await?;
        stream.write_all(query_bytes).await?;
        stream.flush().await?;

        let mut length_buf = [0u8; 2];
        stream.read_exact(&mut length_buf).await?;
        let response_length = u16::from_be_bytes(length_buf) as usize;

        let mut response_buf = vec![0; response_length];
        stream.read_exact(&mut response_buf).await?;

        DNSPacket::parse(&response_buf).map_err(|e| {
            debug!("Failed to parse TCP response from {}: {}", server, e);
            DnsError::ForwardingFailure {
                server: server.to_string(),
                reason: format!("malformed response: {}", e),
            }
        })
    }
}
