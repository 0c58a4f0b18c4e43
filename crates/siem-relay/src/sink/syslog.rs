//! Syslog sink
//!
//! Wraps each event's CEF line in an RFC-3164 header and writes it over TCP
//! or UDP. One network write per event; there is no batch protocol.

use super::{Sink, SinkKind};
use crate::config::{SyslogConfig, SyslogTransport};
use crate::error::{ConfigError, SinkError};
use crate::event::Event;
use crate::format::{local_hostname, CefFormatter};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};

/// local0.info
pub const SYSLOG_PRIORITY: u8 = 134;

/// Connect timeout for TCP transport
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SyslogSink {
    name: String,
    host: String,
    port: u16,
    transport: SyslogTransport,
    tag: String,
    hostname: String,
    formatter: CefFormatter,
}

impl SyslogSink {
    pub fn new(config: &SyslogConfig) -> Result<Self, ConfigError> {
        if config.host.is_empty() {
            return Err(ConfigError::MissingField("host"));
        }

        let hostname = local_hostname();
        Ok(Self {
            name: format!("syslog:{}:{}/{}", config.host, config.port, config.transport),
            host: config.host.clone(),
            port: config.port,
            transport: config.transport,
            tag: config.tag.clone(),
            formatter: CefFormatter::with_host(hostname.clone()),
            hostname,
        })
    }

    /// Override the reported hostname (syslog header and CEF `src`).
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self.formatter = CefFormatter::with_host(self.hostname.clone());
        self
    }

    /// Build the RFC-3164 line for `event` stamped with `now`.
    pub fn frame(&self, event: &Event, now: DateTime<Local>) -> String {
        format!(
            "<{}>{} {} {}: {}\n",
            SYSLOG_PRIORITY,
            now.format("%b %e %H:%M:%S"),
            self.hostname,
            self.tag,
            self.formatter.format(event)
        )
    }

    async fn resolve(&self) -> Result<SocketAddr, SinkError> {
        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await?
            .next()
            .ok_or_else(|| SinkError::Connection(format!("no address for {}", self.host)))
    }

    async fn send_tcp(&self, message: &[u8]) -> Result<(), SinkError> {
        let addr = self.resolve().await?;
        let mut stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| SinkError::Timeout)?
            .map_err(|e| SinkError::Connection(e.to_string()))?;

        stream.write_all(message).await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok(())
    }

    async fn send_udp(&self, message: &[u8]) -> Result<(), SinkError> {
        let addr = self.resolve().await?;
        let bind = if addr.is_ipv6() {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        };

        let socket = UdpSocket::bind(bind).await?;
        socket.send_to(message, addr).await?;
        Ok(())
    }
}

#[async_trait]
impl Sink for SyslogSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Syslog
    }

    async fn send_event(&self, event: &Event) -> Result<(), SinkError> {
        let message = self.frame(event, Local::now());

        match self.transport {
            SyslogTransport::Tcp => self.send_tcp(message.as_bytes()).await?,
            SyslogTransport::Udp => self.send_udp(message.as_bytes()).await?,
        }

        tracing::debug!(sink = %self.name, event_id = %event.id(), "Sent event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::DeliveryOutcome;
    use chrono::TimeZone;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn event(id: &str) -> Event {
        Event::threat("Defender", "alice@corp.com", 0.9, "blocked").id(id).build()
    }

    fn sink(port: u16, transport: &str) -> SyslogSink {
        let config = SyslogConfig::new("127.0.0.1", port, transport).unwrap();
        SyslogSink::new(&config).unwrap().with_hostname("relay-01")
    }

    #[test]
    fn test_frame_layout() {
        let sink = sink(514, "tcp");
        let now = Local.with_ymd_and_hms(2024, 3, 5, 9, 7, 2).unwrap();

        let line = sink.frame(&event("e1"), now);

        assert!(line.starts_with("<134>Mar  5 09:07:02 relay-01 opensase: CEF:0|"));
        assert!(line.contains("src=relay-01"));
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn test_name_and_kind() {
        let sink = sink(1514, "udp");
        assert_eq!(sink.name(), "syslog:127.0.0.1:1514/udp");
        assert_eq!(sink.kind(), SinkKind::Syslog);
        assert!(!sink.supports_batch());
    }

    #[test]
    fn test_empty_host_rejected() {
        let config = SyslogConfig::new("", 514, "tcp").unwrap();
        assert!(matches!(
            SyslogSink::new(&config),
            Err(ConfigError::MissingField("host"))
        ));
    }

    #[tokio::test]
    async fn test_tcp_one_connection_per_event() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let mut lines = Vec::new();
            for _ in 0..2 {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut buf = String::new();
                stream.read_to_string(&mut buf).await.unwrap();
                lines.push(buf);
            }
            lines
        });

        let outcome = sink(port, "tcp").submit(&[event("a"), event("b")]).await;
        assert_eq!(outcome, DeliveryOutcome::delivered(2));

        let lines = server.await.unwrap();
        assert!(lines[0].starts_with("<134>"));
        assert!(lines[0].contains("relay-01 opensase: CEF:0|"));
        assert!(lines[0].ends_with('\n'));
        assert!(lines[1].contains("suser=alice@corp.com"));
    }

    #[tokio::test]
    async fn test_udp_datagram_per_event() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let outcome = sink(port, "udp").submit(&[event("a")]).await;
        assert_eq!(outcome, DeliveryOutcome::delivered(1));

        let mut buf = vec![0u8; 4096];
        let (n, _) = receiver.recv_from(&mut buf).await.unwrap();
        let datagram = String::from_utf8_lossy(&buf[..n]);
        assert!(datagram.starts_with("<134>"));
        assert!(datagram.contains("|threat_detected|blocked|10|"));
    }

    #[tokio::test]
    async fn test_tcp_refused_counts_failed() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let outcome = sink(port, "tcp").submit(&[event("a"), event("b")]).await;
        assert_eq!(outcome, DeliveryOutcome::failed(2));
    }
}
