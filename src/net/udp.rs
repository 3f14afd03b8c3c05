use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::camera_state::CameraState;
use crate::config::{CameraEndpoint, ConfigStore};
use crate::error::{ConfigError, EncodingError, TransportError};
use crate::protocol::{build_packet, normalize_payload, SequenceCounter, ViscaHeader};

/// Outcome of a delivered command. Both variants count as success: the
/// camera does not answer every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Replied { bytes: usize },
    NoReply,
}

/// VISCA command channel.
///
/// One command is in flight at a time process-wide: the send lock covers
/// sequence allocation, the socket's whole lifetime and the reply wait.
/// A fresh socket is opened for every command.
pub struct ViscaChannel {
    config: Arc<ConfigStore>,
    state: CameraState,
    sequence: SequenceCounter,
    send_lock: Mutex<()>,
    reply_timeout: Duration,
}

impl ViscaChannel {
    pub fn new(config: Arc<ConfigStore>, state: CameraState) -> Self {
        let reply_timeout = Duration::from_millis(config.protocol().reply_timeout_ms);
        Self {
            config,
            state,
            sequence: SequenceCounter::new(),
            send_lock: Mutex::new(()),
            reply_timeout,
        }
    }

    /// Encode a payload with the next sequence number
    pub fn build_packet(&self, payload_hex: &str) -> Result<Vec<u8>, EncodingError> {
        build_packet(payload_hex, &self.sequence)
    }

    /// Send one command and wait up to the reply timeout for any datagram
    #[instrument(skip(self))]
    pub async fn send(&self, payload_hex: &str) -> Result<Ack, TransportError> {
        let _guard = self.send_lock.lock().await;
        let endpoint = self.config.endpoint().await;

        match self.transmit(&endpoint, payload_hex).await {
            Ok(ack) => {
                self.state.record_command(normalize_payload(payload_hex)).await;
                Ok(ack)
            }
            Err(e) => {
                warn!("❌ VISCA send to {}:{} failed: {}", endpoint.cam_ip, endpoint.cam_port, e);
                self.state.record_error(e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn transmit(&self, endpoint: &CameraEndpoint, payload_hex: &str) -> Result<Ack, TransportError> {
        let packet = self.build_packet(payload_hex)?;
        let target = resolve(endpoint).await?;

        let bind_addr = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.send_to(&packet, target).await?;
        debug!(
            "📤 Sent VISCA {} to {} (seq={}, {} bytes)",
            normalize_payload(payload_hex),
            target,
            self.sequence.current(),
            packet.len()
        );

        let mut buffer = [0u8; 1024];
        let ack = match tokio::time::timeout(self.reply_timeout, socket.recv_from(&mut buffer)).await {
            Ok(Ok((n, from))) => {
                match ViscaHeader::from_bytes(&buffer[..n]) {
                    Ok((header, _)) => debug!(
                        "📥 Reply from {}: {} bytes, type=0x{:02X}, seq={}",
                        from, n, header.message_type, header.sequence
                    ),
                    Err(_) => debug!("📥 Reply from {}: {}", from, hex::encode(&buffer[..n])),
                }
                Ack::Replied { bytes: n }
            }
            Ok(Err(e)) => {
                debug!("No reply from {} ({})", target, e);
                Ack::NoReply
            }
            Err(_) => {
                debug!("No reply from {} within {:?}", target, self.reply_timeout);
                Ack::NoReply
            }
        };

        Ok(ack)
    }

    /// Edit the camera endpoint once the in-flight command has finished.
    /// Read, edit and swap all happen under the send lock, so concurrent
    /// partial updates compose.
    pub async fn update_endpoint<F>(&self, edit: F) -> Result<CameraEndpoint, ConfigError>
    where
        F: FnOnce(&mut CameraEndpoint) + Send,
    {
        let _guard = self.send_lock.lock().await;
        let mut endpoint = (*self.config.endpoint().await).clone();
        edit(&mut endpoint);
        self.config.replace_endpoint(endpoint.clone()).await?;
        Ok(endpoint)
    }

    /// Send a harmless command and report whether the camera answered
    pub async fn self_test(&self) -> bool {
        match self.send("81 01 04 07 00").await {
            Ok(Ack::Replied { .. }) => {
                info!("✅ Camera answered UDP test packet");
                true
            }
            Ok(Ack::NoReply) => {
                warn!("⚠️ UDP test packet sent but no response");
                true
            }
            Err(e) => {
                warn!("❌ UDP test failed: {}", e);
                false
            }
        }
    }
}

async fn resolve(endpoint: &CameraEndpoint) -> Result<SocketAddr, TransportError> {
    let target = format!("{}:{}", endpoint.cam_ip, endpoint.cam_port);
    tokio::net::lookup_host((endpoint.cam_ip.as_str(), endpoint.cam_port))
        .await
        .map_err(|_| TransportError::Resolve(target.clone()))?
        .next()
        .ok_or(TransportError::Resolve(target))
}
