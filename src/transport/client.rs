//! QUIC client with bounded reconnect and per-stream request/response.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use quinn::crypto::rustls::QuicClientConfig;
use quinn::{Connection, Endpoint};
use tokio::net::lookup_host;
use tokio::sync::{oneshot, RwLock};

use crate::errors::TransportError;

use super::tls;

/// Everything the client needs at construction time. Supplied by the caller,
/// typically from [`Config::transport_options`](crate::config::Config::transport_options).
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub address: String,
    pub server_name: String,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub read_buffer_size: usize,
    pub insecure_skip_verify: bool,
}

struct ClientState {
    session: Option<Connection>,
    retry_attempts: u32,
    retry_delay: Duration,
}

struct Inner {
    endpoint: Endpoint,
    address: String,
    server_name: String,
    connect_timeout: Duration,
    request_timeout: Duration,
    read_buffer_size: usize,
    state: RwLock<ClientState>,
}

/// Client owning one resilient logical connection to the monitoring backend.
///
/// Cloning is cheap and every clone shares the same connection; the handle is
/// never touched by anything else. Stream-level I/O failures are surfaced
/// per call and never retried implicitly — reconnect-and-resend is the
/// caller's decision.
#[derive(Clone)]
pub struct TransportClient {
    inner: Arc<Inner>,
}

impl TransportClient {
    /// Build the client endpoint. Does not dial; call [`connect`](Self::connect).
    pub fn new(opts: TransportOptions) -> Result<Self, TransportError> {
        let crypto = tls::client_crypto(opts.insecure_skip_verify)?;
        let quic_crypto =
            QuicClientConfig::try_from(crypto).map_err(|e| TransportError::Tls(e.to_string()))?;
        let mut client_config = quinn::ClientConfig::new(Arc::new(quic_crypto));

        // Keep-alive so an idle feed connection does not hit the QUIC idle
        // timeout between status frames.
        let mut transport = quinn::TransportConfig::default();
        transport.keep_alive_interval(Some(Duration::from_secs(10)));
        client_config.transport_config(Arc::new(transport));

        let mut endpoint = Endpoint::client(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))?;
        endpoint.set_default_client_config(client_config);

        Ok(Self {
            inner: Arc::new(Inner {
                endpoint,
                address: opts.address,
                server_name: opts.server_name,
                connect_timeout: opts.connect_timeout,
                request_timeout: opts.request_timeout,
                read_buffer_size: opts.read_buffer_size,
                state: RwLock::new(ClientState {
                    session: None,
                    retry_attempts: opts.retry_attempts.max(1),
                    retry_delay: opts.retry_delay,
                }),
            }),
        })
    }

    /// Establish the backend connection, dialing up to the configured number
    /// of attempts with a fixed delay between them. Returns immediately when
    /// a healthy session already exists. After the budget is exhausted the
    /// last error is surfaced and the client stays disconnected; a later
    /// `connect` may succeed.
    pub async fn connect(&self) -> Result<(), TransportError> {
        if self.is_connected().await {
            return Ok(());
        }

        // Snapshot the policy: setter calls only affect subsequent connects.
        let (attempts, delay) = {
            let state = self.inner.state.read().await;
            (state.retry_attempts, state.retry_delay)
        };

        let mut last_error: Option<TransportError> = None;
        for attempt in 1..=attempts {
            match tokio::time::timeout(self.inner.connect_timeout, self.dial_once()).await {
                Ok(Ok(connection)) => {
                    info!("connected to {}", self.inner.address);
                    self.inner.state.write().await.session = Some(connection);
                    return Ok(());
                }
                Ok(Err(e)) => {
                    warn!(
                        "failed to dial {}: {} (attempt {}/{})",
                        self.inner.address, e, attempt, attempts
                    );
                    last_error = Some(e);
                }
                Err(_) => {
                    warn!(
                        "dial to {} timed out after {:?} (attempt {}/{})",
                        self.inner.address, self.inner.connect_timeout, attempt, attempts
                    );
                    last_error = Some(TransportError::Timeout(self.inner.connect_timeout));
                }
            }
            if attempt < attempts {
                tokio::time::sleep(delay).await;
            }
        }

        Err(TransportError::ConnectFailed {
            attempts,
            last: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no dial attempt made".into()),
        })
    }

    async fn dial_once(&self) -> Result<Connection, TransportError> {
        let addr = lookup_host(&self.inner.address)
            .await?
            .next()
            .ok_or_else(|| TransportError::Dial(format!("no address for {}", self.inner.address)))?;

        let connecting = self
            .inner
            .endpoint
            .connect(addr, &self.inner.server_name)
            .map_err(|e| TransportError::Dial(e.to_string()))?;
        connecting.await.map_err(|e| TransportError::Dial(e.to_string()))
    }

    /// Cheap health check: a session exists and has not been closed. A gate,
    /// not a guarantee — the connection can die between check and use.
    pub async fn is_connected(&self) -> bool {
        self.inner
            .state
            .read()
            .await
            .session
            .as_ref()
            .map(|c| c.close_reason().is_none())
            .unwrap_or(false)
    }

    /// One request/response exchange over a fresh bidirectional stream.
    ///
    /// Attempts a single inline `connect` when disconnected. The response is
    /// read with one bounded read of `read_buffer_size` bytes; anything the
    /// backend sends beyond that is truncated. The whole exchange is subject
    /// to the configured request timeout.
    pub async fn send_message(&self, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
        if !self.is_connected().await {
            self.connect().await?;
        }
        let connection = self.session().await.ok_or(TransportError::NotConnected)?;

        tokio::time::timeout(self.inner.request_timeout, self.exchange(&connection, payload))
            .await
            .map_err(|_| TransportError::Timeout(self.inner.request_timeout))?
    }

    async fn exchange(
        &self,
        connection: &Connection,
        payload: &[u8],
    ) -> Result<Vec<u8>, TransportError> {
        let (mut send, mut recv) = connection
            .open_bi()
            .await
            .map_err(|e| TransportError::Stream(format!("open stream: {e}")))?;

        send.write_all(payload)
            .await
            .map_err(|e| TransportError::Stream(format!("write: {e}")))?;
        send.finish()
            .map_err(|e| TransportError::Stream(format!("finish: {e}")))?;

        let mut buf = vec![0u8; self.inner.read_buffer_size];
        let n = recv
            .read(&mut buf)
            .await
            .map_err(|e| TransportError::Stream(format!("read: {e}")))?
            .unwrap_or(0);
        buf.truncate(n);
        Ok(buf)
    }

    /// [`send_message`](Self::send_message) on an independent task. The
    /// receiver resolves with exactly one result; the caller is never
    /// blocked. Dropping the receiver abandons the exchange silently.
    pub fn send_message_async(
        &self,
        payload: Vec<u8>,
    ) -> oneshot::Receiver<Result<Vec<u8>, TransportError>> {
        let (tx, rx) = oneshot::channel();
        let client = self.clone();
        tokio::spawn(async move {
            let result = client.send_message(&payload).await;
            let _ = tx.send(result);
        });
        rx
    }

    /// Accept one inbound bidirectional stream and perform one bounded read.
    ///
    /// Fails immediately with [`TransportError::NotConnected`] when there is
    /// no healthy session. Blocks until the backend opens a stream; wrap in
    /// `tokio::time::timeout` for a caller-side deadline — dropping the
    /// future aborts the pending accept.
    pub async fn receive_message(&self) -> Result<Vec<u8>, TransportError> {
        let connection = match self.session().await {
            Some(c) if c.close_reason().is_none() => c,
            _ => return Err(TransportError::NotConnected),
        };

        let (_send, mut recv) = connection
            .accept_bi()
            .await
            .map_err(|e| TransportError::Stream(format!("accept stream: {e}")))?;

        let mut buf = vec![0u8; self.inner.read_buffer_size];
        let n = recv
            .read(&mut buf)
            .await
            .map_err(|e| TransportError::Stream(format!("read: {e}")))?
            .unwrap_or(0);
        buf.truncate(n);
        Ok(buf)
    }

    /// Change the dial budget for subsequent `connect` calls. No effect on a
    /// connect already in flight.
    pub async fn set_retry_attempts(&self, attempts: u32) {
        self.inner.state.write().await.retry_attempts = attempts.max(1);
        debug!("retry attempts set to {}", attempts.max(1));
    }

    /// Change the inter-attempt delay for subsequent `connect` calls.
    pub async fn set_retry_delay(&self, delay: Duration) {
        self.inner.state.write().await.retry_delay = delay;
        debug!("retry delay set to {delay:?}");
    }

    pub async fn retry_delay(&self) -> Duration {
        self.inner.state.read().await.retry_delay
    }

    /// Close the connection with error code 0 and no reason. Subsequent
    /// operations observe the disconnected state. Closing an already-closed
    /// client is an error: [`TransportError::NotConnected`].
    pub async fn close(&self) -> Result<(), TransportError> {
        let mut state = self.inner.state.write().await;
        match state.session.take() {
            Some(connection) => {
                connection.close(0u32.into(), b"");
                info!("connection to {} closed", self.inner.address);
                Ok(())
            }
            None => Err(TransportError::NotConnected),
        }
    }

    async fn session(&self) -> Option<Connection> {
        self.inner.state.read().await.session.clone()
    }
}
