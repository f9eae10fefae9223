//! Transport client tests against an in-process QUIC backend.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use quinn::Endpoint;
use rustls::pki_types::{CertificateDer, PrivatePkcs8KeyDer};

use hostpulse::errors::TransportError;
use hostpulse::{TransportClient, TransportOptions};

fn server_endpoint_on(addr: SocketAddr) -> Endpoint {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".into()]).unwrap();
    let cert_der = CertificateDer::from(cert.cert);
    let key_der = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());
    let server_config = quinn::ServerConfig::with_single_cert(vec![cert_der], key_der.into()).unwrap();
    Endpoint::server(server_config, addr).unwrap()
}

fn server_endpoint() -> (Endpoint, SocketAddr) {
    let endpoint = server_endpoint_on("127.0.0.1:0".parse().unwrap());
    let addr = endpoint.local_addr().unwrap();
    (endpoint, addr)
}

/// Backend that answers every request stream. `reply` of `None` echoes the
/// request back.
fn run_echo_server(endpoint: Endpoint, reply: Option<Vec<u8>>) {
    let reply = Arc::new(reply);
    tokio::spawn(async move {
        while let Some(incoming) = endpoint.accept().await {
            let reply = reply.clone();
            tokio::spawn(async move {
                let Ok(connection) = incoming.await else { return };
                loop {
                    match connection.accept_bi().await {
                        Ok((mut send, mut recv)) => {
                            let mut buf = vec![0u8; 64 * 1024];
                            let n = match recv.read(&mut buf).await {
                                Ok(Some(n)) => n,
                                _ => 0,
                            };
                            let data = reply.as_ref().clone().unwrap_or_else(|| buf[..n].to_vec());
                            let _ = send.write_all(&data).await;
                            let _ = send.finish();
                        }
                        Err(_) => return,
                    }
                }
            });
        }
    });
}

fn spawn_echo_server(reply: Option<Vec<u8>>) -> SocketAddr {
    let (endpoint, addr) = server_endpoint();
    run_echo_server(endpoint, reply);
    addr
}

/// Backend that pushes one frame to every client that connects.
fn spawn_push_server(frame: Vec<u8>) -> SocketAddr {
    let (endpoint, addr) = server_endpoint();
    let frame = Arc::new(frame);
    tokio::spawn(async move {
        while let Some(incoming) = endpoint.accept().await {
            let frame = frame.clone();
            tokio::spawn(async move {
                let Ok(connection) = incoming.await else { return };
                let Ok((mut send, _recv)) = connection.open_bi().await else { return };
                let _ = send.write_all(&frame).await;
                let _ = send.finish();
                // Keep the connection open while the client reads.
                tokio::time::sleep(Duration::from_secs(2)).await;
            });
        }
    });
    addr
}

/// A loopback address with nothing listening on it.
fn unused_addr() -> SocketAddr {
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap()
}

fn options(addr: SocketAddr) -> TransportOptions {
    TransportOptions {
        address: addr.to_string(),
        server_name: "localhost".into(),
        retry_attempts: 3,
        retry_delay: Duration::from_millis(100),
        connect_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(2),
        read_buffer_size: 1024,
        insecure_skip_verify: true,
    }
}

#[tokio::test]
async fn connect_exhausts_retry_budget_with_linear_backoff() {
    let mut opts = options(unused_addr());
    opts.retry_attempts = 3;
    opts.retry_delay = Duration::from_millis(150);
    opts.connect_timeout = Duration::from_millis(400);
    let client = TransportClient::new(opts).unwrap();

    let started = Instant::now();
    let err = client.connect().await.unwrap_err();
    let elapsed = started.elapsed();

    match err {
        TransportError::ConnectFailed { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected ConnectFailed, got {other}"),
    }
    // Two inter-attempt sleeps at minimum.
    assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "elapsed {elapsed:?}");
    assert!(!client.is_connected().await);
}

#[tokio::test]
async fn is_connected_tracks_connect_and_close() {
    let addr = spawn_echo_server(None);
    let client = TransportClient::new(options(addr)).unwrap();

    assert!(!client.is_connected().await);
    client.connect().await.unwrap();
    assert!(client.is_connected().await);

    // Connecting again while healthy is a no-op.
    client.connect().await.unwrap();

    client.close().await.unwrap();
    assert!(!client.is_connected().await);

    // Closing an already-closed client is an error by contract.
    assert!(matches!(client.close().await, Err(TransportError::NotConnected)));
}

#[tokio::test]
async fn send_message_round_trips() {
    let addr = spawn_echo_server(None);
    let client = TransportClient::new(options(addr)).unwrap();
    client.connect().await.unwrap();

    let response = client.send_message(b"ping").await.unwrap();
    assert_eq!(response, b"ping");

    // Streams are independent: a second exchange works the same way.
    let response = client.send_message(b"pong").await.unwrap();
    assert_eq!(response, b"pong");
}

#[tokio::test]
async fn send_message_reconnects_inline() {
    let addr = spawn_echo_server(None);
    let client = TransportClient::new(options(addr)).unwrap();

    // Never explicitly connected.
    let response = client.send_message(b"hello").await.unwrap();
    assert_eq!(response, b"hello");
    assert!(client.is_connected().await);

    // Disconnect and send again: one inline reconnect.
    client.close().await.unwrap();
    let response = client.send_message(b"again").await.unwrap();
    assert_eq!(response, b"again");
}

#[tokio::test]
async fn send_message_fails_within_budget_when_backend_down() {
    let mut opts = options(unused_addr());
    opts.retry_attempts = 2;
    opts.retry_delay = Duration::from_millis(100);
    opts.connect_timeout = Duration::from_millis(300);
    let client = TransportClient::new(opts).unwrap();

    let started = Instant::now();
    let err = client.send_message(b"ping").await.unwrap_err();
    assert!(matches!(err, TransportError::ConnectFailed { .. }), "got {err}");
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn oversized_response_is_truncated_to_the_read_buffer() {
    let addr = spawn_echo_server(Some(vec![0xAB; 4096]));
    let mut opts = options(addr);
    opts.read_buffer_size = 16;
    let client = TransportClient::new(opts).unwrap();
    client.connect().await.unwrap();

    let response = client.send_message(b"big please").await.unwrap();
    assert_eq!(response.len(), 16);
    assert!(response.iter().all(|b| *b == 0xAB));
}

#[tokio::test]
async fn async_send_delivers_exactly_one_result() {
    let addr = spawn_echo_server(None);
    let client = TransportClient::new(options(addr)).unwrap();
    client.connect().await.unwrap();

    let rx = client.send_message_async(b"async".to_vec());
    let result = rx.await.unwrap();
    assert_eq!(result.unwrap(), b"async");
}

#[tokio::test]
async fn receive_message_requires_a_connection() {
    let client = TransportClient::new(options(unused_addr())).unwrap();
    let started = Instant::now();
    let err = client.receive_message().await.unwrap_err();
    assert!(matches!(err, TransportError::NotConnected));
    // Immediate, no dialing.
    assert!(started.elapsed() < Duration::from_millis(100));
}

#[tokio::test]
async fn receive_message_reads_a_pushed_frame() {
    let addr = spawn_push_server(b"cpu=42".to_vec());
    let client = TransportClient::new(options(addr)).unwrap();
    client.connect().await.unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(2), client.receive_message())
        .await
        .expect("pushed frame within deadline")
        .unwrap();
    assert_eq!(frame, b"cpu=42");
}

#[tokio::test]
async fn connect_succeeds_once_backend_appears() {
    let addr = unused_addr();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(350)).await;
        run_echo_server(server_endpoint_on(addr), None);
    });

    let mut opts = options(addr);
    opts.retry_attempts = 8;
    opts.retry_delay = Duration::from_millis(150);
    opts.connect_timeout = Duration::from_millis(500);
    let client = TransportClient::new(opts).unwrap();

    client.connect().await.unwrap();
    assert!(client.is_connected().await);
}

#[tokio::test]
async fn updated_retry_policy_applies_to_later_connects() {
    let mut opts = options(unused_addr());
    opts.retry_attempts = 1;
    opts.retry_delay = Duration::from_millis(50);
    opts.connect_timeout = Duration::from_millis(300);
    let client = TransportClient::new(opts).unwrap();

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, TransportError::ConnectFailed { attempts: 1, .. }));

    client.set_retry_attempts(4).await;
    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, TransportError::ConnectFailed { attempts: 4, .. }));
}
