//! Integration tests for the relay server over real TCP sockets

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chat_relay::{ChatServer, ClientRegistry, ServerConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

const PROMPT: &str = "Please enter your username: ";

struct TestServer {
    addr: SocketAddr,
    registry: Arc<ClientRegistry>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), chat_relay::AppError>>,
}

impl TestServer {
    async fn start(max_clients: usize) -> Self {
        let config = ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            max_clients,
            ..ServerConfig::default()
        };
        let server = ChatServer::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let registry = server.registry();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run_until(async move {
            let _ = shutdown_rx.await;
        }));

        Self {
            addr,
            registry,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        timeout(Duration::from_secs(2), self.task)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }

    /// Wait until the registry holds `n` clients
    async fn wait_for_clients(&self, n: usize) {
        for _ in 0..100 {
            if self.registry.len().await == n {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("registry never reached {} clients", n);
    }
}

/// Read until `expected` has been seen, returning everything read
async fn read_until(stream: &mut TcpStream, expected: &str) -> String {
    let mut seen = String::new();
    let mut buf = vec![0u8; 1024];
    while !seen.contains(expected) {
        let n = timeout(Duration::from_secs(2), stream.read(&mut buf))
            .await
            .expect("timed out waiting for server")
            .unwrap();
        assert!(n > 0, "unexpected EOF, seen so far: {:?}", seen);
        seen.push_str(&String::from_utf8_lossy(&buf[..n]));
    }
    seen
}

/// Read everything until the server closes the connection
async fn read_to_close(stream: &mut TcpStream) -> String {
    let mut out = Vec::new();
    timeout(Duration::from_secs(2), stream.read_to_end(&mut out))
        .await
        .expect("server did not close the connection")
        .unwrap();
    String::from_utf8_lossy(&out).into_owned()
}

async fn assert_silent(stream: &mut TcpStream) {
    let mut buf = vec![0u8; 256];
    let res = timeout(Duration::from_millis(200), stream.read(&mut buf)).await;
    assert!(res.is_err(), "expected no data, got {:?}", res);
}

async fn join(addr: SocketAddr, name: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    read_until(&mut stream, PROMPT).await;
    stream.write_all(format!("{}\n", name).as_bytes()).await.unwrap();
    read_until(&mut stream, "You are now connected to the chat server.\n").await;
    stream
}

#[tokio::test]
async fn test_capacity_scenario() {
    let server = TestServer::start(2).await;

    let mut x = join(server.addr, "alice").await;
    let mut y = join(server.addr, "bob").await;
    read_until(&mut x, "SERVER: bob has joined the chat.\n").await;
    server.wait_for_clients(2).await;

    let mut z = TcpStream::connect(server.addr).await.unwrap();
    assert_eq!(read_to_close(&mut z).await, "Server is full. Try again later.");
    assert_eq!(server.registry.len().await, 2);

    x.write_all(b"hi\n").await.unwrap();
    let line = read_until(&mut y, "\n").await;
    assert!(line.starts_with('['), "got {:?}", line);
    assert!(line.ends_with("] alice: hi\n"), "got {:?}", line);
    assert_eq!(&line[3..4], ":");
    assert_silent(&mut x).await;

    server.stop().await;
}

#[tokio::test]
async fn test_slot_frees_after_leave() {
    let server = TestServer::start(1).await;

    let mut x = join(server.addr, "alice").await;
    x.write_all(b"/exit").await.unwrap();
    read_to_close(&mut x).await;
    server.wait_for_clients(0).await;

    let _y = join(server.addr, "bob").await;
    assert_eq!(server.registry.names().await, vec!["bob".to_string()]);

    server.stop().await;
}

#[tokio::test]
async fn test_empty_name_fallback() {
    let server = TestServer::start(10).await;
    let mut observer = join(server.addr, "observer").await;

    let mut anon = TcpStream::connect(server.addr).await.unwrap();
    read_until(&mut anon, PROMPT).await;
    anon.write_all(b"\n").await.unwrap();
    read_until(&mut anon, "Welcome User-127.0.0.1!").await;

    read_until(&mut observer, "SERVER: User-127.0.0.1 has joined the chat.\n").await;

    anon.write_all(b"anyone here?\n").await.unwrap();
    let line = read_until(&mut observer, "\n").await;
    assert!(line.ends_with("] User-127.0.0.1: anyone here?\n"), "got {:?}", line);

    server.stop().await;
}

#[tokio::test]
async fn test_exit_and_leave_announcement() {
    let server = TestServer::start(10).await;
    let mut alice = join(server.addr, "alice").await;
    let mut bob = join(server.addr, "bob").await;
    read_until(&mut alice, "SERVER: bob has joined the chat.\n").await;

    alice.write_all(b"/exit\n").await.unwrap();
    assert_eq!(read_to_close(&mut alice).await, "");

    let seen = read_until(&mut bob, "SERVER: alice has left the chat.\n").await;
    assert!(!seen.contains("/exit"));
    assert_eq!(server.registry.names().await, vec!["bob".to_string()]);

    server.stop().await;
}

#[tokio::test]
async fn test_abrupt_disconnect_is_announced() {
    let server = TestServer::start(10).await;
    let alice = join(server.addr, "alice").await;
    let mut bob = join(server.addr, "bob").await;
    server.wait_for_clients(2).await;

    drop(alice);

    read_until(&mut bob, "SERVER: alice has left the chat.\n").await;
    server.wait_for_clients(1).await;

    server.stop().await;
}

#[tokio::test]
async fn test_concurrent_joins_all_registered() {
    let server = TestServer::start(100).await;

    let joins: Vec<_> = (0..20)
        .map(|i| {
            let addr = server.addr;
            tokio::spawn(async move { join(addr, &format!("user{}", i)).await })
        })
        .collect();

    let mut streams = Vec::new();
    for task in joins {
        streams.push(task.await.unwrap());
    }

    server.wait_for_clients(20).await;
    let mut names = server.registry.names().await;
    names.sort();
    let mut expected: Vec<String> = (0..20).map(|i| format!("user{}", i)).collect();
    expected.sort();
    assert_eq!(names, expected);

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_notifies_and_closes_clients() {
    let server = TestServer::start(10).await;
    let mut alice = join(server.addr, "alice").await;
    let mut bob = join(server.addr, "bob").await;
    read_until(&mut alice, "SERVER: bob has joined the chat.\n").await;
    let registry = Arc::clone(&server.registry);

    server.stop().await;
    assert!(registry.is_empty().await);

    for stream in [&mut alice, &mut bob] {
        let rest = read_to_close(stream).await;
        assert_eq!(rest, "SERVER: Server is shutting down. Goodbye!\n");
    }
}
