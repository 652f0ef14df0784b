//! Binary protocol served by `airq serve`, exercised over a real socket.

use std::net::SocketAddr;

use airq::dataset;
use airq::scorer::ScoringConfig;
use airq::server::{AirQualityServer, OP_COUNT, OP_RECORD, OP_REDUCE, OP_SCORE};
use airq::AirQualityAnalyzer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = AirQualityServer::new(AirQualityAnalyzer::new(dataset::sample(), ScoringConfig::default()));
    tokio::spawn(async move { server.serve(listener).await });
    addr
}

async fn send(stream: &mut TcpStream, op: u8, body: &[u8]) {
    stream.write_all(&[op]).await.unwrap();
    stream.write_all(&(body.len() as u32).to_le_bytes()).await.unwrap();
    stream.write_all(body).await.unwrap();
}

async fn read_u64(stream: &mut TcpStream) -> u64 {
    let mut buf = [0u8; 8];
    stream.read_exact(&mut buf).await.unwrap();
    u64::from_le_bytes(buf)
}

async fn read_f64(stream: &mut TcpStream) -> f64 {
    f64::from_bits(read_u64(stream).await)
}

async fn read_flag(stream: &mut TcpStream) -> u8 {
    let mut buf = [0u8; 1];
    stream.read_exact(&mut buf).await.unwrap();
    buf[0]
}

#[tokio::test]
async fn reduce_reports_best_and_worst_hour() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    for workers in [1u32, 3, 12] {
        send(&mut stream, OP_REDUCE, &workers.to_le_bytes()).await;

        let mut status = [0u8; 2];
        stream.read_exact(&mut status).await.unwrap();
        assert_eq!(&status, b"OK");

        let best_score = read_f64(&mut stream).await;
        let best_index = read_u64(&mut stream).await;
        let worst_score = read_f64(&mut stream).await;
        let worst_index = read_u64(&mut stream).await;
        let _elapsed_nanos = read_u64(&mut stream).await;

        assert_eq!(best_index, 9);
        assert_eq!(worst_index, 3);
        assert!((best_score - 129.19).abs() < 1e-9);
        assert!((worst_score - 2080.11).abs() < 1e-9);
    }
}

#[tokio::test]
async fn zero_workers_is_rejected_with_message() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    send(&mut stream, OP_REDUCE, &0u32.to_le_bytes()).await;

    let mut status = [0u8; 2];
    stream.read_exact(&mut status).await.unwrap();
    assert_eq!(&status, b"ER");

    let mut len = [0u8; 4];
    stream.read_exact(&mut len).await.unwrap();
    let mut message = vec![0u8; u32::from_le_bytes(len) as usize];
    stream.read_exact(&mut message).await.unwrap();
    assert_eq!(String::from_utf8(message).unwrap(), "Invalid input: worker count must be at least 1");

    // The connection stays usable after a rejected request.
    send(&mut stream, OP_COUNT, &[]).await;
    assert_eq!(read_u64(&mut stream).await, 10);
}

#[tokio::test]
async fn score_and_record_lookups() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    send(&mut stream, OP_SCORE, &9u64.to_le_bytes()).await;
    assert_eq!(read_flag(&mut stream).await, 1);
    assert!((read_f64(&mut stream).await - 129.19).abs() < 1e-9);

    send(&mut stream, OP_SCORE, &10u64.to_le_bytes()).await;
    assert_eq!(read_flag(&mut stream).await, 0);

    send(&mut stream, OP_RECORD, &3u64.to_le_bytes()).await;
    assert_eq!(read_flag(&mut stream).await, 1);
    let mut attrs = [0.0; 5];
    for value in attrs.iter_mut() {
        *value = read_f64(&mut stream).await;
    }
    assert_eq!(attrs, [4.4, 776.0, 256.0, 18.4, 46.3]);

    send(&mut stream, OP_RECORD, &u64::MAX.to_le_bytes()).await;
    assert_eq!(read_flag(&mut stream).await, 0);
}

#[tokio::test]
async fn unknown_opcode_closes_the_connection() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    send(&mut stream, 0x7f, &[]).await;

    let mut buf = [0u8; 1];
    assert_eq!(stream.read(&mut buf).await.unwrap(), 0);
}

#[tokio::test]
async fn huge_worker_count_is_served() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    send(&mut stream, OP_REDUCE, &u32::MAX.to_le_bytes()).await;

    let mut status = [0u8; 2];
    stream.read_exact(&mut status).await.unwrap();
    assert_eq!(&status, b"OK");
    let _best_score = read_f64(&mut stream).await;
    assert_eq!(read_u64(&mut stream).await, 9);
    let _worst_score = read_f64(&mut stream).await;
    assert_eq!(read_u64(&mut stream).await, 3);
}
