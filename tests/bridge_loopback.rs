//! End-to-end tests: real TCP clients against a bridge on an in-memory UART.

use std::time::Duration;

use stream_server::bridge::SchedulerState;
use tokio::io::AsyncWriteExt;

mod common;

#[tokio::test]
async fn serial_output_reaches_every_client() {
    let bridge = common::start_bridge(vec![common::server("uart", 28638)]);
    let mut a = common::connect(28638).await;
    let mut b = common::connect(28638).await;

    bridge.uart.push_rx(b"OK\r\n");

    assert_eq!(common::read_exact(&mut a, 4).await, b"OK\r\n");
    assert_eq!(common::read_exact(&mut b, 4).await, b"OK\r\n");
    bridge.stop().await;
}

#[tokio::test]
async fn client_bytes_reach_uart_in_order() {
    let bridge = common::start_bridge(vec![common::server("uart", 28639)]);
    let mut client = common::connect(28639).await;

    client.write_all(b"AT").await.unwrap();
    tokio::time::sleep(common::SETTLE).await;
    client.write_all(b"\r\n").await.unwrap();

    assert_eq!(common::wait_for_tx(&bridge.uart, 4).await, b"AT\r\n");
    bridge.stop().await;
}

#[tokio::test]
async fn large_payload_arrives_intact() {
    let bridge = common::start_bridge(vec![common::server("uart", 28640)]);
    let mut client = common::connect(28640).await;

    let payload: Vec<u8> = (0..=255u8).cycle().take(900).collect();
    bridge.uart.push_rx(&payload);

    assert_eq!(common::read_exact(&mut client, payload.len()).await, payload);
    bridge.stop().await;
}

#[tokio::test]
async fn disconnect_does_not_disturb_other_clients() {
    let bridge = common::start_bridge(vec![common::server("uart", 28641)]);
    let leaving = common::connect(28641).await;
    let mut staying = common::connect(28641).await;

    drop(leaving);
    tokio::time::sleep(common::SETTLE).await;
    bridge.uart.push_rx(b"still here");

    assert_eq!(common::read_exact(&mut staying, 10).await, b"still here");
    let scheduler = bridge.stop().await;
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
}

#[tokio::test]
async fn instances_share_one_uart() {
    let bridge = common::start_bridge(vec![
        common::server("console", 28642),
        common::server("modem", 28643),
    ]);
    let mut console = common::connect(28642).await;
    let mut modem = common::connect(28643).await;

    bridge.uart.push_rx(b"ping");
    assert_eq!(common::read_exact(&mut console, 4).await, b"ping");
    assert_eq!(common::read_exact(&mut modem, 4).await, b"ping");

    modem.write_all(b"pong").await.unwrap();
    assert_eq!(common::wait_for_tx(&bridge.uart, 4).await, b"pong");
    bridge.stop().await;
}

#[tokio::test]
async fn clients_beyond_backlog_are_all_served() {
    let mut config = common::server("uart", 28644);
    config.backlog = 1;
    let bridge = common::start_bridge(vec![config]);

    let mut clients = Vec::new();
    for _ in 0..10 {
        clients.push(common::connect(28644).await);
    }

    bridge.uart.push_rx(b"hi");
    for client in &mut clients {
        assert_eq!(common::read_exact(client, 2).await, b"hi");
    }
    bridge.stop().await;
}

#[tokio::test]
async fn shutdown_closes_clients_and_port() {
    let bridge = common::start_bridge(vec![common::server("uart", 28645)]);
    let mut client = common::connect(28645).await;

    let scheduler = bridge.stop().await;
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert!(common::is_closed_by_peer(&mut client).await);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(tokio::net::TcpStream::connect(("127.0.0.1", 28645)).await.is_err());
}
