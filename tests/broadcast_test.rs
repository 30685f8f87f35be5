//! Broadcast fan-out tests, including partial-failure isolation.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use sockhub::HubError;

mod common;
use common::{start_hub, test_config, wait_for, EventRecorder};

#[tokio::test]
async fn broadcast_round_trip_is_byte_identical() {
    let (hub, addr) = start_hub(test_config()).await;
    let recorder = EventRecorder::attach(&hub);

    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(TcpStream::connect(addr).await.unwrap());
    }
    assert!(wait_for(|| recorder.connect_count() == 3, Duration::from_secs(2)).await);

    // Arbitrary bytes, deliberately not valid UTF-8.
    let payload: Vec<u8> = (0..=255u8).rev().collect();
    let outcomes = hub.broadcast(&payload);

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| o.result.is_ok()));

    for client in &mut clients {
        let mut buf = vec![0u8; payload.len()];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, payload);
    }

    assert!(wait_for(|| recorder.send_count() == 3, Duration::from_secs(2)).await);
    hub.stop().await;
}

#[tokio::test]
async fn closed_connections_drop_out_of_the_snapshot() {
    let (hub, addr) = start_hub(test_config()).await;
    let recorder = EventRecorder::attach(&hub);

    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(TcpStream::connect(addr).await.unwrap());
    }
    assert!(wait_for(|| recorder.connect_count() == 3, Duration::from_secs(2)).await);

    let closed_id = recorder.first_connect().unwrap();
    hub.close(closed_id).await;

    let outcomes = hub.broadcast(b"survivors");
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.result.is_ok()));
    assert!(outcomes.iter().all(|o| o.id != closed_id));

    hub.stop().await;
}

#[tokio::test]
async fn stalled_connection_fails_without_aborting_the_fanout() {
    let mut config = test_config();
    config.connection.send_queue_capacity = 1;
    config.timeouts.write_secs = 1;
    let (hub, addr) = start_hub(config).await;
    let recorder = EventRecorder::attach(&hub);

    // One peer that never reads, one that behaves.
    let stalled = TcpStream::connect(addr).await.unwrap();
    let mut healthy = TcpStream::connect(addr).await.unwrap();
    assert!(wait_for(|| recorder.connect_count() == 2, Duration::from_secs(2)).await);

    // Identify the healthy connection by traffic, not accept order.
    healthy.write_all(b"hi").await.unwrap();
    assert!(wait_for(|| recorder.receive_count() == 1, Duration::from_secs(2)).await);
    let healthy_id = recorder.receives()[0].0;
    let stalled_id = recorder
        .connects()
        .into_iter()
        .find(|id| *id != healthy_id)
        .unwrap();

    // Fill the stalled peer's queue: the kernel buffer absorbs a few chunks,
    // then the writer blocks and the capacity-1 queue overflows.
    let chunk = vec![0u8; 1 << 20];
    let mut saw_queue_full = false;
    for _ in 0..64 {
        match hub.send(stalled_id, chunk.clone()) {
            Ok(()) => tokio::time::sleep(Duration::from_millis(1)).await,
            Err(HubError::QueueFull(_)) => {
                saw_queue_full = true;
                break;
            }
            Err(other) => panic!("unexpected send failure: {other:?}"),
        }
    }
    assert!(saw_queue_full, "bounded queue never rejected a send");

    let outcomes = hub.broadcast(b"ping");
    assert_eq!(outcomes.len(), 2);

    let stalled_outcome = outcomes.iter().find(|o| o.id == stalled_id).unwrap();
    // QueueFull while still writing, or InvalidState once the write timeout
    // already drove the connection to Closing.
    assert!(matches!(
        stalled_outcome.result,
        Err(HubError::QueueFull(_)) | Err(HubError::InvalidState { .. })
    ));

    let healthy_outcome = outcomes.iter().find(|o| o.id == healthy_id).unwrap();
    assert!(healthy_outcome.result.is_ok());

    let mut buf = [0u8; 4];
    healthy.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");

    // The rejected delivery surfaced through the error event.
    assert!(recorder.error_count() >= 1);
    assert!(recorder.errors().contains(&stalled_id));

    drop(stalled);
    hub.stop().await;
}
