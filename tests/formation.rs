//! Integration tests for ring formation, with real players and with raw sockets posing as peers.

use potato_ring::{
    chooser::Chooser,
    join_ring,
    ringmaster::{self, Phase},
    wire::{HANDSHAKE_LEN, TOPOLOGY_RECORD_LEN},
    PlayerConfig, RingError, Ringmaster, RingmasterConfig,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

fn player_config(port: u16) -> PlayerConfig {
    PlayerConfig {
        host: "127.0.0.1".to_string(),
        port,
    }
}

/// Reads whatever the ringmaster sent before hanging up; a reset still keeps what arrived.
async fn drain(stream: &mut TcpStream) -> Vec<u8> {
    let mut rest = Vec::new();
    let _ = stream.read_to_end(&mut rest).await;
    rest
}

/// After formation each player's left link ends at its predecessor's right link.
#[tokio::test]
async fn ring_follows_arrival_order() {
    let players = 5;
    let config = RingmasterConfig::new(0, players, 3);
    let listener = ringmaster::bind(&config).unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut ringmaster = Ringmaster::new(config, Chooser::from_u64(5)).unwrap();

    let formation = tokio::spawn(async move {
        ringmaster.accept_players(&listener).await?;
        ringmaster.relay_endpoints().await?;
        Ok::<_, RingError>(ringmaster)
    });
    let joins: Vec<_> = (0..players)
        .map(|_| tokio::spawn(async move { join_ring(&player_config(port)).await }))
        .collect();

    let ringmaster = formation.await.unwrap().unwrap();
    assert_eq!(ringmaster.phase(), Phase::Ready);
    assert!(ringmaster
        .slots()
        .iter()
        .enumerate()
        .all(|(i, slot)| slot.position == i && slot.reported_port.is_some()));

    let mut rings = Vec::new();
    for join in joins {
        rings.push(join.await.unwrap().unwrap());
    }
    rings.sort_by_key(|ctx| ctx.position);

    for ctx in &rings {
        assert_eq!(ctx.ring_size, players);
        let left = &rings[ctx.left_position()];
        let right = &rings[ctx.right_position()];
        assert_eq!(
            ctx.left.local_addr().unwrap(),
            left.right.peer_addr().unwrap()
        );
        assert_eq!(
            ctx.right.peer_addr().unwrap(),
            right.left.local_addr().unwrap()
        );
    }
}

/// A player vanishing before reporting its port aborts formation for everyone.
#[tokio::test]
async fn disconnect_during_formation_aborts() {
    let config = RingmasterConfig::new(0, 3, 4);
    let listener = ringmaster::bind(&config).unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut ringmaster = Ringmaster::new(config, Chooser::from_u64(5)).unwrap();

    let formation = tokio::spawn(async move {
        ringmaster.accept_players(&listener).await?;
        ringmaster.relay_endpoints().await
    });

    let mut clients = Vec::new();
    for expected in 0..3i32 {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut handshake = [0u8; HANDSHAKE_LEN];
        stream.read_exact(&mut handshake).await.unwrap();
        assert_eq!(handshake[..4], expected.to_be_bytes());
        assert_eq!(handshake[4..], 3i32.to_be_bytes());
        clients.push(stream);
    }

    drop(clients.pop());
    clients[0].write_all(&4000i32.to_be_bytes()).await.unwrap();

    let err = formation.await.unwrap().unwrap_err();
    assert!(
        matches!(&err, RingError::PeerDisconnected { peer } if peer == "player 2"),
        "unexpected error: {err}"
    );

    // player 0's left neighbor never reported, so it is left without one
    assert!(drain(&mut clients[0]).await.is_empty());

    // player 1 may have learned about player 0, but nothing else
    let rest = drain(&mut clients[1]).await;
    assert!(rest.is_empty() || rest.len() == TOPOLOGY_RECORD_LEN);
}

#[tokio::test]
async fn zero_port_report_is_malformed() {
    let config = RingmasterConfig::new(0, 2, 1);
    let listener = ringmaster::bind(&config).unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut ringmaster = Ringmaster::new(config, Chooser::from_u64(5)).unwrap();

    let formation = tokio::spawn(async move {
        ringmaster.accept_players(&listener).await?;
        ringmaster.relay_endpoints().await
    });

    let mut first = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let mut handshake = [0u8; HANDSHAKE_LEN];
    first.read_exact(&mut handshake).await.unwrap();
    let mut second = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    second.read_exact(&mut handshake).await.unwrap();

    first.write_all(&0i32.to_be_bytes()).await.unwrap();

    let err = formation.await.unwrap().unwrap_err();
    assert!(matches!(err, RingError::MalformedMessage(_)), "unexpected error: {err}");
}

#[tokio::test]
async fn player_rejects_a_position_outside_the_ring() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let fake = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut handshake = Vec::new();
        handshake.extend_from_slice(&4i32.to_be_bytes());
        handshake.extend_from_slice(&4i32.to_be_bytes());
        stream.write_all(&handshake).await.unwrap();
        stream
    });

    let result = join_ring(&player_config(port)).await;
    assert!(matches!(result, Err(RingError::MalformedMessage(_))));
    drop(fake.await.unwrap());
}

#[tokio::test]
async fn player_treats_a_cut_handshake_as_a_disconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        stream.write_all(&1i32.to_be_bytes()).await.unwrap();
    });

    let result = join_ring(&player_config(port)).await;
    assert!(
        matches!(&result, Err(RingError::PeerDisconnected { peer }) if peer == "ringmaster"),
        "unexpected result: {:?}",
        result.as_ref().err()
    );
}

#[tokio::test]
async fn player_without_a_ringmaster_fails_to_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result = join_ring(&player_config(port)).await;
    assert!(matches!(result, Err(RingError::TransportSetup { .. })));
}
