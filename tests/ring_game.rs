//! Integration tests: a ringmaster and its players on localhost.

use potato_ring::{
    chooser::Chooser, join_ring, ringmaster, GameEnd, GameReport, Player, PlayerConfig, Result,
    RingError, Ringmaster, RingmasterConfig,
};
use tokio::task::JoinHandle;

fn start_ringmaster(players: usize, hops: i32, seed: u64) -> (u16, JoinHandle<Result<GameReport>>) {
    let config = RingmasterConfig::new(0, players, hops);
    let listener = ringmaster::bind(&config).unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut ringmaster = Ringmaster::new(config, Chooser::from_u64(seed)).unwrap();

    let handle = tokio::spawn(async move { ringmaster.run(listener).await });
    (port, handle)
}

fn start_player(port: u16, seed: u64) -> JoinHandle<Result<(usize, GameEnd)>> {
    tokio::spawn(async move {
        let config = PlayerConfig {
            host: "127.0.0.1".to_string(),
            port,
        };
        let mut ctx = join_ring(&config).await?;
        let mut player = Player::new(Chooser::from_u64(seed));
        let end = player.play(&mut ctx).await?;
        Ok::<_, RingError>((ctx.position, end))
    })
}

async fn play_game(players: usize, hops: i32) -> (GameReport, Vec<(usize, GameEnd)>) {
    let (port, ringmaster) = start_ringmaster(players, hops, 99);
    let handles: Vec<_> = (0..players)
        .map(|i| start_player(port, 1000 + i as u64))
        .collect();

    let report = ringmaster.await.unwrap().unwrap();
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().unwrap());
    }
    outcomes.sort_by_key(|(position, _)| *position);
    (report, outcomes)
}

fn assert_adjacent_hops(trace: &[u32], players: usize) {
    let n = players as u32;
    for pair in trace.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        assert!(
            b == (a + 1) % n || b == (a + n - 1) % n,
            "{a} -> {b} is not a hop between neighbors in a ring of {players}"
        );
    }
}

/// Four players, ten hops: one stamp per hop, each hop between neighbors.
#[tokio::test]
async fn potato_travels_between_neighbors() {
    let (report, outcomes) = play_game(4, 10).await;

    let trace = report.trace.positions();
    assert_eq!(trace.len(), 10);
    assert!(trace.iter().all(|position| *position < 4));
    assert_eq!(report.first_holder, Some(trace[0] as usize));
    assert_adjacent_hops(trace, 4);

    let positions: Vec<usize> = outcomes.iter().map(|(position, _)| *position).collect();
    assert_eq!(positions, vec![0, 1, 2, 3]);
    assert!(outcomes.iter().all(|(_, end)| *end == GameEnd::Stopped));
}

#[tokio::test]
async fn two_players_share_both_links() {
    let (report, outcomes) = play_game(2, 7).await;

    assert_eq!(report.trace.len(), 7);
    assert_adjacent_hops(report.trace.positions(), 2);
    assert_eq!(outcomes.len(), 2);
}

#[tokio::test]
async fn single_hop_returns_from_the_first_holder() {
    let (report, _) = play_game(3, 1).await;

    assert_eq!(report.trace.len(), 1);
    assert_eq!(report.first_holder, Some(report.trace.positions()[0] as usize));
}

#[tokio::test]
async fn longest_game_fills_the_trace() {
    let hops = potato_ring::TRACE_CAPACITY as i32;
    let (report, _) = play_game(5, hops).await;

    assert_eq!(report.trace.len(), potato_ring::TRACE_CAPACITY);
    assert_adjacent_hops(report.trace.positions(), 5);
}

/// Zero hops: the ringmaster hangs up without ever throwing the potato.
#[tokio::test]
async fn zero_hops_means_no_game() {
    let (report, outcomes) = play_game(3, 0).await;

    assert_eq!(report.first_holder, None);
    assert!(report.trace.is_empty());
    assert!(outcomes
        .iter()
        .all(|(_, end)| *end == GameEnd::RingmasterClosed));
}
