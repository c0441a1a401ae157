//! A player: joins the ring through the ringmaster, then catches and throws the potato.

use crate::{
    chooser::{Chooser, Side},
    error::{Result, RingError},
    log,
    mux::{wait_any, Ready},
    transport::{accept_one, connect_to, local_port_of, open_listener, Link},
    wire::{Expect, Frame, Handshake, Token, TopologyRecord, STOP_SENTINEL},
};
use color_print::cformat;
use rand::Rng;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    pub host: String,
    pub port: u16,
}

/// The three links a player watches during the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    Ringmaster,
    Left,
    Right,
}

impl fmt::Display for LinkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ringmaster => write!(f, "ringmaster"),
            Self::Left => write!(f, "left neighbor"),
            Self::Right => write!(f, "right neighbor"),
        }
    }
}

/// Everything a player knows once it has joined the ring.
pub struct RingContext {
    pub position: usize,
    pub ring_size: usize,
    pub ringmaster: Link,
    pub left: Link,
    pub right: Link,
}

impl RingContext {
    pub fn left_position(&self) -> usize {
        (self.position + self.ring_size - 1) % self.ring_size
    }

    pub fn right_position(&self) -> usize {
        (self.position + 1) % self.ring_size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Holding,
    Forwarded,
    Terminal,
    Stopped,
}

/// What to do with a potato that just arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Stop,
    ReturnToRingmaster(Token),
    Forward(Side, Token),
}

/// How the game loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEnd {
    /// The ringmaster broadcast the game over.
    Stopped,
    /// The ringmaster hung up first, which is how a game without hops ends.
    RingmasterClosed,
}

/// Function that joins the ring: learns the position, reports a listening port,
/// connects to the left neighbor and accepts the right one.
pub async fn join_ring(config: &PlayerConfig) -> Result<RingContext> {
    let mut ringmaster = connect_to(&config.host, config.port, Expect::Handshake).await?;

    let Handshake {
        position,
        ring_size,
    } = match ringmaster.recv_exact(LinkRole::Ringmaster).await? {
        Frame::Handshake(handshake) => handshake,
        other => return Err(unexpected(LinkRole::Ringmaster, &other)),
    };
    println!("Connected as player {position} out of {ring_size} total players");

    let listener = open_listener(None, 1)?;
    let port = local_port_of(&listener)?;
    log::debug(&cformat!("Player {position} listening on port <bold>{port}</bold>."));

    ringmaster.expect(Expect::Topology);
    ringmaster
        .send_all(Frame::PortReport(port), LinkRole::Ringmaster)
        .await?;

    let TopologyRecord { address, port } =
        match ringmaster.recv_exact(LinkRole::Ringmaster).await? {
            Frame::Topology(record) => record,
            other => return Err(unexpected(LinkRole::Ringmaster, &other)),
        };
    ringmaster.expect(Expect::Token);

    log::debug(&cformat!("Connecting to the left neighbor at <bold>{address}:{port}</bold>."));
    let left = connect_to(&address, port, Expect::Token).await?;
    let (right, _) = accept_one(&listener, Expect::Token).await?;
    drop(listener);

    Ok(RingContext {
        position,
        ring_size,
        ringmaster,
        left,
        right,
    })
}

fn unexpected(role: LinkRole, frame: &Frame) -> RingError {
    RingError::MalformedMessage(format!("unexpected {frame:?} from the {role}"))
}

pub struct Player<R: Rng + ?Sized> {
    chooser: Chooser<R>,
    state: PlayerState,
}

impl<R: Rng + ?Sized> Player<R> {
    pub fn new(chooser: Chooser<R>) -> Self {
        Self {
            chooser,
            state: PlayerState::Idle,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    fn enter(&mut self, state: PlayerState) {
        log::debug(&format!("player: {:?} -> {:?}", self.state, state));
        self.state = state;
    }

    /// Function that decides what happens to a potato caught at `position`.
    ///
    /// The potato is stamped with `position` unless it is the game over
    /// broadcast. It goes back to the ringmaster once no hop is left after
    /// this one, otherwise to a neighbor picked by a fair coin.
    pub fn handle_token(&mut self, position: usize, mut token: Token) -> Result<Action> {
        if token.is_stop() {
            self.enter(PlayerState::Stopped);
            return Ok(Action::Stop);
        }
        if token.remaining_hops < STOP_SENTINEL {
            return Err(RingError::MalformedMessage(format!(
                "remaining hops {}",
                token.remaining_hops
            )));
        }

        self.enter(PlayerState::Holding);
        let position = u32::try_from(position)
            .map_err(|_| RingError::MalformedMessage(format!("position {position}")))?;
        token.trace.push(position)?;

        if token.remaining_hops > 0 {
            token.remaining_hops -= 1;
        }
        if token.remaining_hops == 0 {
            self.enter(PlayerState::Terminal);
            return Ok(Action::ReturnToRingmaster(token));
        }

        let side = self.chooser.side();
        self.enter(PlayerState::Forwarded);
        Ok(Action::Forward(side, token))
    }

    /// Function that plays until the ringmaster ends the game.
    pub async fn play(&mut self, ctx: &mut RingContext) -> Result<GameEnd> {
        loop {
            let links = [
                (LinkRole::Ringmaster, &mut ctx.ringmaster),
                (LinkRole::Left, &mut ctx.left),
                (LinkRole::Right, &mut ctx.right),
            ];
            let Ready { key, frame } = wait_any(links).await?;

            let frame = match frame {
                Ok(frame) => frame,
                Err(RingError::PeerDisconnected { .. }) if key == LinkRole::Ringmaster => {
                    log::warn("Disconnected from the ringmaster before the game was over.");
                    self.enter(PlayerState::Stopped);
                    return Ok(GameEnd::RingmasterClosed);
                }
                Err(RingError::PeerDisconnected { .. }) => {
                    log::debug(&format!("The {key} closed its link."));
                    continue;
                }
                Err(e) => return Err(e),
            };
            let token = match frame {
                Frame::Token(token) => token,
                other => return Err(unexpected(key, &other)),
            };

            match self.handle_token(ctx.position, token)? {
                Action::Stop => return Ok(GameEnd::Stopped),
                Action::ReturnToRingmaster(token) => {
                    println!("I'm it");
                    ctx.ringmaster
                        .send_all(Frame::Token(token), LinkRole::Ringmaster)
                        .await?;
                }
                Action::Forward(side, token) => {
                    let (role, neighbor) = match side {
                        Side::Left => (LinkRole::Left, ctx.left_position()),
                        Side::Right => (LinkRole::Right, ctx.right_position()),
                    };
                    println!("Sending potato to {neighbor}");
                    let link = match side {
                        Side::Left => &mut ctx.left,
                        Side::Right => &mut ctx.right,
                    };
                    link.send_all(Frame::Token(token), role).await?;
                }
            }
        }
    }
}
