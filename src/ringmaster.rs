//! The coordinator: assembles the ring, throws the first potato and collects the trace.

use crate::{
    chooser::Chooser,
    error::{Result, RingError},
    log,
    mux::{wait_any, Ready},
    transport::{accept_one, open_listener, Link},
    wire::{Expect, Frame, Handshake, Token, TopologyRecord, Trace, TRACE_CAPACITY},
};
use color_print::cformat;
use rand::Rng;
use serde::Serialize;
use std::{fmt, net::IpAddr};
use tokio::net::TcpListener;

/// Minimum listen backlog, raised to the player count when larger.
pub const MIN_BACKLOG: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingmasterConfig {
    pub port: u16,
    pub num_players: usize,
    pub num_hops: i32,
}

impl RingmasterConfig {
    pub fn new(port: u16, num_players: usize, num_hops: i32) -> Self {
        Self {
            port,
            num_players,
            num_hops,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_players < 2 {
            return Err(RingError::Config(format!(
                "number of players must be greater than 1, got {}",
                self.num_players
            )));
        }
        if i32::try_from(self.num_players).is_err() {
            return Err(RingError::Config(format!(
                "{} players cannot be numbered on the wire",
                self.num_players
            )));
        }
        if self.num_hops < 0 || self.num_hops as usize > TRACE_CAPACITY {
            return Err(RingError::Config(format!(
                "number of hops must be at least 0 and not exceed {TRACE_CAPACITY}, got {}",
                self.num_hops
            )));
        }
        Ok(())
    }

    fn backlog(&self) -> u32 {
        u32::try_from(self.num_players)
            .unwrap_or(u32::MAX)
            .max(MIN_BACKLOG)
    }
}

/// Function that opens the ringmaster's listener for a validated configuration.
pub fn bind(config: &RingmasterConfig) -> Result<TcpListener> {
    config.validate()?;
    open_listener(Some(config.port), config.backlog())
}

/// Key used to name a slot in the multiplexer and in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotId(pub usize);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", self.0)
    }
}

/// One connected player as seen by the ringmaster.
pub struct PlayerSlot {
    pub position: usize,
    pub link: Link,
    pub address: IpAddr,
    pub reported_port: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Accepting { count: usize },
    Relaying,
    Ready,
    Collecting,
    Done,
}

/// Outcome of one game, printed as JSON on request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameReport {
    pub players: usize,
    pub hops: i32,
    pub first_holder: Option<usize>,
    pub trace: Trace,
}

pub struct Ringmaster<R: Rng + ?Sized> {
    config: RingmasterConfig,
    chooser: Chooser<R>,
    slots: Vec<PlayerSlot>,
    phase: Phase,
}

impl<R: Rng + ?Sized> Ringmaster<R> {
    /// Function that creates a ringmaster, rejecting configurations the token cannot carry.
    pub fn new(config: RingmasterConfig, chooser: Chooser<R>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            slots: Vec::with_capacity(config.num_players),
            config,
            chooser,
            phase: Phase::Accepting { count: 0 },
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn slots(&self) -> &[PlayerSlot] {
        &self.slots
    }

    fn enter(&mut self, phase: Phase) {
        log::debug(&format!("ringmaster: {:?} -> {:?}", self.phase, phase));
        self.phase = phase;
    }

    /// Function that runs a whole game on an already bound listener.
    pub async fn run(&mut self, listener: TcpListener) -> Result<GameReport> {
        println!("Potato Ringmaster");
        println!("Players = {}", self.config.num_players);
        println!("Hops = {}", self.config.num_hops);

        self.accept_players(&listener).await?;
        drop(listener);

        self.relay_endpoints().await?;
        self.play().await
    }

    /// Function that accepts exactly `num_players` players, one at a time, numbering them by arrival.
    pub async fn accept_players(&mut self, listener: &TcpListener) -> Result<()> {
        let ring_size = self.config.num_players;

        while self.slots.len() < ring_size {
            let (mut link, peer) = accept_one(listener, Expect::PortReport).await?;
            let position = self.slots.len();

            link.send_all(
                Frame::Handshake(Handshake {
                    position,
                    ring_size,
                }),
                SlotId(position),
            )
            .await?;
            println!("Player {position} is ready to play");

            self.slots.push(PlayerSlot {
                position,
                link,
                address: peer.ip().to_canonical(),
                reported_port: None,
            });
            self.enter(Phase::Accepting {
                count: self.slots.len(),
            });
        }
        Ok(())
    }

    /// Function that relays every player's listening endpoint to the next player in the ring.
    ///
    /// Reports are handled in whatever order they arrive; slots that already
    /// reported are no longer waited on.
    pub async fn relay_endpoints(&mut self) -> Result<()> {
        self.enter(Phase::Relaying);
        let ring_size = self.slots.len();
        let mut relayed = 0;

        while relayed < ring_size {
            let waiting = self
                .slots
                .iter_mut()
                .filter(|slot| slot.reported_port.is_none())
                .map(|slot| (SlotId(slot.position), &mut slot.link));

            let Ready { key, frame } = wait_any(waiting).await?;
            let port = match frame? {
                Frame::PortReport(port) => port,
                other => {
                    return Err(RingError::MalformedMessage(format!(
                        "{key} sent {other:?} instead of its port"
                    )))
                }
            };

            let slot = &mut self.slots[key.0];
            slot.reported_port = Some(port);
            slot.link.expect(Expect::Token);
            let record = TopologyRecord {
                address: slot.address.to_string(),
                port,
            };

            let successor = (key.0 + 1) % ring_size;
            let address = &record.address;
            log::debug(&cformat!(
                "Relaying <bold>{key}</bold> at <bold>{address}:{port}</bold> to player {successor}."
            ));
            self.slots[successor]
                .link
                .send_all(Frame::Topology(record), SlotId(successor))
                .await?;
            relayed += 1;
        }

        self.enter(Phase::Ready);
        Ok(())
    }

    /// Function that throws the potato, waits for it to come back and ends the game.
    pub async fn play(&mut self) -> Result<GameReport> {
        let hops = self.config.num_hops;
        let mut report = GameReport {
            players: self.slots.len(),
            hops,
            first_holder: None,
            trace: Trace::new(),
        };

        if hops == 0 {
            log::info("No hops to play, closing every connection.");
            self.close_all();
            return Ok(report);
        }

        let first = self.chooser.slot(self.slots.len());
        println!("Ready to start the game, sending potato to player {first}");
        self.slots[first]
            .link
            .send_all(Frame::Token(Token::new(hops)), SlotId(first))
            .await?;
        report.first_holder = Some(first);

        self.enter(Phase::Collecting);
        let token = self.collect().await?;

        println!("Trace of potato:");
        println!("{}", token.trace);
        report.trace = token.trace.clone();

        self.broadcast_stop(token).await;
        self.close_all();
        Ok(report)
    }

    /// Function that waits for whichever player returns the potato.
    async fn collect(&mut self) -> Result<Token> {
        let ring_size = self.slots.len();
        let waiting = self
            .slots
            .iter_mut()
            .map(|slot| (SlotId(slot.position), &mut slot.link));

        let Ready { key, frame } = wait_any(waiting).await?;
        let token = match frame? {
            Frame::Token(token) => token,
            other => {
                return Err(RingError::MalformedMessage(format!(
                    "{key} sent {other:?} instead of the potato"
                )))
            }
        };

        if let Some(stray) = token
            .trace
            .positions()
            .iter()
            .find(|position| **position as usize >= ring_size)
        {
            return Err(RingError::MalformedMessage(format!(
                "{key} returned a trace naming player {stray} in a ring of {ring_size}"
            )));
        }
        if token.trace.len() != self.config.num_hops as usize {
            log::warn(&format!(
                "{key} returned a trace of {} positions for {} hops",
                token.trace.len(),
                self.config.num_hops
            ));
        }
        Ok(token)
    }

    /// Function that tells every player the game is over.
    async fn broadcast_stop(&mut self, token: Token) {
        let stop = token.into_stop();
        for slot in &mut self.slots {
            let id = SlotId(slot.position);
            if let Err(e) = slot.link.send_all(Frame::Token(stop.clone()), id).await {
                log::warn(&format!("Couldn't tell {id} the game is over: {e}"));
            }
        }
    }

    fn close_all(&mut self) {
        self.slots.clear();
        self.enter(Phase::Done);
    }
}
