pub mod chooser;
pub mod error;
pub mod log;
pub mod mux;
pub mod player;
pub mod ringmaster;
pub mod transport;
pub mod wire;

pub use error::{Result, RingError};
pub use player::{join_ring, GameEnd, Player, PlayerConfig, RingContext};
pub use ringmaster::{GameReport, Ringmaster, RingmasterConfig};
pub use wire::{Token, Trace, STOP_SENTINEL, TRACE_CAPACITY};
