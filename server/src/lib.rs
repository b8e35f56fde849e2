//! # Buzz Wire Game Server Library
//!
//! Authoritative server for a VR buzz-wire game. A client streams the 3D
//! position of its controller; the server decides whether the ring is touching
//! the wire, times the run and counts collisions until the player reaches the
//! end of the track.
//!
//! ## Game Phases
//!
//! Each session moves through `not started -> armed -> timing -> completed`:
//! - Starting (or resetting) a session arms it. Nothing is measured yet.
//! - Touching the start zone with the primary point starts the timer.
//! - While timing, every update measures the distance from all supplied
//!   points to the wire and counts new touches, with a cooldown so a single
//!   sustained touch is counted once.
//! - Touching the end zone freezes the elapsed time and the collision count.
//!
//! ## Module Organization
//!
//! ### Clock Module (`clock`)
//! Injectable time source. The server uses the monotonic system clock; tests
//! step a manual clock.
//!
//! ### Track Module (`track`)
//! The fixed wire polyline and the spherical start/end zones.
//!
//! ### Game Module (`game`)
//! [`game::BuzzWireGame`], the per-session state machine.
//!
//! ### Session Manager Module (`session_manager`)
//! One owned game per client address, capacity limits, optional idle
//! eviction, and input validation at the boundary.
//!
//! ### Network Module (`network`)
//! UDP transport. Requests are decoded on a receiver task and handled strictly
//! in arrival order on the main loop, which serializes every state transition.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(ServerConfig {
//!         bind_addr: "127.0.0.1:5000".to_string(),
//!         ..ServerConfig::default()
//!     })
//!     .await?;
//!
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod game;
pub mod network;
pub mod session_manager;
pub mod track;
