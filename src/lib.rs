//! # signal-relay
//!
//! WebSocket signaling relay for browser peers setting up WebRTC
//! sessions. The relay carries no media: it only assigns each connection
//! an identity and passes offers, answers and ICE candidates between
//! peers in a single flat room.
//!
//! ## Architecture
//!
//! ```text
//! Browsers (WebSocket /ws, static assets)
//!     │
//!     ├── HTTP router (api/)
//!     ├── Connection pumps (ws/)
//!     │
//!     └── Registry actor (domain/)
//!           ├── identity assignment
//!           └── fan-out / unicast routing
//! ```
//!
//! Every pump talks to the registry through a [`domain::RegistryHandle`];
//! the registry task is the only code that touches the participant map.

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod ws;
