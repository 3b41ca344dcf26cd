//! Resend coordination between the message log and the peer transport.
//!
//! This crate sits between an external transport (a Lightning-style
//! peer link) and the contract state machine. On every peer reconnect
//! it replays the single pending outbound message from the
//! [`OutboundCursor`](dlcsync_storage::outbound::OutboundCursor), and
//! on every inbound message it records before dispatch so the state
//! machine has a dedup point.
//!
//! Subsystems: the [`Transport`](transport::Transport) seam, the
//! unified [`TransportEvent`](events::TransportEvent) enum, the
//! per-peer operation gate, the
//! [`ResendCoordinator`](coordinator::ResendCoordinator),
//! inbound/outbound orchestration, and the tokio event loop with its
//! service lifecycle.

pub mod coordinator;
pub mod event_loop;
pub mod events;
pub mod gate;
pub mod incoming;
pub mod outgoing;
pub mod service;
pub mod transport;
