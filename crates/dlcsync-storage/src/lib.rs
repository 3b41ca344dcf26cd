//! Durable storage for DLC peer-protocol messages.
//!
//! Provides a sled-backed, content-addressed message log and the
//! per-peer "last outbound message" resend cursor. Subsystems: storage
//! engine (database lifecycle), typed tree wrapper (bincode codec),
//! message log (idempotent append + per-peer index), outbound cursor
//! (replace-not-append pointer with referential integrity), and the
//! process monotonic clock that stamps every row.
//!
//! The log and cursor are updated together in one sled multi-tree
//! transaction: no reader ever observes a message without its cursor
//! update, or a cursor pointing at a message that was not durably
//! recorded first.

pub mod clock;
pub mod engine;
pub mod messages;
pub mod outbound;
pub mod typed_tree;
