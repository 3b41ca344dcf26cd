//! Event loop driving the resend subsystem.
//!
//! [`run_event_loop`] is spawned as a tokio task by
//! [`ResendService::start`](crate::service::ResendService::start). It
//! uses `tokio::select!` to multiplex:
//!
//! 1. **Transport events** — connect, disconnect, inbound messages.
//! 2. **Shutdown signal** — graceful exit via `watch` channel.
//!
//! Failures inside a single event are logged and never crash the loop:
//! a failed resend is retried by the peer's next connect event, and a
//! failed inbound record leaves the message undispatched for the
//! transport's own redelivery to repeat.

use crate::events::TransportEvent;
use crate::incoming;
use crate::service::ServiceRuntime;

/// Runs the event loop until shutdown is signalled or the event
/// channel closes.
pub(crate) async fn run_event_loop(mut rt: ServiceRuntime) {
    tracing::info!("resend event loop started");

    loop {
        tokio::select! {
            // ---------------------------------------------------------------
            // Shutdown signal.
            // ---------------------------------------------------------------
            changed = rt.shutdown_rx.changed() => {
                if changed.is_err() || *rt.shutdown_rx.borrow() {
                    break;
                }
            }

            // ---------------------------------------------------------------
            // Transport events.
            // ---------------------------------------------------------------
            maybe_event = rt.event_rx.recv() => {
                match maybe_event {
                    Some(event) => handle_transport_event(event, &rt),
                    None => {
                        tracing::info!("transport event channel closed");
                        break;
                    }
                }
            }
        }
    }

    tracing::info!("resend event loop stopped");
}

/// Dispatches one transport event.
fn handle_transport_event(event: TransportEvent, rt: &ServiceRuntime) {
    match event {
        TransportEvent::PeerConnected(peer_id) => {
            match rt
                .coordinator
                .on_peer_connected(&peer_id, &rt.gates, rt.transport.as_ref())
            {
                Ok(_outcome) => {}
                Err(e) => {
                    // Busy, storage, or transport failure: the pointer
                    // is untouched and the next connect event retries.
                    tracing::warn!(peer = %peer_id, %e, "resend on connect failed");
                }
            }
        }

        TransportEvent::PeerDisconnected(peer_id) => {
            rt.coordinator.on_peer_disconnected(&peer_id);
        }

        TransportEvent::MessageReceived {
            peer_id,
            hash,
            message_type,
            message_sub_type,
        } => {
            if let Err(e) = incoming::handle_inbound(
                &rt.log,
                &rt.coordinator,
                &peer_id,
                hash,
                message_type,
                message_sub_type,
            ) {
                tracing::warn!(peer = %peer_id, %e, "failed to record inbound message");
            }
        }
    }
}
