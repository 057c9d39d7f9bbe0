//! Event runtime
//!
//! Switch sessions and the routing-protocol engine produce events
//! concurrently; a single worker drains them from a bounded queue and runs
//! each handler to completion. Producers hold a cloneable
//! [`ControllerHandle`].

use crate::controller::{Controller, Outcome};
use crate::speaker::{BestPathEvent, RouteListener};
use crate::switch::{PacketIn, SwitchConnection, SwitchId};
use crate::{Error, Result};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// How often learned addresses are aged
pub const AGING_INTERVAL: Duration = Duration::from_secs(30);

/// Input to the controller worker
pub enum ControllerEvent {
    SwitchConnected {
        switch: SwitchId,
        connection: Arc<dyn SwitchConnection>,
    },
    SwitchDisconnected(SwitchId),
    PacketIn(PacketIn),
    BestPathChanged(BestPathEvent),
    PeerUp {
        address: Ipv4Addr,
        remote_as: u32,
    },
    PeerDown {
        address: Ipv4Addr,
        remote_as: u32,
    },
    /// Completes once every earlier event has been handled
    Barrier(oneshot::Sender<()>),
}

impl ControllerEvent {
    fn name(&self) -> &'static str {
        match self {
            ControllerEvent::SwitchConnected { .. } => "switch-connected",
            ControllerEvent::SwitchDisconnected(_) => "switch-disconnected",
            ControllerEvent::PacketIn(_) => "packet-in",
            ControllerEvent::BestPathChanged(_) => "best-path",
            ControllerEvent::PeerUp { .. } => "peer-up",
            ControllerEvent::PeerDown { .. } => "peer-down",
            ControllerEvent::Barrier(_) => "barrier",
        }
    }
}

/// Sending side of the controller event queue
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<ControllerEvent>,
}

impl ControllerHandle {
    /// Queue an event, waiting for room.
    pub async fn send(&self, event: ControllerEvent) -> Result<()> {
        self.tx.send(event).await.map_err(|_| Error::QueueClosed)
    }

    /// Queue an event without waiting. A full queue is reported, not
    /// absorbed.
    pub fn try_send(&self, event: ControllerEvent) -> Result<()> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::QueueFull,
            mpsc::error::TrySendError::Closed(_) => Error::QueueClosed,
        })
    }

    /// Wait until everything queued before this call has been handled.
    pub async fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(ControllerEvent::Barrier(done_tx)).await?;
        done_rx.await.map_err(|_| Error::QueueClosed)
    }
}

/// Start the worker on the current tokio runtime.
///
/// Best-path and peer events go to `speaker` when one is configured,
/// otherwise routes are applied to the controller's table directly. The
/// worker exits once every handle is dropped.
pub fn spawn(
    controller: Arc<Controller>,
    speaker: Option<Arc<dyn RouteListener>>,
    queue_depth: usize,
) -> (ControllerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(queue_depth.max(1));
    let worker = Worker {
        controller,
        speaker,
    };
    let task = tokio::spawn(worker.run(rx));
    (ControllerHandle { tx }, task)
}

struct Worker {
    controller: Arc<Controller>,
    speaker: Option<Arc<dyn RouteListener>>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::Receiver<ControllerEvent>) {
        info!("Controller worker started");
        let mut aging_timer = tokio::time::interval(AGING_INTERVAL);
        aging_timer.tick().await;

        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Some(event) => self.handle(event),
                        None => break,
                    }
                }
                _ = aging_timer.tick() => {
                    let expired = self.controller.learned().expire();
                    if expired > 0 {
                        debug!("Aged out {} learned addresses", expired);
                    }
                }
            }
        }
        info!("Controller worker stopped");
    }

    fn handle(&self, event: ControllerEvent) {
        trace!("Handling {} event", event.name());
        match event {
            ControllerEvent::SwitchConnected { switch, connection } => {
                if let Err(e) = self.controller.switch_connected(switch, connection) {
                    debug!("Table-miss provisioning for {} failed: {}", switch, e);
                }
            }
            ControllerEvent::SwitchDisconnected(switch) => {
                self.controller.switch_disconnected(switch);
            }
            ControllerEvent::PacketIn(packet) => {
                let outcome = self.controller.handle_packet_in(&packet);
                if let Outcome::Dropped(kind) = outcome {
                    trace!("Packet-in from {} dropped ({})", packet.switch, kind);
                }
            }
            ControllerEvent::BestPathChanged(event) => match &self.speaker {
                Some(speaker) => {
                    speaker.on_best_path_change(&event);
                    let routes = self.controller.hop_db().len();
                    self.controller.metrics().set_route_count(routes);
                }
                None if event.is_withdraw => self.controller.route_withdrawn(event.prefix),
                None => self.controller.route_changed(event.prefix, event.nexthop),
            },
            ControllerEvent::PeerUp { address, remote_as } => match &self.speaker {
                Some(speaker) => speaker.on_peer_up(address, remote_as),
                None => debug!("Peer {} up with no speaker configured", address),
            },
            ControllerEvent::PeerDown { address, remote_as } => match &self.speaker {
                Some(speaker) => speaker.on_peer_down(address, remote_as),
                None => debug!("Peer {} down with no speaker configured", address),
            },
            ControllerEvent::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
}
