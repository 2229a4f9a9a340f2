use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    ledger::{snapshot::StatusLine, Ledgers},
    utils::clock::Clock,
};

use super::{
    session::TrackerSession,
    signals::{HostRequest, InboundMessage, OutboundMessage},
};

/// The periodic driver of a [TrackerSession]. Ticks on a fixed interval, applies inbound
/// messages between ticks and hands ledger snapshots to the persist module without waiting
/// for them to be written.
pub struct AccumulationLoop {
    session: TrackerSession,
    inbound: mpsc::Receiver<InboundMessage>,
    persist: mpsc::Sender<Ledgers>,
    outbound: mpsc::Sender<OutboundMessage>,
    shutdown: CancellationToken,
    tick_interval: Duration,
    clock: Box<dyn Clock>,
    last_status: Option<StatusLine>,
}

impl AccumulationLoop {
    pub fn new(
        session: TrackerSession,
        inbound: mpsc::Receiver<InboundMessage>,
        persist: mpsc::Sender<Ledgers>,
        outbound: mpsc::Sender<OutboundMessage>,
        shutdown: CancellationToken,
        tick_interval: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            session,
            inbound,
            persist,
            outbound,
            shutdown,
            tick_interval,
            clock,
            last_status: None,
        }
    }

    /// Executes the loop until shutdown, then performs the final flush.
    pub async fn run(mut self) -> Result<()> {
        let status = self.session.status(self.clock.time());
        self.publish_status(status);

        let mut next_tick = self.clock.instant() + self.tick_interval;
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = self.clock.sleep_until(next_tick) => {
                    next_tick += self.tick_interval;
                    let now = self.clock.instant();
                    if next_tick < now {
                        // Fell behind, for example after a suspend. The wall clock delta of the
                        // next tick still covers the gap.
                        next_tick = now + self.tick_interval;
                    }
                    self.tick();
                }
                message = self.inbound.recv() => match message {
                    Some(message) => self.handle(message),
                    None => break,
                },
            }
        }

        self.finish().await
    }

    fn tick(&mut self) {
        let outcome = self.session.tick(self.clock.time());
        if outcome.persist_due {
            let ledgers = self.session.ledgers().clone();
            self.dispatch_persist(ledgers);
        }
        self.publish_status(outcome.status);
    }

    fn handle(&mut self, message: InboundMessage) {
        let now = self.clock.time();
        match message {
            InboundMessage::Activity(signal) => self.session.handle_signal(signal, now),
            InboundMessage::Request(HostRequest::DeleteHistory { project, date }) => {
                info!("Deleting {project} on {date}");
                self.session.apply_deletion(&project, &date);
                self.dispatch_persist(self.session.ledgers().clone());
                self.publish_stats();
            }
            InboundMessage::Request(HostRequest::ResetAll) => {
                self.session.reset_all();
                self.dispatch_persist(self.session.ledgers().clone());
                let status = self.session.status(now);
                self.publish_status(status);
                self.publish_stats();
            }
            InboundMessage::Request(HostRequest::RequestStats) => self.publish_stats(),
        }
    }

    fn dispatch_persist(&self, ledgers: Ledgers) {
        match self.persist.try_send(ledgers) {
            Ok(_) => debug!("Dispatched ledgers for persisting"),
            Err(TrySendError::Full(_)) => warn!("Persistence is behind, skipping this flush"),
            Err(TrySendError::Closed(_)) => error!("Persistence stopped, ledgers are not saved"),
        }
    }

    fn publish_status(&mut self, status: StatusLine) {
        if self
            .last_status
            .as_ref()
            .is_some_and(|last| last.renders_like(&status))
        {
            return;
        }
        self.last_status = Some(status.clone());
        self.send_outbound(OutboundMessage::Status(status));
    }

    fn publish_stats(&self) {
        self.send_outbound(OutboundMessage::StatsData {
            payload: self.session.stats(),
        });
    }

    fn send_outbound(&self, message: OutboundMessage) {
        if let Err(e) = self.outbound.try_send(message) {
            warn!("Dropping message for the host: {e}");
        }
    }

    /// Flushes the working total and waits until the persist module accepted the ledgers.
    async fn finish(mut self) -> Result<()> {
        let ledgers = self.session.persist_snapshot();
        if let Err(e) = self.persist.send(ledgers).await {
            error!("Final flush failed, persistence already stopped: {e}");
        }
        info!(
            "Stopped tracking with {}ms recorded today",
            self.session.today_ms()
        );
        Ok(())
    }
}
