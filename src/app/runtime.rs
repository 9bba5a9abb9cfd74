use std::{sync::Arc, time::Duration};

use kameo::actor::ActorRef;
use log::{debug, error, info, warn};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use election_contract::ElectionContract;
use vote_ui_protocol::v1::AppEvent;

use crate::{
    app::{
        actor::{InitialLoad, PollTick, VotingApp},
        scheduler::{IntervalScheduler, PollScheduler, PollSchedulerConfig, DEFAULT_POLL_INTERVAL},
    },
    reconciler::Evidence,
    session::WalletSession,
};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub poll_interval: Duration,
    pub advance_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            advance_secs: crate::config::DEFAULT_ADVANCE_SECS,
        }
    }
}

/// Handle to the running app actor and its feeder tasks.
pub struct AppHandle {
    pub app: ActorRef<VotingApp>,
    /// UI events, in the order the actor produced them.
    pub events: mpsc::UnboundedReceiver<AppEvent>,
    /// Stops the poll loop and the forwarders.
    pub cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl AppHandle {
    /// Stops the feeders and the actor. Reads still in flight are dropped.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.app.stop_gracefully().await {
            debug!("[shutdown] Actor already stopped: {e}");
        }
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("[shutdown] Task ended abnormally: {e}");
            }
        }
        info!("[shutdown] App stopped");
    }
}

pub async fn spawn_app(
    contract: Arc<dyn ElectionContract>,
    session: WalletSession,
    config: AppConfig,
) -> AppHandle {
    let scheduler = IntervalScheduler::new(PollSchedulerConfig {
        poll_interval: config.poll_interval,
    });
    spawn_app_with_scheduler(contract, session, config, Box::new(scheduler)).await
}

/// Starts the actor and wires evidence, polling and conclusion events into it.
pub async fn spawn_app_with_scheduler(
    contract: Arc<dyn ElectionContract>,
    session: WalletSession,
    config: AppConfig,
    mut scheduler: Box<dyn PollScheduler>,
) -> AppHandle {
    let (events_tx, events_rx) = mpsc::unbounded_channel::<AppEvent>();
    let (evidence_tx, mut evidence_rx) = mpsc::unbounded_channel::<Evidence>();

    let app = kameo::spawn(VotingApp::new(
        contract.clone(),
        session,
        events_tx,
        evidence_tx,
        config.advance_secs,
    ));
    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();

    // Spawned reads -> actor
    tasks.push(tokio::spawn({
        let app = app.clone();
        let cancel = cancel.clone();
        async move {
            info!("Evidence forwarding started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    maybe = evidence_rx.recv() => {
                        let Some(evidence) = maybe else { break };
                        if let Err(e) = app.ask(evidence).await {
                            error!("Error forwarding evidence: {e}");
                            break;
                        }
                    }
                }
            }
            info!("Evidence forwarding stopped");
        }
    }));

    // Poll loop
    tasks.push(tokio::spawn({
        let app = app.clone();
        let cancel = cancel.clone();
        async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = scheduler.next_tick() => {
                        if let Err(e) = app.ask(PollTick).await {
                            error!("Error delivering poll tick: {e}");
                            break;
                        }
                    }
                }
            }
            debug!("Poll loop stopped");
        }
    }));

    // ElectionConcluded -> actor
    match contract.subscribe_conclusions().await {
        Ok(mut conclusions) => tasks.push(tokio::spawn({
            let app = app.clone();
            let cancel = cancel.clone();
            async move {
                info!("Conclusion forwarding started");
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        maybe = conclusions.recv() => {
                            let Some(notice) = maybe else { break };
                            if let Err(e) = app.ask(notice).await {
                                error!("Error forwarding conclusion event: {e}");
                                break;
                            }
                        }
                    }
                }
                info!("Conclusion forwarding stopped");
            }
        })),
        // Polling still converges without events.
        Err(e) => warn!("Conclusion events unavailable, relying on polling: {e}"),
    }

    if let Err(e) = app.ask(InitialLoad).await {
        error!("Error issuing initial load: {e}");
    }

    AppHandle {
        app,
        events: events_rx,
        cancel,
        tasks,
    }
}
