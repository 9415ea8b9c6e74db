//! Connection orchestrator, the hexagonal core.
//!
//! [`ConnectionOrchestrator`] owns the FSM, its context, and the credential
//! store.  Inputs come from the [`EventBus`] and the [`CommandQueue`]; the
//! FSM turns each input into a next state plus [`Action`]s, and the
//! orchestrator executes those actions against the ports.  Synchronous results (the scan list, a
//! refused connect call) are fed straight back into the FSM.
//!
//! ```text
//!  EventBus ──▶ ┌────────────────────────────┐ ──▶ RadioPort
//!               │   ConnectionOrchestrator   │ ──▶ ProvisioningPort
//! AppCommand ──▶│   FSM · CredentialStore    │ ──▶ EventSink
//!               └────────────────────────────┘
//! ```

use heapless::Deque;
use log::{debug, error, info, warn};

use crate::config::ManagerConfig;
use crate::credentials::{CredentialStore, MAX_AP_COUNT, Upsert};
use crate::error::Error;
use crate::events::{EventBus, NetEvent};
use crate::fsm::context::FsmContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Action, Fsm, Input, ScanCandidate, StateId};

use super::commands::{AppCommand, CommandQueue};
use super::events::AppEvent;
use super::ports::{EventSink, ProvisioningPort, RadioPort, StoragePort};

/// Follow-up inputs produced while executing one batch of actions.
const FEEDBACK_DEPTH: usize = 4;

enum Intake {
    Command(AppCommand),
    Net(NetEvent),
}

// ───────────────────────────────────────────────────────────────
// ConnectionOrchestrator
// ───────────────────────────────────────────────────────────────

/// Single owner of the credential store and the connection state machine.
pub struct ConnectionOrchestrator<S, R, P, K, const N: usize = MAX_AP_COUNT>
where
    S: StoragePort,
    R: RadioPort,
    P: ProvisioningPort,
    K: EventSink,
{
    store: CredentialStore<S, N>,
    radio: R,
    provisioner: P,
    sink: K,
    fsm: Fsm,
    ctx: FsmContext,
}

impl<S, R, P, K, const N: usize> ConnectionOrchestrator<S, R, P, K, N>
where
    S: StoragePort,
    R: RadioPort,
    P: ProvisioningPort,
    K: EventSink,
{
    /// Assemble the orchestrator.  The store should already be initialised.
    ///
    /// Does **not** start the FSM; call [`start`](Self::start) next.
    pub fn new(
        store: CredentialStore<S, N>,
        radio: R,
        provisioner: P,
        sink: K,
        config: ManagerConfig,
    ) -> Self {
        Self {
            store,
            radio,
            provisioner,
            sink,
            fsm: Fsm::new(build_state_table(), StateId::Idle),
            ctx: FsmContext::new(config),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Enter `Idle` and bring the radio up.  The radio answers with
    /// `InterfaceStarted` on the bus.
    pub fn start(&mut self) -> Result<(), Error> {
        self.fsm.start(&mut self.ctx);
        self.sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!(
            "ConnectionOrchestrator started in {} ({} stored network(s))",
            self.fsm.current_name(),
            self.store.len()
        );
        self.store.log_all();
        self.radio.start()?;
        Ok(())
    }

    /// Handle every event currently queued on the bus.  Returns how many
    /// were handled.
    pub fn poll(&mut self, bus: &EventBus) -> usize {
        let mut handled = 0;
        while let Some(event) = bus.try_next() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Handle every command currently queued.  Returns how many were handled.
    pub fn poll_commands(&mut self, commands: &CommandQueue) -> usize {
        let mut handled = 0;
        while let Some(cmd) = commands.try_next() {
            self.handle_command(cmd);
            handled += 1;
        }
        handled
    }

    /// Block until a command or an event arrives and handle it.  Commands
    /// win when both are ready.
    pub fn step(&mut self, bus: &EventBus, commands: &CommandQueue) {
        let next = futures_lite::future::block_on(futures_lite::future::or(
            async { Intake::Command(commands.next().await) },
            async { Intake::Net(bus.next().await) },
        ));
        match next {
            Intake::Command(cmd) => self.handle_command(cmd),
            Intake::Net(event) => self.handle_event(event),
        }
    }

    /// Consume commands and events forever.
    pub fn run(&mut self, bus: &EventBus, commands: &CommandQueue) -> ! {
        loop {
            self.step(bus, commands);
        }
    }

    // ── Event handling ────────────────────────────────────────

    /// Feed one bus event through the FSM and execute the resulting actions.
    pub fn handle_event(&mut self, event: NetEvent) {
        debug!("event: {:?}", event);
        self.feed(Input::Net(event));
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external management command.
    pub fn handle_command(&mut self, cmd: AppCommand) {
        match cmd {
            AppCommand::SetAutoReconnect(enabled) => {
                self.ctx.config.auto_reconnect = enabled;
                info!("auto-reconnect {}", if enabled { "enabled" } else { "disabled" });
            }
            AppCommand::Forget(ssid) => match self.store.remove_by_ssid(&ssid) {
                Ok(_) => {
                    self.sink.emit(&AppEvent::CredentialForgotten {
                        ssid: ssid.clone(),
                    });
                    self.persist();
                    self.feed(Input::Forgotten(Some(ssid)));
                }
                Err(e) => debug!("forget '{}': {}", ssid, e),
            },
            AppCommand::ForgetAll => {
                let forgotten: heapless::Vec<_, N> =
                    self.store.records().iter().map(|r| r.ssid.clone()).collect();
                if let Err(e) = self.store.clear_all() {
                    warn!("forget all: {}", e);
                    return;
                }
                for ssid in forgotten {
                    self.sink.emit(&AppEvent::CredentialForgotten { ssid });
                }
                self.persist();
                self.feed(Input::Forgotten(None));
            }
            AppCommand::Restart => {
                let prev = self.fsm.current_state();
                if prev == StateId::Connected {
                    self.radio.disconnect();
                }
                self.fsm.reenter(StateId::TryingStored, &mut self.ctx);
                self.sink.emit(&AppEvent::StateChanged {
                    from: prev,
                    to: StateId::TryingStored,
                });
                let mut feedback = Deque::new();
                self.execute_actions(&mut feedback);
                self.drain(feedback);
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.ctx.config
    }

    pub fn store(&self) -> &CredentialStore<S, N> {
        &self.store
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }

    pub fn provisioner_mut(&mut self) -> &mut P {
        &mut self.provisioner
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    // ── Internal ──────────────────────────────────────────────

    fn feed(&mut self, input: Input) {
        let mut queue = Deque::new();
        if queue.push_back(input).is_ok() {
            self.drain(queue);
        }
    }

    /// Run queued inputs to quiescence.
    fn drain(&mut self, mut queue: Deque<Input, FEEDBACK_DEPTH>) {
        while let Some(input) = queue.pop_front() {
            let prev = self.fsm.current_state();
            if self.fsm.handle(&input, &mut self.ctx) {
                self.report_transition(prev);
            }
            self.execute_actions(&mut queue);
        }
    }

    fn report_transition(&mut self, from: StateId) {
        let to = self.fsm.current_state();
        self.sink.emit(&AppEvent::StateChanged { from, to });
        if to == StateId::Connected {
            if let Some(ssid) = self.ctx.connected_ssid.clone() {
                self.sink.emit(&AppEvent::Connected { ssid });
            }
        }
    }

    /// Translate FSM actions into store and port calls.
    fn execute_actions(&mut self, feedback: &mut Deque<Input, FEEDBACK_DEPTH>) {
        let actions = core::mem::take(&mut self.ctx.actions);
        for action in actions {
            let follow_up = match action {
                Action::Scan => Some(self.scan()),
                Action::Connect {
                    ssid,
                    passphrase,
                    bssid,
                } => match self.radio.connect(&ssid, &passphrase, bssid) {
                    Ok(()) => None,
                    Err(e) => {
                        warn!("connect '{}' refused: {}", ssid, e);
                        Some(Input::ConnectFailed)
                    }
                },
                Action::Disconnect => {
                    self.radio.disconnect();
                    None
                }
                Action::StartProvisioning => {
                    if let Err(e) = self.provisioner.start() {
                        error!("provisioning start failed: {}", e);
                    }
                    None
                }
                Action::StopProvisioning => {
                    if self.provisioner.is_active() {
                        self.provisioner.stop();
                    }
                    None
                }
                Action::RememberCredential(creds) => {
                    match self
                        .store
                        .add_or_update(&creds.ssid, &creds.passphrase, creds.bssid)
                    {
                        Ok(Upsert::Replaced { evicted }) => {
                            self.sink
                                .emit(&AppEvent::CredentialEvicted { ssid: evicted });
                            self.sink
                                .emit(&AppEvent::CredentialStored { ssid: creds.ssid });
                        }
                        Ok(_) => {
                            self.sink
                                .emit(&AppEvent::CredentialStored { ssid: creds.ssid });
                        }
                        Err(e) => warn!("remember '{}': {}", creds.ssid, e),
                    }
                    None
                }
                Action::ForgetCredential(ssid) => {
                    match self.store.remove_by_ssid(&ssid) {
                        Ok(_) => self.sink.emit(&AppEvent::CredentialForgotten { ssid }),
                        Err(e) => debug!("forget '{}': {}", ssid, e),
                    }
                    None
                }
                Action::ReinforceCredential(ssid) => {
                    if let Err(e) = self.store.increment_use_count(&ssid) {
                        debug!("reinforce '{}': {}", ssid, e);
                    }
                    None
                }
                Action::Persist => {
                    self.persist();
                    None
                }
            };

            if let Some(input) = follow_up {
                if feedback.push_back(input).is_err() {
                    warn!("feedback queue full, input dropped");
                }
            }
        }
    }

    /// Scan and annotate every visible network with its stored passphrase.
    fn scan(&mut self) -> Input {
        let mut candidates = heapless::Vec::new();
        match self.radio.scan() {
            Ok(aps) => {
                for ap in aps {
                    let stored = self
                        .store
                        .find_by_ssid(&ap.ssid)
                        .ok()
                        .map(|(_, rec)| rec.passphrase.clone());
                    // Both vectors share the same bound.
                    let _ = candidates.push(ScanCandidate { ap, stored });
                }
            }
            Err(e) => warn!("scan failed: {}", e),
        }
        Input::ScanCompleted(candidates)
    }

    /// Persist failures are reported, never fatal.
    fn persist(&mut self) {
        if let Err(e) = self.store.persist() {
            error!("credential persist failed: {}", e);
            self.sink.emit(&AppEvent::PersistFailed(e));
        }
    }
}
