// controller.rs
use std::{collections::VecDeque, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, sleep, timeout},
};
use tracing::{debug, error, info, warn};

use super::{SequenceConfig, ramp};
use crate::{
    chromaticity::ChromaticityTable,
    commands::{CommandReceiver, CommandSender, command_channel},
    devices::FixtureGateway,
    error::EmptyTableError,
    metrics::{BRIGHTNESS, GATEWAY_ERRORS, RAMP_TICKS, SEQUENCES_ENDED, SEQUENCES_STARTED},
    models::{Action, EndReason, FixtureCommand, FixtureState, SequenceStatus},
};

/// Consecutive fully failed ticks before the outage is reported as an error.
const GATEWAY_ALERT_TICKS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    Idle,
    Running {
        started_at: Instant,
        ends_at: Instant,
        wall_start: DateTime<Utc>,
    },
}

enum Flow {
    Continue,
    Exit,
}

/// Owns the wake-up ramp. Runs on its own task and is driven only through
/// the command channel.
pub struct SequenceController {
    config: Arc<SequenceConfig>,
    table: Arc<ChromaticityTable>,
    gateway: Arc<dyn FixtureGateway>,
    commands: CommandReceiver,
    // Pulled off the channel mid-tick, applied first at the next loop top.
    pending: VecDeque<Action>,
    status: watch::Sender<SequenceStatus>,
    state: SequenceState,
    commanded: Option<FixtureCommand>,
    failed_ticks: u32,
}

/// Handle to a spawned controller.
pub struct ControllerHandle {
    sender: CommandSender,
    status: watch::Receiver<SequenceStatus>,
    task: JoinHandle<()>,
}

impl ControllerHandle {
    pub fn sender(&self) -> CommandSender {
        self.sender.clone()
    }

    pub fn status(&self) -> watch::Receiver<SequenceStatus> {
        self.status.clone()
    }

    /// Stops the controller and waits for its task to exit. No fixture
    /// write happens after this returns.
    pub async fn terminate(self) {
        if self.sender.send(Action::Terminate).is_err() {
            debug!("Sequence controller already stopped");
        }
        if let Err(e) = self.task.await {
            error!(error = %e, "Sequence controller task failed");
        }
    }
}

impl SequenceController {
    pub fn new(
        config: Arc<SequenceConfig>,
        table: Arc<ChromaticityTable>,
        gateway: Arc<dyn FixtureGateway>,
        commands: CommandReceiver,
    ) -> Result<Self, EmptyTableError> {
        if table.is_empty() {
            return Err(EmptyTableError);
        }
        let (status, _) = watch::channel(SequenceStatus::default());
        Ok(Self {
            config,
            table,
            gateway,
            commands,
            pending: VecDeque::new(),
            status,
            state: SequenceState::Idle,
            commanded: None,
            failed_ticks: 0,
        })
    }

    /// Builds a controller with a fresh command channel and runs it on a
    /// dedicated task.
    pub fn spawn(
        config: Arc<SequenceConfig>,
        table: Arc<ChromaticityTable>,
        gateway: Arc<dyn FixtureGateway>,
    ) -> Result<ControllerHandle, EmptyTableError> {
        let (sender, receiver) = command_channel();
        let controller = Self::new(config, table, gateway, receiver)?;
        let status = controller.status.subscribe();
        let task = tokio::spawn(controller.run());
        Ok(ControllerHandle {
            sender,
            status,
            task,
        })
    }

    pub async fn run(mut self) {
        info!(
            duration = ?self.config.duration,
            tick = ?self.config.tick_interval,
            "Sequence controller started"
        );
        loop {
            // Actions are only looked at here, never in the middle of a tick.
            while let Some(action) = self
                .pending
                .pop_front()
                .or_else(|| self.commands.try_recv())
            {
                if let Flow::Exit = self.apply(action) {
                    return;
                }
            }

            match self.state {
                SequenceState::Idle => {
                    match timeout(self.config.idle_poll, self.commands.recv()).await {
                        Ok(Some(action)) => {
                            if let Flow::Exit = self.apply(action) {
                                return;
                            }
                        }
                        Ok(None) => {
                            info!("Command channel closed, sequence controller exiting");
                            return;
                        }
                        Err(_) => {}
                    }
                }
                SequenceState::Running { started_at, .. } => self.tick(started_at).await,
            }
        }
    }

    fn apply(&mut self, action: Action) -> Flow {
        match action {
            Action::Start => {
                let now = Instant::now();
                let wall_start = Utc::now();
                if matches!(self.state, SequenceState::Running { .. }) {
                    info!("Wake-up sequence restarted");
                } else {
                    info!("Wake-up sequence started");
                }
                self.state = SequenceState::Running {
                    started_at: now,
                    ends_at: now + self.config.duration,
                    wall_start,
                };
                self.commanded = None;
                metrics::counter!(SEQUENCES_STARTED).increment(1);
                self.publish_running(0.0);
                Flow::Continue
            }
            Action::Stop => {
                if matches!(self.state, SequenceState::Running { .. }) {
                    info!("Wake-up sequence stopped");
                    self.finish(EndReason::Stopped);
                } else {
                    debug!("Stop received while idle");
                }
                Flow::Continue
            }
            Action::Terminate => {
                if matches!(self.state, SequenceState::Running { .. }) {
                    self.finish(EndReason::Stopped);
                }
                info!("Sequence controller terminated");
                Flow::Exit
            }
        }
    }

    async fn tick(&mut self, started_at: Instant) {
        let elapsed = started_at.elapsed();
        let percent = ramp::progress(elapsed, self.config.duration);
        let command = match ramp::target(&self.config, &self.table, percent) {
            Ok(command) => command,
            Err(e) => {
                error!(error = %e, "Cannot compute ramp target");
                self.finish(EndReason::Stopped);
                return;
            }
        };

        let missed = match self.gateway.write_all(&command).await {
            Ok(missed) => {
                if !missed.is_empty() {
                    debug!(?missed, "Write did not reach every fixture");
                }
                Some(missed)
            }
            Err(e) => {
                warn!(error = %e, "Fixture write failed");
                metrics::counter!(GATEWAY_ERRORS).increment(1);
                None
            }
        };
        self.commanded = Some(command);
        debug!(
            percent,
            brightness = command.brightness,
            x = command.x,
            y = command.y,
            "Ramp tick"
        );
        metrics::counter!(RAMP_TICKS).increment(1);
        metrics::gauge!(BRIGHTNESS).set(f64::from(command.brightness));
        self.publish_running(percent);

        sleep(self.config.tick_interval).await;

        let observed = match self.gateway.read_all().await {
            Ok(states) => Some(states),
            Err(e) => {
                warn!(error = %e, "Fixture read failed");
                metrics::counter!(GATEWAY_ERRORS).increment(1);
                None
            }
        };
        self.record_gateway_health(missed.is_some() && observed.is_some());

        // A failed write leaves nothing confirmed to compare against.
        if let (Some(missed), Some(states), Some(commanded)) = (&missed, &observed, self.commanded)
        {
            if let Some(fixture) = self.overridden(&commanded, states, missed) {
                if self.stop_queued() {
                    debug!(fixture = %fixture.id, "Fixture change follows a queued stop");
                    return;
                }
                info!(
                    fixture = %fixture.id,
                    on = fixture.on,
                    brightness = fixture.brightness,
                    x = fixture.x,
                    y = fixture.y,
                    "Override detected, wake-up sequence aborted"
                );
                self.finish(EndReason::Overridden);
                return;
            }
        }

        if elapsed >= self.config.duration {
            info!("Wake-up sequence completed");
            self.finish(EndReason::Completed);
        }
    }

    /// First fixture whose state no longer matches `commanded`. Fixtures the
    /// write missed are not compared.
    fn overridden<'a>(
        &self,
        commanded: &FixtureCommand,
        observed: &'a [FixtureState],
        missed: &[String],
    ) -> Option<&'a FixtureState> {
        let tolerance = self.config.override_sensitivity;
        observed.iter().find(|fixture| {
            !missed.contains(&fixture.id)
                && (!fixture.on
                    || fixture.brightness != commanded.brightness
                    || (fixture.x - commanded.x).abs() > tolerance
                    || (fixture.y - commanded.y).abs() > tolerance)
        })
    }

    /// Moves queued actions to `pending` and reports whether one of them ends
    /// the sequence. A "sleep" switches the lights off before the controller
    /// sees its Stop.
    fn stop_queued(&mut self) -> bool {
        while let Some(action) = self.commands.try_recv() {
            self.pending.push_back(action);
        }
        self.pending
            .iter()
            .any(|action| matches!(action, Action::Stop | Action::Terminate))
    }

    fn record_gateway_health(&mut self, healthy: bool) {
        if healthy {
            if self.failed_ticks >= GATEWAY_ALERT_TICKS {
                info!(failed_ticks = self.failed_ticks, "Fixture gateway reachable again");
            }
            self.failed_ticks = 0;
            return;
        }
        self.failed_ticks += 1;
        if self.failed_ticks == GATEWAY_ALERT_TICKS {
            error!(
                failed_ticks = self.failed_ticks,
                "Fixture gateway unavailable, retrying every tick"
            );
        }
    }

    fn finish(&mut self, reason: EndReason) {
        self.state = SequenceState::Idle;
        self.commanded = None;
        metrics::counter!(SEQUENCES_ENDED, "reason" => end_label(reason)).increment(1);
        self.status.send_replace(SequenceStatus::Idle {
            last_end: Some(reason),
        });
    }

    fn publish_running(&self, percent: f64) {
        if let SequenceState::Running {
            started_at,
            ends_at,
            wall_start,
        } = self.state
        {
            let length = chrono::Duration::from_std(ends_at - started_at).unwrap_or_default();
            self.status.send_replace(SequenceStatus::Running {
                started_at: wall_start,
                ends_at: wall_start + length,
                percent,
            });
        }
    }
}

fn end_label(reason: EndReason) -> &'static str {
    match reason {
        EndReason::Completed => "completed",
        EndReason::Stopped => "stopped",
        EndReason::Overridden => "overridden",
    }
}
