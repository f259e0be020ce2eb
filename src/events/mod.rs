// events/mod.rs
use std::sync::Arc;

use tracing::{info, trace, warn};

use crate::{
    commands::CommandSender,
    devices::FixtureGateway,
    models::{Action, FixtureCommand},
};

pub const WAKE_UP: &str = "wake up";
pub const SLEEP: &str = "sleep";

/// Turns inbound text commands into sequence actions.
#[derive(Clone)]
pub struct EventDispatcher {
    commands: CommandSender,
    gateway: Arc<dyn FixtureGateway>,
}

impl EventDispatcher {
    pub fn new(commands: CommandSender, gateway: Arc<dyn FixtureGateway>) -> Self {
        Self { commands, gateway }
    }

    pub async fn on_message(&self, payload: &str) {
        match payload {
            WAKE_UP => {
                info!("Wake up requested");
                self.send(Action::Start);
            }
            SLEEP => {
                info!("Sleep requested");
                self.send(Action::Stop);
                // Not tied to the controller noticing the stop.
                if let Err(e) = self.gateway.write_all(&FixtureCommand::off()).await {
                    warn!(error = %e, "Failed to switch lights off");
                }
            }
            other => trace!(payload = other, "Ignoring message"),
        }
    }

    pub fn on_connect(&self, source: &str) {
        info!(source, "Command source connected");
    }

    pub fn on_disconnect(&self, source: &str) {
        info!(source, "Command source disconnected");
    }

    fn send(&self, action: Action) {
        if let Err(e) = self.commands.send(action) {
            warn!(?action, error = %e, "Dropping action");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{commands::command_channel, devices::SimulatedFixtures};

    fn dispatcher() -> (
        EventDispatcher,
        crate::commands::CommandReceiver,
        Arc<SimulatedFixtures>,
    ) {
        let (tx, rx) = command_channel();
        let fixtures = Arc::new(SimulatedFixtures::new(["1", "2"]));
        let gateway: Arc<dyn FixtureGateway> = fixtures.clone();
        (EventDispatcher::new(tx, gateway), rx, fixtures)
    }

    #[tokio::test]
    async fn wake_up_starts_the_sequence() {
        let (dispatcher, mut rx, fixtures) = dispatcher();
        dispatcher.on_message("wake up").await;
        assert_eq!(rx.try_recv(), Some(Action::Start));
        assert!(fixtures.writes().await.is_empty());
    }

    #[tokio::test]
    async fn sleep_stops_and_switches_off() {
        let (dispatcher, mut rx, fixtures) = dispatcher();
        fixtures
            .write_all(&FixtureCommand {
                on: true,
                brightness: 200,
                x: 0.4,
                y: 0.4,
            })
            .await
            .unwrap();

        dispatcher.on_message("sleep").await;
        assert_eq!(rx.try_recv(), Some(Action::Stop));
        assert_eq!(fixtures.writes().await.last(), Some(&FixtureCommand::off()));
        for state in fixtures.read_all().await.unwrap() {
            assert!(!state.on);
        }
    }

    #[tokio::test]
    async fn other_payloads_are_ignored() {
        let (dispatcher, mut rx, fixtures) = dispatcher();
        for payload in ["0", "Wake up", "wakeup", " sleep", "SLEEP", ""] {
            dispatcher.on_message(payload).await;
        }
        assert_eq!(rx.try_recv(), None);
        assert!(fixtures.writes().await.is_empty());
    }

    #[tokio::test]
    async fn sleep_still_switches_off_without_controller() {
        let (dispatcher, rx, fixtures) = dispatcher();
        drop(rx);
        dispatcher.on_message("sleep").await;
        assert_eq!(fixtures.writes().await, vec![FixtureCommand::off()]);
    }

    #[tokio::test]
    async fn keeps_order_of_messages() {
        let (dispatcher, mut rx, _fixtures) = dispatcher();
        dispatcher.on_message("sleep").await;
        dispatcher.on_message("wake up").await;
        assert_eq!(rx.try_recv(), Some(Action::Stop));
        assert_eq!(rx.try_recv(), Some(Action::Start));
    }
}
