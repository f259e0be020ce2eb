// commands/mod.rs
use crate::{error::ChannelClosed, models::Action};
use tokio::sync::mpsc;

pub fn command_channel() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandSender { tx }, CommandReceiver { rx })
}

/// Producer side. Cheap to clone, never blocks.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<Action>,
}

impl CommandSender {
    pub fn send(&self, action: Action) -> Result<(), ChannelClosed> {
        self.tx.send(action).map_err(|_| ChannelClosed)
    }
}

#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::UnboundedReceiver<Action>,
}

impl CommandReceiver {
    /// Waits for the next action. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Action> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Action> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_send_order_across_clones() {
        let (tx, mut rx) = command_channel();
        let other = tx.clone();
        tx.send(Action::Stop).unwrap();
        other.send(Action::Start).unwrap();
        tx.send(Action::Terminate).unwrap();

        assert_eq!(rx.recv().await, Some(Action::Stop));
        assert_eq!(rx.try_recv(), Some(Action::Start));
        assert_eq!(rx.recv().await, Some(Action::Terminate));
        assert_eq!(rx.try_recv(), None);
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_reports_closed() {
        let (tx, rx) = command_channel();
        drop(rx);
        assert_eq!(tx.send(Action::Start), Err(ChannelClosed));
    }

    #[tokio::test]
    async fn recv_ends_when_senders_are_gone() {
        let (tx, mut rx) = command_channel();
        tx.send(Action::Start).unwrap();
        drop(tx);
        assert_eq!(rx.recv().await, Some(Action::Start));
        assert_eq!(rx.recv().await, None);
    }
}
