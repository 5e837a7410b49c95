//! Last-command snapshot: the control loop is the only writer, any number of readers
//! (telemetry, link layer) observe the most recent command without touching the autopilot.

use kurier_proto::ActuatorCommand;
use tokio::sync::watch;

#[derive(Debug)]
pub struct CommandPublisher {
    tx: watch::Sender<Option<ActuatorCommand>>,
}

#[derive(Debug, Clone)]
pub struct CommandSubscriber {
    rx: watch::Receiver<Option<ActuatorCommand>>,
}

impl CommandPublisher {
    pub fn new() -> (Self, CommandSubscriber) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, CommandSubscriber { rx })
    }

    /// Never blocks; succeeds even when every reader is gone.
    pub fn publish(&self, cmd: ActuatorCommand) {
        self.tx.send_replace(Some(cmd));
    }

    pub fn subscribe(&self) -> CommandSubscriber {
        CommandSubscriber { rx: self.tx.subscribe() }
    }
}

impl CommandSubscriber {
    pub fn latest(&self) -> Option<ActuatorCommand> {
        self.rx.borrow().clone()
    }

    /// Wait for the next publish. Returns `None` once the publisher is dropped.
    pub async fn changed(&mut self) -> Option<ActuatorCommand> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurier_proto::{FlightMode, Targets};

    fn cmd(mode: FlightMode, thrust: f64) -> ActuatorCommand {
        let mut c = ActuatorCommand::idle(mode, None, Targets::default());
        c.thrust = thrust;
        c
    }

    #[test]
    fn readers_see_latest_only() {
        let (publisher, sub) = CommandPublisher::new();
        assert!(sub.latest().is_none());
        publisher.publish(cmd(FlightMode::HoldAlt, 0.4));
        publisher.publish(cmd(FlightMode::Cruise, 0.6));
        let other = publisher.subscribe();
        assert_eq!(sub.latest().unwrap().mode, FlightMode::Cruise);
        assert_eq!(other.latest().unwrap().thrust, 0.6);
    }

    #[test]
    fn publish_without_readers() {
        let (publisher, sub) = CommandPublisher::new();
        drop(sub);
        publisher.publish(cmd(FlightMode::Land, 0.3));
    }

    #[tokio::test]
    async fn changed_wakes_on_publish_and_ends_on_drop() {
        let (publisher, mut sub) = CommandPublisher::new();
        let reader = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(c) = sub.changed().await {
                seen.push(c.mode);
                if c.mode == FlightMode::Land {
                    break;
                }
            }
            seen
        });
        tokio::task::yield_now().await;
        publisher.publish(cmd(FlightMode::Land, 0.3));
        let seen = reader.await.unwrap();
        assert_eq!(seen.last(), Some(&FlightMode::Land));

        let (publisher, mut sub) = CommandPublisher::new();
        drop(publisher);
        assert!(sub.changed().await.is_none());
    }
}
