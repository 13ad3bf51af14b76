use std::time::Duration;

use chrono::Utc;
use hub_core::bus::{Event, EventBus};
use hub_core::events::{HeartbeatEvent, EVENT_HEARTBEAT};
use tracing::warn;

pub fn spawn(bus: EventBus, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let heartbeat = HeartbeatEvent { ts: Utc::now() };
            let payload = match serde_json::to_value(&heartbeat) {
                Ok(p) => p,
                Err(e) => {
                    warn!("failed to serialize heartbeat: {e}");
                    continue;
                }
            };
            bus.publish(Event::new(EVENT_HEARTBEAT, payload));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test(start_paused = true)]
    async fn publishes_heartbeats_at_interval() {
        let bus = EventBus::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let r = received.clone();
        bus.subscribe(EVENT_HEARTBEAT, Arc::new(move |e| r.lock().unwrap().push(e.clone())));

        spawn(bus, Duration::from_secs(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;

        assert!(received.lock().unwrap().len() >= 2);
    }
}
