pub mod discovery;
pub mod handler;

pub use handler::MqttHandler;

use std::sync::Arc;

use hub_core::error::Result;
use hub_core::protocol::{HandlerEvents, ProtocolHandler};

pub fn factory(events: HandlerEvents, config: serde_json::Value) -> Result<Arc<dyn ProtocolHandler>> {
    let handler = MqttHandler::new(events, config)?;
    Ok(handler)
}
