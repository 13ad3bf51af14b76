pub mod client;
pub mod handler;
pub mod model;

pub use handler::ShellyHandler;

use std::sync::Arc;

use hub_core::error::Result;
use hub_core::protocol::{HandlerEvents, ProtocolHandler};

pub fn factory(events: HandlerEvents, config: serde_json::Value) -> Result<Arc<dyn ProtocolHandler>> {
    let handler = ShellyHandler::new(events, config)?;
    Ok(handler)
}
