pub mod coordinator;
pub mod device_db;
pub mod frame;
pub mod handler;
pub mod transport;

pub use handler::ZigbeeHandler;

use std::sync::Arc;

use hub_core::error::Result;
use hub_core::protocol::{HandlerEvents, ProtocolHandler};

pub fn factory(events: HandlerEvents, config: serde_json::Value) -> Result<Arc<dyn ProtocolHandler>> {
    let handler = ZigbeeHandler::new(events, config)?;
    Ok(handler)
}
