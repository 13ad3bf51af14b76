pub mod crypto;
pub mod device;
pub mod discovery;
pub mod framing;
pub mod handler;

pub use handler::TuyaHandler;

use std::sync::Arc;

use hub_core::error::Result;
use hub_core::protocol::{HandlerEvents, ProtocolHandler};

pub fn factory(events: HandlerEvents, config: serde_json::Value) -> Result<Arc<dyn ProtocolHandler>> {
    let handler = TuyaHandler::new(events, config)?;
    Ok(handler)
}
