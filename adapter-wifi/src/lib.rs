pub mod handler;

pub use handler::WifiHandler;

use std::sync::Arc;

use hub_core::error::Result;
use hub_core::protocol::{HandlerEvents, ProtocolHandler};

pub fn factory(events: HandlerEvents, config: serde_json::Value) -> Result<Arc<dyn ProtocolHandler>> {
    let handler = WifiHandler::new(events, config)?;
    Ok(handler)
}
