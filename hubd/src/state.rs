use std::sync::Arc;

use hub_core::manager::DeviceManager;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<DeviceManager>,
}
