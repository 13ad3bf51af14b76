//! Design-level device specializations: typed convenience accessors layered
//! over `Device`. Each wraps a `&mut Device` by reference, validates the
//! capability it needs at construction, and otherwise just calls
//! `Device::set_state`/`get_property` — they add no new wire behaviour.

pub mod color_light;
pub mod dimmer;
pub mod motion;
pub mod switch;
pub mod temperature;

pub use color_light::ColorLightDevice;
pub use dimmer::DimmerDevice;
pub use motion::MotionSensor;
pub use switch::SwitchDevice;
pub use temperature::TemperatureSensor;
