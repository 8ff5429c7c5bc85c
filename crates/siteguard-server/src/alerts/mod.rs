//! Alert outputs: the flag bus, the wearable radio link, and the local sound.

pub mod bus;
pub mod dispatcher;
pub mod radio;
pub mod sound;

pub use bus::{AlertBus, BusError, InMemoryAlertBus};
pub use dispatcher::{AlertDispatcher, AlertTransition, DispatchReport, LocalAlert};
pub use radio::{ChannelRadioLink, RadioCommand, RadioError, RadioLink};
pub use sound::{AlertSound, LoggingSound, SoundLoop};
