//! Audio subsystem module

pub mod block;
pub mod bridge;
pub mod buffer;
pub mod device;
pub mod period;
pub mod stream;

pub use block::Block;
pub use bridge::{AudioBridge, BridgeOutcome};
pub use buffer::{BlockConsumer, BlockProducer, RingBuffer, RingMonitor};
pub use device::{list_devices, AudioDevice, DeviceInfo};
pub use period::PeriodAdapter;
pub use stream::DuplexStream;
