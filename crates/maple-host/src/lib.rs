//! Player bus orchestration.
//!
//! A [`PlayerBus`] owns one player's [`BusScheduler`](maple_scheduler::BusScheduler),
//! the physical wire behind it and the peripherals emulated on that port: a
//! main peripheral plus up to five expansions. USB attach and detach
//! notifications arrive as [`UsbEvent`]s; the outer loop calls
//! [`PlayerBus::task`] once per scheduling cycle.
//!
//! ```
//! use maple_atomic::SpinLock;
//! use maple_errors::BusError;
//! use maple_host::{PlayerBus, PlayerBusConfig, UsbEvent};
//! use maple_peripherals::{Controller, GamepadState, PlayerData, UsbSourceId};
//! use maple_scheduler::PhysicalBus;
//!
//! #[derive(Default)]
//! struct Wire(Vec<Vec<u8>>);
//!
//! impl PhysicalBus for Wire {
//!     fn transmit(&mut self, frame: &[u8], _expects_reply: bool) -> Result<(), BusError> {
//!         self.0.push(frame.to_vec());
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PlayerBusConfig::default();
//! let mut bus = PlayerBus::new(config, SpinLock::new(), Wire::default())?;
//!
//! let player = PlayerData::new(config.player_index, UsbSourceId::default());
//! let controller = Controller::new(player, &"E6614103E7", GamepadState::default, config.timing);
//! bus.handle(UsbEvent::Attached(Box::new(controller)))?;
//!
//! bus.task(0);
//! assert_eq!(bus.bus().0.len(), 1);
//! # Ok(())
//! # }
//! ```

#![deny(static_mut_refs, clippy::unwrap_used)]

pub mod config;
pub mod player_bus;

pub use config::{
    ENV_FAILURE_WARN_THRESHOLD, ENV_IDENTIFY_PERIOD_US, ENV_REPORT_PERIOD_US, PlayerBusConfig,
};
pub use player_bus::{PeripheralSummary, PlayerBus, UsbEvent};
