//! Emulated Maple Bus peripherals.
//!
//! Each variant implements [`Peripheral`]: once per cooperative cycle it
//! polls its input source and, when no transmission of its own is
//! outstanding, submits whatever the protocol owes the console through the
//! bus's [`EndpointTxScheduler`](maple_scheduler::EndpointTxScheduler).
//!
//! | Variant | Function | Autonomous traffic |
//! |---------|----------|--------------------|
//! | [`Controller`] | 0x001 | identification, then condition reports |
//! | [`Mouse`] | 0x200 | identification, then condition reports |
//! | [`Keyboard`] | 0x040 | identification, then condition reports |
//! | [`StorageDevice`] | 0x002 | none; requests come from a [`StorageHandle`] |
//! | [`Vibration`] | 0x100 | a stop on first cycle, then effects from a [`VibrationHandle`] |

#![deny(static_mut_refs, clippy::unwrap_used)]

pub mod controller;
pub mod identification;
pub mod input;
pub mod keyboard;
pub mod mouse;
pub mod peripheral;
pub mod storage;
pub mod vibration;

pub use controller::{
    CONTROLLER_FUNCTION_DEFINITION, Controller, ControllerButtons, ControllerCondition,
};
pub use identification::{Identification, PlayerData, UsbSourceId};
pub use input::{
    GamepadButtons, GamepadState, HatDirection, InputSource, KeyboardState, MouseButtons,
    MouseState,
};
pub use keyboard::{KEYBOARD_FUNCTION_DEFINITION, Keyboard, KeyboardCondition};
pub use mouse::{MOUSE_FUNCTION_DEFINITION, Mouse, MouseCondition};
pub use peripheral::{Peripheral, PeripheralTiming, ReportKind, ReportLink, version_string};
pub use storage::{
    BlockData, MEMORY_CARD_DEFINITION, MediaInfo, StorageDevice, StorageFault, StorageGeometry,
    StorageHandle, StorageRequest,
};
pub use vibration::{
    Inclination, VIBRATION_PACK_DEFINITION, Vibration, VibrationEffect, VibrationFault,
    VibrationHandle,
};
