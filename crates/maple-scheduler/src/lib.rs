//! Transmission scheduling for one half-duplex Maple Bus.
//!
//! A peripheral builds a [`Transmission`] and submits it through the
//! [`EndpointTxScheduler`] capability. The [`BusScheduler`] accepts it only
//! when nothing else on the bus is outstanding, hands it to the
//! [`PhysicalBus`] on the next dispatch, and settles it when the physical
//! layer reports back through its [`CompletionPort`]. Lifecycle events are
//! queued and delivered by the owner of the scheduler on the task loop,
//! never from the completion boundary.
//!
//! ```
//! use maple_atomic::SpinLock;
//! use maple_errors::BusError;
//! use maple_packet::{BusAddress, Command, MaplePacket};
//! use maple_scheduler::{BusScheduler, EndpointTxScheduler, PhysicalBus, Transmission, TxStatus};
//!
//! struct Wire;
//! impl PhysicalBus for Wire {
//!     fn transmit(&mut self, _frame: &[u8], _expects_reply: bool) -> Result<(), BusError> {
//!         Ok(())
//!     }
//! }
//!
//! let mut scheduler = BusScheduler::new(SpinLock::new());
//! let port = scheduler.completion_port();
//! let packet = MaplePacket::new(Command::DataTransfer, BusAddress::main(0), BusAddress::host(0));
//! let handle = scheduler.schedule(Transmission::new(packet.clone(), false))?;
//!
//! // single in flight
//! assert_eq!(
//!     scheduler.schedule(Transmission::new(packet, false)),
//!     Err(BusError::BusBusy)
//! );
//!
//! scheduler.dispatch(&mut Wire);
//! assert_eq!(scheduler.status(handle), Some(TxStatus::Sent));
//! port.write_complete();
//! scheduler.service();
//! assert_eq!(scheduler.status(handle), Some(TxStatus::Succeeded));
//! # Ok::<(), BusError>(())
//! ```

#![deny(static_mut_refs, clippy::unwrap_used)]

pub mod cadence;
pub mod completion;
pub mod scheduler;
pub mod transmission;

pub use cadence::compute_next_time_cadence;
pub use completion::CompletionPort;
pub use scheduler::{
    BusScheduler, EVENT_QUEUE_CAPACITY, EndpointTxScheduler, PhysicalBus, TX_TABLE_CAPACITY,
    TxEvent, TxEventKind,
};
pub use transmission::{Transmission, TxHandle, TxStatus};
