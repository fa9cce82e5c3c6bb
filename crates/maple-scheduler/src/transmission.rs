//! One scheduled send-and-optionally-receive exchange.

use maple_packet::{BusAddress, MaplePacket, OPEN_LINE_CHECK_US, RESPONSE_TIMEOUT_US};

/// Lifecycle state of a [`Transmission`].
///
/// The only legal sequences are Pending → Sent → Succeeded and
/// Pending → Sent → Failed. Terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TxStatus {
    /// Accepted by the scheduler, not yet on the wire
    Pending = 0,
    /// Handed to the physical layer
    Sent = 1,
    /// Write finished and, if one was expected, a valid reply decoded
    Succeeded = 2,
    /// Write or read failed
    Failed = 3,
}

impl TxStatus {
    /// True for Succeeded and Failed.
    pub fn is_terminal(self) -> bool {
        matches!(self, TxStatus::Succeeded | TxStatus::Failed)
    }

    /// True for Pending and Sent.
    pub fn is_outstanding(self) -> bool {
        !self.is_terminal()
    }
}

/// Lightweight reference to a transmission held in a scheduler's table.
///
/// Carries the slot index and the transmission id, so a handle kept after
/// its slot was reused no longer resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHandle {
    pub(crate) slot: u8,
    pub(crate) id: u32,
}

impl TxHandle {
    /// Unique, non-zero transmission id.
    pub fn id(self) -> u32 {
        self.id
    }
}

/// A single-use exchange on the bus.
///
/// Built by a peripheral, then owned by the scheduler from `schedule` until
/// the owner has seen its terminal callback. Retrying means building a new
/// one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    pub(crate) id: u32,
    packet: MaplePacket,
    expects_reply: bool,
    status: TxStatus,
    write_failed: bool,
    read_failed: bool,
    reply: Option<MaplePacket>,
}

impl Transmission {
    /// New Pending transmission of `packet`.
    pub fn new(packet: MaplePacket, expects_reply: bool) -> Self {
        Self {
            id: 0,
            packet,
            expects_reply,
            status: TxStatus::Pending,
            write_failed: false,
            read_failed: false,
            reply: None,
        }
    }

    /// Id assigned by the scheduler; zero before scheduling.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Packet to send.
    pub fn packet(&self) -> &MaplePacket {
        &self.packet
    }

    /// Address the packet targets.
    pub fn recipient(&self) -> BusAddress {
        self.packet.recipient
    }

    /// Whether a reply is read after the write.
    pub fn expects_reply(&self) -> bool {
        self.expects_reply
    }

    /// Current status.
    pub fn status(&self) -> TxStatus {
        self.status
    }

    /// Set only when Failed: the write did not complete.
    pub fn write_failed(&self) -> bool {
        self.write_failed
    }

    /// Set only when Failed: the reply was missing, garbled or late.
    pub fn read_failed(&self) -> bool {
        self.read_failed
    }

    /// Decoded reply, present only when Succeeded with a reply expected.
    pub fn reply(&self) -> Option<&MaplePacket> {
        self.reply.as_ref()
    }

    /// Worst-case bus occupancy: line check, the write itself and, when a
    /// reply is expected, the response window.
    pub fn estimated_duration_us(&self) -> u64 {
        let mut total = OPEN_LINE_CHECK_US.saturating_add(self.packet.tx_time_us());
        if self.expects_reply {
            total = total.saturating_add(RESPONSE_TIMEOUT_US);
        }
        total
    }

    pub(crate) fn mark_sent(&mut self) -> bool {
        if self.status != TxStatus::Pending {
            return false;
        }
        self.status = TxStatus::Sent;
        true
    }

    pub(crate) fn succeed(&mut self, reply: Option<MaplePacket>) -> bool {
        if self.status != TxStatus::Sent {
            return false;
        }
        self.status = TxStatus::Succeeded;
        self.reply = reply;
        true
    }

    pub(crate) fn fail(&mut self, write_failed: bool, read_failed: bool) -> bool {
        if self.status != TxStatus::Sent {
            return false;
        }
        self.status = TxStatus::Failed;
        self.write_failed = write_failed;
        self.read_failed = read_failed;
        true
    }
}
