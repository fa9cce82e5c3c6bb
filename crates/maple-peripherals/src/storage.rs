//! Storage peripheral (memory card) reached through an expansion slot.
//!
//! Storage never reports on its own. Work is requested through a
//! [`StorageHandle`], which may live on another core, and the peripheral
//! issues the matching data request on its next cycle. Results and faults
//! are left on the handle. The task loop never waits for the handle's lock:
//! a result that cannot be published right away is kept and published on a
//! later cycle.

use std::sync::Arc;

use maple_packet::{BusAddress, Command, DeviceInfo, FunctionCode, MaplePacket, SEGA_PRODUCER};
use maple_scheduler::{EndpointTxScheduler, Transmission, TxHandle, TxStatus};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::identification::PlayerData;
use crate::peripheral::Peripheral;

/// Definition word of a standard memory card: one partition, 512-byte
/// blocks, one read phase, four write phases.
pub const MEMORY_CARD_DEFINITION: u32 = 0x000F_4100;
/// Attempts made for one request before it is abandoned.
pub const MAX_ATTEMPTS: u8 = 3;

/// Storage geometry decoded from the storage function definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageGeometry {
    pub partitions: u16,
    pub bytes_per_block: u16,
    /// Phases needed to read one block
    pub read_accesses: u8,
    /// Phases needed to write one block
    pub write_accesses: u8,
    pub removable: bool,
    pub crc_required: bool,
}

impl StorageGeometry {
    pub fn from_definition(definition: u32) -> Self {
        let [partitions, block_size, accesses, flags] = definition.to_be_bytes();
        Self {
            partitions: u16::from(partitions).saturating_add(1),
            bytes_per_block: (u16::from(block_size).saturating_add(1)).saturating_mul(32),
            read_accesses: accesses & 0x0F,
            write_accesses: accesses >> 4,
            removable: flags & 0x80 != 0,
            crc_required: flags & 0x40 != 0,
        }
    }

    pub fn definition(&self) -> u32 {
        let partitions = u8::try_from(self.partitions.saturating_sub(1)).unwrap_or(u8::MAX);
        let block_size =
            u8::try_from((self.bytes_per_block / 32).saturating_sub(1)).unwrap_or(u8::MAX);
        let accesses = (self.write_accesses << 4) | (self.read_accesses & 0x0F);
        let mut flags = 0u8;
        if self.removable {
            flags |= 0x80;
        }
        if self.crc_required {
            flags |= 0x40;
        }
        u32::from_be_bytes([partitions, block_size, accesses, flags])
    }

    pub fn words_per_block(&self) -> usize {
        usize::from(self.bytes_per_block / 4)
    }
}

/// Media layout reported by a get-memory-information request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaInfo {
    /// Highest block number
    pub max_block: u16,
    pub partition: u16,
    pub system_block: u16,
    pub fat_block: u16,
    pub fat_block_count: u16,
    pub file_info_block: u16,
    pub file_info_block_count: u16,
    pub volume_icon: u16,
    pub save_area_block_count: u16,
    pub save_area_block: u16,
    pub execution_file: u32,
}

impl MediaInfo {
    /// Parse the six media words following the function code.
    pub fn from_words(words: &[u32]) -> Option<Self> {
        let &[w0, w1, w2, w3, w4, w5] = words.get(..6)? else {
            return None;
        };
        let high = |w: u32| u16::try_from(w >> 16).unwrap_or(u16::MAX);
        let low = |w: u32| u16::try_from(w & 0xFFFF).unwrap_or(u16::MAX);
        Some(Self {
            max_block: high(w0),
            partition: low(w0),
            system_block: high(w1),
            fat_block: low(w1),
            fat_block_count: high(w2),
            file_info_block: low(w2),
            file_info_block_count: high(w3),
            volume_icon: low(w3),
            save_area_block_count: high(w4),
            save_area_block: low(w4),
            execution_file: w5,
        })
    }

    /// Total number of blocks.
    pub fn block_count(&self) -> u32 {
        u32::from(self.max_block).saturating_add(1)
    }
}

/// Work a storage handle can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageRequest {
    MediaInfo,
    ReadBlock(u16),
}

/// One block of data, bytes in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockData {
    pub block: u16,
    pub data: Vec<u8>,
}

/// Why a storage request produced no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageFault {
    /// Every attempt failed on the bus
    Transfer { write_failed: bool, read_failed: bool },
    /// The device answered with a file error carrying this code
    FileError(u32),
    /// The device answered with something other than data
    UnexpectedReply(Command),
    /// The data reply was too short or for the wrong block
    Malformed,
}

#[derive(Debug, Default)]
struct Shared {
    request: Option<StorageRequest>,
    media_info: Option<MediaInfo>,
    block: Option<BlockData>,
    fault: Option<StorageFault>,
}

/// Cross-context access to a [`StorageDevice`].
///
/// One request is accepted at a time; further requests are refused until
/// the current one produces a result or a fault.
#[derive(Debug, Clone)]
pub struct StorageHandle {
    shared: Arc<Mutex<Shared>>,
}

impl StorageHandle {
    /// Ask for the media layout. False if a request is already queued.
    pub fn request_media_info(&self) -> bool {
        self.request(StorageRequest::MediaInfo)
    }

    /// Ask for one block. False if a request is already queued.
    pub fn request_block_read(&self, block: u16) -> bool {
        self.request(StorageRequest::ReadBlock(block))
    }

    pub fn is_busy(&self) -> bool {
        self.shared.lock().request.is_some()
    }

    /// Last media layout received.
    pub fn media_info(&self) -> Option<MediaInfo> {
        self.shared.lock().media_info
    }

    /// Take the most recently read block.
    pub fn take_block(&self) -> Option<BlockData> {
        self.shared.lock().block.take()
    }

    /// Take the fault of the last abandoned request.
    pub fn take_fault(&self) -> Option<StorageFault> {
        self.shared.lock().fault.take()
    }

    fn request(&self, request: StorageRequest) -> bool {
        let mut shared = self.shared.lock();
        if shared.request.is_some() {
            return false;
        }
        shared.fault = None;
        shared.request = Some(request);
        true
    }
}

/// Emulated storage peripheral.
#[derive(Debug)]
pub struct StorageDevice {
    address: BusAddress,
    player: PlayerData,
    geometry: StorageGeometry,
    info: DeviceInfo,
    shared: Arc<Mutex<Shared>>,
    in_flight: Option<(TxHandle, StorageRequest)>,
    attempts: u8,
    unpublished: Option<Result<Outcome, StorageFault>>,
}

impl StorageDevice {
    /// Storage at `address` advertising `function_definition`.
    pub fn new(address: BusAddress, player: PlayerData, function_definition: u32) -> Self {
        Self {
            address,
            player,
            geometry: StorageGeometry::from_definition(function_definition),
            info: DeviceInfo::new(
                FunctionCode::STORAGE,
                [function_definition, 0, 0],
                "Visual Memory",
                SEGA_PRODUCER,
            ),
            shared: Arc::new(Mutex::new(Shared::default())),
            in_flight: None,
            attempts: 0,
            unpublished: None,
        }
    }

    /// Handle for queueing requests and collecting results.
    pub fn handle(&self) -> StorageHandle {
        StorageHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn player(&self) -> &PlayerData {
        &self.player
    }

    pub fn geometry(&self) -> StorageGeometry {
        self.geometry
    }

    /// Queue a get-memory-information request.
    pub fn request_media_info(&self) -> bool {
        self.handle().request_media_info()
    }

    /// Queue a block read.
    pub fn request_block_read(&self, block: u16) -> bool {
        self.handle().request_block_read(block)
    }

    fn packet_for(&self, request: StorageRequest) -> MaplePacket {
        let (command, location) = match request {
            StorageRequest::MediaInfo => (Command::GetMemoryInfo, 0),
            StorageRequest::ReadBlock(block) => (Command::BlockRead, u32::from(block)),
        };
        let host = BusAddress::host(self.address.player());
        let mut packet = MaplePacket::new(command, self.address, host);
        for word in [FunctionCode::STORAGE.bits(), location] {
            if packet.payload.push(word).is_err() {
                break;
            }
        }
        packet
    }

    /// Hand the settled result to the handle. False while it is still
    /// waiting for the lock.
    fn publish(&mut self) -> bool {
        let Some(result) = self.unpublished.take() else {
            return true;
        };
        let Some(mut shared) = self.shared.try_lock() else {
            trace!(address = %self.address, "handle locked, result held for next cycle");
            self.unpublished = Some(result);
            return false;
        };
        shared.request = None;
        match result {
            Ok(Outcome::MediaInfo(info)) => shared.media_info = Some(info),
            Ok(Outcome::Block(block)) => shared.block = Some(block),
            Err(fault) => shared.fault = Some(fault),
        }
        true
    }

    fn owns(&self, tx: &Transmission) -> Option<StorageRequest> {
        let (handle, request) = self.in_flight?;
        (handle.id() == tx.id()).then_some(request)
    }

    fn interpret(
        &self,
        request: StorageRequest,
        reply: Option<&MaplePacket>,
    ) -> Result<Outcome, StorageFault> {
        let reply = reply.ok_or(StorageFault::Malformed)?;
        match reply.command {
            Command::DataTransfer => {}
            Command::FileError => {
                let code = reply.payload.last().copied().unwrap_or_default();
                return Err(StorageFault::FileError(code));
            }
            other => return Err(StorageFault::UnexpectedReply(other)),
        }
        let (&function, words) = reply.payload.split_first().ok_or(StorageFault::Malformed)?;
        if function != FunctionCode::STORAGE.bits() {
            return Err(StorageFault::Malformed);
        }
        match request {
            StorageRequest::MediaInfo => MediaInfo::from_words(words)
                .map(Outcome::MediaInfo)
                .ok_or(StorageFault::Malformed),
            StorageRequest::ReadBlock(block) => {
                let (&location, data) = words.split_first().ok_or(StorageFault::Malformed)?;
                if location & 0xFFFF != u32::from(block) || data.is_empty() {
                    return Err(StorageFault::Malformed);
                }
                let data = data
                    .iter()
                    .take(self.geometry.words_per_block())
                    .flat_map(|w| w.to_be_bytes())
                    .collect();
                Ok(Outcome::Block(BlockData { block, data }))
            }
        }
    }
}

#[derive(Debug)]
enum Outcome {
    MediaInfo(MediaInfo),
    Block(BlockData),
}

impl Peripheral for StorageDevice {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn address(&self) -> BusAddress {
        self.address
    }

    fn function_code(&self) -> FunctionCode {
        FunctionCode::STORAGE
    }

    fn function_definition(&self) -> u32 {
        self.geometry.definition()
    }

    fn device_info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn task(&mut self, _now_us: u64, scheduler: &mut dyn EndpointTxScheduler) {
        if !self.publish() {
            return;
        }
        if let Some((handle, _)) = self.in_flight {
            if scheduler.status(handle).is_some_and(TxStatus::is_outstanding) {
                return;
            }
            self.in_flight = None;
        }
        let request = match self.shared.try_lock() {
            Some(shared) => shared.request,
            None => return,
        };
        let Some(request) = request else {
            return;
        };

        match scheduler.schedule(Transmission::new(self.packet_for(request), true)) {
            Ok(handle) => {
                trace!(address = %self.address, ?request, "storage request scheduled");
                self.in_flight = Some((handle, request));
            }
            Err(e) => {
                trace!(address = %self.address, ?request, error = %e, "storage request deferred");
            }
        }
    }

    fn tx_failed(&mut self, write_failed: bool, read_failed: bool, tx: &Transmission) {
        let Some(request) = self.owns(tx) else {
            return;
        };
        self.in_flight = None;
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts < MAX_ATTEMPTS {
            debug!(address = %self.address, ?request, attempt = self.attempts, "storage request failed, retrying");
            return;
        }
        warn!(address = %self.address, ?request, write_failed, read_failed, "storage request abandoned");
        self.attempts = 0;
        self.unpublished = Some(Err(StorageFault::Transfer {
            write_failed,
            read_failed,
        }));
        self.publish();
    }

    fn tx_complete(&mut self, reply: Option<&MaplePacket>, tx: &Transmission) {
        let Some(request) = self.owns(tx) else {
            return;
        };
        self.in_flight = None;
        self.attempts = 0;
        let outcome = self.interpret(request, reply);
        if let Err(fault) = &outcome {
            debug!(address = %self.address, ?request, ?fault, "storage request refused");
        }
        self.unpublished = Some(outcome);
        self.publish();
    }
}
