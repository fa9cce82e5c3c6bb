//! Mock collaborators for bus, input, lock and peripheral tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use maple_atomic::LockCapability;
use maple_errors::BusError;
use maple_packet::{BusAddress, Command, DeviceInfo, FunctionCode, MaplePacket};
use maple_peripherals::{InputSource, Peripheral};
use maple_scheduler::{CompletionPort, EndpointTxScheduler, PhysicalBus, Transmission};
use parking_lot::Mutex;

/// What the mock wire does after a frame is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Nothing; the test signals the port itself
    Silent,
    /// The write completes; enough for exchanges without a reply
    WriteComplete,
    /// The write completes and these raw bytes come back
    Reply(Vec<u8>),
    /// The write fails on the wire
    WriteFailed,
    /// The write completes but no reply arrives
    ReadFailed,
}

impl Response {
    /// Well-formed reply carrying `packet`.
    pub fn reply(packet: &MaplePacket) -> Self {
        Response::Reply(packet.encode().as_bytes().to_vec())
    }
}

/// A frame handed to the mock bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub bytes: Vec<u8>,
    pub expects_reply: bool,
}

impl SentFrame {
    pub fn decode(&self) -> Option<MaplePacket> {
        MaplePacket::decode(&self.bytes).ok()
    }
}

/// Physical bus that records frames and answers from a script.
///
/// Responses are applied through the attached [`CompletionPort`] from
/// inside `transmit`, as an immediate completion interrupt would. With an
/// empty script the fallback response is used.
pub struct MockPhysicalBus<L> {
    sent: Vec<SentFrame>,
    script: VecDeque<Response>,
    fallback: Response,
    reject: bool,
    port: Option<CompletionPort<L>>,
}

impl<L: LockCapability> MockPhysicalBus<L> {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            script: VecDeque::new(),
            fallback: Response::Silent,
            reject: false,
            port: None,
        }
    }

    /// Bus that completes every write and never replies.
    pub fn completing() -> Self {
        Self {
            fallback: Response::WriteComplete,
            ..Self::new()
        }
    }

    pub fn attach(&mut self, port: CompletionPort<L>) {
        self.port = Some(port);
    }

    pub fn port(&self) -> Option<&CompletionPort<L>> {
        self.port.as_ref()
    }

    pub fn set_fallback(&mut self, response: Response) {
        self.fallback = response;
    }

    pub fn push_response(&mut self, response: Response) {
        self.script.push_back(response);
    }

    /// Refuse every transmit until cleared.
    pub fn set_reject(&mut self, reject: bool) {
        self.reject = reject;
    }

    pub fn sent(&self) -> &[SentFrame] {
        &self.sent
    }

    pub fn last_sent(&self) -> Option<&SentFrame> {
        self.sent.last()
    }

    /// Every frame sent so far, decoded. Frames that do not decode are
    /// skipped.
    pub fn decoded(&self) -> Vec<MaplePacket> {
        self.sent.iter().filter_map(SentFrame::decode).collect()
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }

    fn apply(&self, response: &Response) {
        let Some(port) = &self.port else {
            return;
        };
        match response {
            Response::Silent => {}
            Response::WriteComplete => {
                port.write_complete();
            }
            Response::Reply(bytes) => {
                port.write_complete();
                port.reply_received(bytes);
            }
            Response::WriteFailed => {
                port.write_failed();
            }
            Response::ReadFailed => {
                port.write_complete();
                port.read_failed();
            }
        }
    }
}

impl<L: LockCapability> Default for MockPhysicalBus<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: LockCapability> PhysicalBus for MockPhysicalBus<L> {
    fn transmit(&mut self, frame: &[u8], expects_reply: bool) -> Result<(), BusError> {
        if self.reject {
            return Err(BusError::PhysicalLayerRejected);
        }
        self.sent.push(SentFrame {
            bytes: frame.to_vec(),
            expects_reply,
        });
        let response = self
            .script
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        self.apply(&response);
        Ok(())
    }
}

/// Input source whose state a test can change after handing it out.
#[derive(Debug, Clone, Default)]
pub struct MockInput<S> {
    state: Arc<Mutex<S>>,
    reads: Arc<AtomicUsize>,
    draining: bool,
}

impl<S: Clone + Default> MockInput<S> {
    pub fn new(initial: S) -> Self {
        Self {
            state: Arc::new(Mutex::new(initial)),
            reads: Arc::new(AtomicUsize::new(0)),
            draining: false,
        }
    }

    /// Source that resets to `S::default()` after each snapshot, like a
    /// relative motion device.
    pub fn draining(initial: S) -> Self {
        Self {
            draining: true,
            ..Self::new(initial)
        }
    }

    pub fn set(&self, state: S) {
        *self.state.lock() = state;
    }

    pub fn update(&self, f: impl FnOnce(&mut S)) {
        f(&mut self.state.lock());
    }

    /// Snapshots taken so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl<S: Clone + Default> InputSource<S> for MockInput<S> {
    fn snapshot(&self) -> S {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        if self.draining {
            core::mem::take(&mut *state)
        } else {
            state.clone()
        }
    }
}

/// Lock that counts acquisitions and checks pairing.
#[derive(Debug, Clone, Default)]
pub struct TrackingLock {
    inner: Arc<TrackingInner>,
}

#[derive(Debug, Default)]
struct TrackingInner {
    acquisitions: AtomicU32,
    depth: AtomicU32,
    lock: maple_atomic::SpinLock,
}

impl TrackingLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquisitions(&self) -> u32 {
        self.inner.acquisitions.load(Ordering::Relaxed)
    }

    pub fn is_held(&self) -> bool {
        self.inner.depth.load(Ordering::Relaxed) > 0
    }
}

impl LockCapability for TrackingLock {
    fn acquire(&self) {
        self.inner.lock.acquire();
        self.inner.acquisitions.fetch_add(1, Ordering::Relaxed);
        self.inner.depth.fetch_add(1, Ordering::Relaxed);
    }

    fn release(&self) {
        let previous = self.inner.depth.fetch_sub(1, Ordering::Relaxed);
        assert!(previous > 0, "TrackingLock released while not held");
        self.inner.lock.release();
    }
}

/// Callback observed by a [`RecordingPeripheral`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Task { now_us: u64 },
    Scheduled(Result<u32, BusError>),
    Started { id: u32 },
    Failed { id: u32, write_failed: bool, read_failed: bool },
    Complete { id: u32, reply: Option<MaplePacket> },
}

/// Peripheral that submits one packet per task while armed and records
/// every call. The log stays readable after the peripheral is boxed.
#[derive(Debug)]
pub struct RecordingPeripheral {
    address: BusAddress,
    expects_reply: bool,
    armed: bool,
    log: Arc<Mutex<Vec<Call>>>,
}

impl RecordingPeripheral {
    pub fn new(address: BusAddress) -> Self {
        Self {
            address,
            expects_reply: false,
            armed: true,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Peripheral that only records; its tasks submit nothing.
    pub fn passive(address: BusAddress) -> Self {
        Self {
            armed: false,
            ..Self::new(address)
        }
    }

    pub fn expecting_reply(mut self) -> Self {
        self.expects_reply = true;
        self
    }

    pub fn log(&self) -> Arc<Mutex<Vec<Call>>> {
        Arc::clone(&self.log)
    }

    fn record(&self, call: Call) {
        self.log.lock().push(call);
    }
}

impl Peripheral for RecordingPeripheral {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn address(&self) -> BusAddress {
        self.address
    }

    fn function_code(&self) -> FunctionCode {
        FunctionCode::CONTROLLER
    }

    fn function_definition(&self) -> u32 {
        0
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo::new(FunctionCode::CONTROLLER, [0; 3], "Recording", "Test")
    }

    fn task(&mut self, now_us: u64, scheduler: &mut dyn EndpointTxScheduler) {
        self.record(Call::Task { now_us });
        if !self.armed {
            return;
        }
        let host = BusAddress::host(self.address.player());
        let packet = MaplePacket::new(Command::DataTransfer, self.address, host);
        let result = scheduler
            .schedule(Transmission::new(packet, self.expects_reply))
            .map(|handle| handle.id());
        self.record(Call::Scheduled(result));
    }

    fn tx_started(&mut self, tx: &Transmission) {
        self.record(Call::Started { id: tx.id() });
    }

    fn tx_failed(&mut self, write_failed: bool, read_failed: bool, tx: &Transmission) {
        self.record(Call::Failed {
            id: tx.id(),
            write_failed,
            read_failed,
        });
    }

    fn tx_complete(&mut self, reply: Option<&MaplePacket>, tx: &Transmission) {
        self.record(Call::Complete {
            id: tx.id(),
            reply: reply.cloned(),
        });
    }
}
