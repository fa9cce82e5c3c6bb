//! Peripherals driven against a real scheduler and the mock wire.

use maple_atomic::SpinLock;
use maple_packet::{
    BusAddress, Command, EXT_DEVICE_INFO_WORDS, FunctionCode, MaplePacket, ext_version, trim_ascii,
};
use maple_peripherals::{
    Controller, GamepadButtons, GamepadState, Keyboard, KeyboardState, MEMORY_CARD_DEFINITION,
    Mouse, MouseButtons, MouseState, Peripheral, PeripheralTiming, PlayerData, StorageDevice,
    StorageFault, UsbSourceId, VIBRATION_PACK_DEFINITION, Vibration, VibrationEffect, VibrationFault,
};
use maple_scheduler::{BusScheduler, EndpointTxScheduler, TxEventKind};
use maple_test_helpers::prelude::*;

const SERIAL: &str = "E66164084F4D5C2F";

struct Rig {
    scheduler: BusScheduler<SpinLock>,
    bus: MockPhysicalBus<SpinLock>,
    /// Terminal outcomes in delivery order: (transmission id, kind)
    settled: Vec<(u32, TxEventKind)>,
}

impl Rig {
    fn new(mut bus: MockPhysicalBus<SpinLock>) -> Self {
        let scheduler = BusScheduler::new(SpinLock::new());
        bus.attach(scheduler.completion_port());
        Self {
            scheduler,
            bus,
            settled: Vec::new(),
        }
    }

    /// One cycle: settle, deliver, run the peripheral, dispatch.
    fn cycle(&mut self, peripheral: &mut dyn Peripheral, now_us: u64) {
        self.scheduler.service();
        self.deliver(peripheral);
        peripheral.task(now_us, &mut self.scheduler);
        self.scheduler.dispatch(&mut self.bus);
        self.deliver(peripheral);
    }

    fn deliver(&mut self, peripheral: &mut dyn Peripheral) {
        while let Some(event) = self.scheduler.next_event() {
            match event.kind {
                TxEventKind::Started => {
                    if let Some(tx) = self.scheduler.get(event.handle) {
                        peripheral.tx_started(tx);
                    }
                }
                TxEventKind::Failed => {
                    if let Some(tx) = self.scheduler.release(event.handle) {
                        self.settled.push((tx.id(), event.kind));
                        peripheral.tx_failed(tx.write_failed(), tx.read_failed(), &tx);
                    }
                }
                TxEventKind::Completed => {
                    if let Some(tx) = self.scheduler.release(event.handle) {
                        self.settled.push((tx.id(), event.kind));
                        peripheral.tx_complete(tx.reply(), &tx);
                    }
                }
            }
        }
    }

    fn sent(&self) -> Vec<MaplePacket> {
        self.bus.decoded()
    }
}

fn player() -> PlayerData {
    PlayerData::new(0, UsbSourceId::default())
}

#[test]
fn test_controller_identifies_then_reports() {
    let input = MockInput::new(GamepadState::default());
    let mut controller = Controller::new(player(), &SERIAL, input, PeripheralTiming::default());
    let mut rig = Rig::new(MockPhysicalBus::completing());

    rig.cycle(&mut controller, 0);
    rig.cycle(&mut controller, 100);

    let sent = rig.sent();
    assert_eq!(sent.len(), 2);
    let identify = must_some(sent.first(), "identification");
    assert_eq!(identify.command, Command::ExtDeviceInfo);
    assert_eq!(identify.recipient, BusAddress(0x20));
    assert_eq!(identify.sender, BusAddress(0x00));
    assert_eq!(identify.payload.len(), EXT_DEVICE_INFO_WORDS);
    let version = must_some(ext_version(&identify.payload), "version string");
    assert_eq!(trim_ascii(&version), "Version 1.010,SN:E66164084F4D5C2F");

    let report = must_some(sent.get(1), "condition report");
    assert_eq!(report.command, Command::DataTransfer);
    assert_eq!(report.payload.as_slice(), &[0x0000_0001, 0xFFFF_0000, 0x8080_8080]);
}

#[test]
fn test_second_task_while_outstanding_submits_nothing() {
    let input = MockInput::new(GamepadState::default());
    let mut controller = Controller::new(player(), &SERIAL, input, PeripheralTiming::default());
    // silent wire: the first exchange never resolves
    let mut rig = Rig::new(MockPhysicalBus::new());

    rig.cycle(&mut controller, 0);
    rig.cycle(&mut controller, 20_000);
    rig.cycle(&mut controller, 40_000);

    assert_eq!(rig.sent().len(), 1);
    assert_eq!(rig.scheduler.counters().scheduled, 1);
    assert_eq!(rig.scheduler.counters().rejected_busy, 0);
}

#[test]
fn test_peer_holding_the_bus_is_absorbed() -> TestResult {
    let input = MockInput::new(GamepadState::default());
    let mut controller = Controller::new(player(), &SERIAL, input, PeripheralTiming::default());
    let mut rig = Rig::new(MockPhysicalBus::new());
    let peer = MaplePacket::new(Command::DataTransfer, BusAddress(0x01), BusAddress(0x00));
    rig.scheduler
        .schedule(maple_scheduler::Transmission::new(peer, false))?;

    controller.task(0, &mut rig.scheduler);
    controller.task(1, &mut rig.scheduler);
    assert_eq!(rig.scheduler.counters().rejected_busy, 2);
    assert_eq!(rig.scheduler.count_recipients(BusAddress(0x20)), 0);
    Ok(())
}

#[test]
fn test_failed_report_is_rebuilt_next_cycle() {
    let input = MockInput::new(GamepadState::default());
    let mut controller = Controller::new(player(), &SERIAL, input, PeripheralTiming::default());
    let mut bus = MockPhysicalBus::completing();
    bus.push_response(Response::WriteComplete);
    bus.push_response(Response::WriteFailed);
    let mut rig = Rig::new(bus);

    rig.cycle(&mut controller, 0);
    rig.cycle(&mut controller, 16_000);
    rig.cycle(&mut controller, 16_001);

    let sent = rig.sent();
    assert_eq!(sent.len(), 3);
    let failed = must_some(sent.get(1), "failed report");
    let retried = must_some(sent.get(2), "fresh report");
    assert_eq!(failed.command, Command::DataTransfer);
    assert_eq!(retried, failed);
    assert_eq!(rig.scheduler.counters().scheduled, 3);
    assert_eq!(rig.scheduler.counters().write_failures, 1);

    rig.cycle(&mut controller, 16_002);
    let (failed_id, _) = must_some(
        rig.settled.iter().find(|(_, kind)| *kind == TxEventKind::Failed),
        "failed outcome",
    );
    let (retried_id, kind) = must_some(rig.settled.last(), "retried outcome");
    assert_eq!(*kind, TxEventKind::Completed);
    assert_ne!(retried_id, failed_id);
}

#[test]
fn test_reports_follow_cadence() {
    let input = MockInput::new(GamepadState::default());
    let mut controller = Controller::new(player(), &SERIAL, input, PeripheralTiming::default());
    let mut rig = Rig::new(MockPhysicalBus::completing());

    for now in (0..=48_000).step_by(4_000) {
        rig.cycle(&mut controller, now);
    }

    let reports = rig
        .sent()
        .iter()
        .filter(|p| p.command == Command::DataTransfer)
        .count();
    // first report right after identification, then every 16 ms
    assert_eq!(reports, 4);
}

#[test]
fn test_controller_reflects_live_input() {
    let input = MockInput::new(GamepadState::default());
    let mut controller = Controller::new(
        player(),
        &SERIAL,
        input.clone(),
        PeripheralTiming::default(),
    );
    let mut rig = Rig::new(MockPhysicalBus::completing());
    rig.cycle(&mut controller, 0);

    input.update(|s| {
        s.buttons = GamepadButtons::SOUTH;
        s.right_trigger = 0xFF;
    });
    rig.cycle(&mut controller, 10);

    let report = must_some(rig.sent().pop(), "report");
    assert_eq!(report.payload.get(1), Some(&0xFBFF_FF00));
}

#[test]
fn test_mouse_motion_survives_a_busy_bus() {
    let input = MockInput::draining(MouseState::default());
    let address = must_some(BusAddress::sub(0, 0), "slot 0");
    let mut mouse = Mouse::new(
        address,
        player(),
        &SERIAL,
        input.clone(),
        PeripheralTiming::default(),
    );
    let mut rig = Rig::new(MockPhysicalBus::new());

    // identification never completes, motion piles up
    rig.cycle(&mut mouse, 0);
    input.set(MouseState { dx: 10, ..MouseState::default() });
    rig.cycle(&mut mouse, 10);
    input.set(MouseState { dx: 5, dy: -3, buttons: MouseButtons::LEFT, wheel: 0 });
    rig.cycle(&mut mouse, 20);

    let condition = mouse.condition();
    assert_eq!(condition.axes.first(), Some(&(0x200 + 15)));
    assert_eq!(condition.axes.get(1), Some(&(0x200 - 3)));

    must_some(rig.bus.port(), "port").write_complete();
    input.set(MouseState { buttons: MouseButtons::LEFT, ..MouseState::default() });
    rig.cycle(&mut mouse, 30);
    let report = must_some(rig.sent().pop(), "mouse report");
    assert_eq!(report.recipient, BusAddress(0x01));
    assert_eq!(
        report.payload.as_slice(),
        &[0x0000_0200, 0x0000_00FB, 0x01FD_020F, 0x0200_0200, 0x0200_0200, 0x0200_0200]
    );
    assert_eq!(mouse.condition().axes.first(), Some(&0x200));
}

#[test]
fn test_mouse_motion_survives_a_failed_report() {
    let input = MockInput::draining(MouseState::default());
    let address = must_some(BusAddress::sub(0, 0), "slot 0");
    let mut mouse = Mouse::new(
        address,
        player(),
        &SERIAL,
        input.clone(),
        PeripheralTiming::default(),
    );
    let mut bus = MockPhysicalBus::completing();
    bus.push_response(Response::WriteComplete);
    bus.push_response(Response::WriteFailed);
    let mut rig = Rig::new(bus);

    rig.cycle(&mut mouse, 0);
    input.set(MouseState { dx: 100, ..MouseState::default() });
    rig.cycle(&mut mouse, 16_000);
    rig.cycle(&mut mouse, 16_001);
    rig.cycle(&mut mouse, 16_002);

    let reports: Vec<MaplePacket> = rig
        .sent()
        .into_iter()
        .filter(|p| p.command == Command::DataTransfer)
        .collect();
    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert_eq!(report.payload.get(2), Some(&0x0200_0264));
    }
    assert_eq!(rig.scheduler.counters().write_failures, 1);
    assert_eq!(mouse.condition().axes.first(), Some(&0x200));
}

#[test]
fn test_keyboard_reports_pressed_keys() {
    let state = KeyboardState {
        modifiers: 0x02,
        leds: 0,
        keys: [0x04, 0, 0, 0, 0, 0],
    };
    let address = must_some(BusAddress::sub(1, 1), "slot 1");
    let mut keyboard = Keyboard::new(
        address,
        PlayerData::new(1, UsbSourceId::default()),
        &SERIAL,
        MockInput::new(state),
        PeripheralTiming::default(),
    );
    let mut rig = Rig::new(MockPhysicalBus::completing());
    rig.cycle(&mut keyboard, 0);
    rig.cycle(&mut keyboard, 1);

    let report = must_some(rig.sent().pop(), "keyboard report");
    assert_eq!(report.recipient, BusAddress(0x42));
    assert_eq!(report.sender, BusAddress(0x40));
    assert_eq!(report.payload.as_slice(), &[0x0000_0040, 0x0004_0002, 0]);
    assert_eq!(keyboard.function_code(), FunctionCode::KEYBOARD);
}

fn storage() -> StorageDevice {
    let address = must_some(BusAddress::sub(0, 0), "slot 0");
    StorageDevice::new(address, player(), MEMORY_CARD_DEFINITION)
}

#[test]
fn test_idle_storage_submits_nothing() {
    let mut device = storage();
    let mut rig = Rig::new(MockPhysicalBus::completing());
    for now in 0..5 {
        rig.cycle(&mut device, now);
    }
    assert!(rig.sent().is_empty());
}

#[test]
fn test_storage_media_info_round_trip() {
    let mut device = storage();
    let handle = device.handle();
    let reply = must(MaplePacket::with_payload(
        Command::DataTransfer,
        BusAddress::host(0),
        BusAddress(0x01),
        &[0x0000_0002, 0x00FF_0000, 0x00FF_00FE, 0x0001_00FD, 0x000D_0000, 0x00C8_001F, 0x0000_8000],
    ));
    let mut bus = MockPhysicalBus::new();
    bus.push_response(Response::reply(&reply));
    let mut rig = Rig::new(bus);

    assert!(device.request_media_info());
    rig.cycle(&mut device, 0);
    let request = must_some(rig.bus.last_sent(), "request");
    assert!(request.expects_reply);
    assert_eq!(must_decode(&request.bytes).command, Command::GetMemoryInfo);

    rig.cycle(&mut device, 1);
    let info = must_some(handle.media_info(), "media info");
    assert_eq!(info.block_count(), 256);
    assert_eq!(info.save_area_block_count, 200);
    assert!(!handle.is_busy());
}

#[test]
fn test_storage_block_read() {
    let mut device = storage();
    let handle = device.handle();
    let mut words = vec![0x0000_0002, 0x0000_0007];
    words.extend((0..128u32).map(|i| i * 0x0101_0101));
    let reply = must(MaplePacket::with_payload(
        Command::DataTransfer,
        BusAddress::host(0),
        BusAddress(0x01),
        &words,
    ));
    let mut bus = MockPhysicalBus::new();
    bus.push_response(Response::reply(&reply));
    let mut rig = Rig::new(bus);

    assert!(handle.request_block_read(7));
    rig.cycle(&mut device, 0);
    rig.cycle(&mut device, 1);

    let block = must_some(handle.take_block(), "block");
    assert_eq!(block.block, 7);
    assert_eq!(block.data.len(), 512);
    assert_eq!(block.data.get(4..8), Some(&[1u8, 1, 1, 1][..]));
}

#[test]
fn test_storage_file_error_is_reported() {
    let mut device = storage();
    let handle = device.handle();
    let reply = must(MaplePacket::with_payload(
        Command::FileError,
        BusAddress::host(0),
        BusAddress(0x01),
        &[0x0000_0040],
    ));
    let mut bus = MockPhysicalBus::new();
    bus.push_response(Response::reply(&reply));
    let mut rig = Rig::new(bus);

    assert!(handle.request_block_read(300));
    rig.cycle(&mut device, 0);
    rig.cycle(&mut device, 1);
    assert_eq!(handle.take_fault(), Some(StorageFault::FileError(0x40)));
    assert!(handle.take_block().is_none());
}

#[test]
fn test_storage_gives_up_after_bounded_retries() {
    let mut device = storage();
    let handle = device.handle();
    let mut rig = Rig::new(MockPhysicalBus::new());
    rig.bus.set_fallback(Response::ReadFailed);

    assert!(handle.request_media_info());
    for now in 0..10 {
        rig.cycle(&mut device, now);
    }
    assert_eq!(rig.sent().len(), 3);
    assert_eq!(
        handle.take_fault(),
        Some(StorageFault::Transfer {
            write_failed: false,
            read_failed: true
        })
    );
    assert!(!handle.is_busy());
}

fn vibration() -> Vibration {
    let address = must_some(BusAddress::sub(0, 0), "slot 0");
    Vibration::new(address, player(), VIBRATION_PACK_DEFINITION)
}

fn ack() -> Response {
    Response::reply(&MaplePacket::new(
        Command::Ack,
        BusAddress::host(0),
        BusAddress(0x01),
    ))
}

#[test]
fn test_vibration_stops_first_then_sends_effects() {
    let mut device = vibration();
    let handle = device.handle();
    let mut bus = MockPhysicalBus::new();
    bus.push_response(ack());
    bus.push_response(ack());
    let mut rig = Rig::new(bus);

    rig.cycle(&mut device, 0);
    handle.start(5, 0);
    rig.cycle(&mut device, 1);
    rig.cycle(&mut device, 2);

    let sent = rig.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|p| p.command == Command::SetCondition));
    let payloads: Vec<&[u32]> = sent.iter().map(|p| p.payload.as_slice()).collect();
    assert_eq!(
        payloads,
        vec![&[0x0000_0100, 0x1000_0700][..], &[0x0000_0100, 0x1150_3B00][..]]
    );
    assert_eq!(handle.delivered(), 2);
    assert!(!handle.is_pending());
    assert!(handle.take_fault().is_none());
}

#[test]
fn test_vibration_waits_for_its_start_time() {
    let mut device = vibration();
    let handle = device.handle();
    let mut rig = Rig::new(MockPhysicalBus::new());
    rig.bus.set_fallback(ack());

    handle.send_at(5_000, VibrationEffect::continuous(2, 0));
    rig.cycle(&mut device, 0);
    rig.cycle(&mut device, 4_999);
    assert!(handle.is_pending());
    assert_eq!(rig.sent().len(), 1);

    rig.cycle(&mut device, 5_000);
    assert!(!handle.is_pending());
    let words: Vec<Option<u32>> = rig.sent().iter().map(|p| p.payload.get(1).copied()).collect();
    assert_eq!(words, vec![Some(0x1000_0700), Some(0x1120_3B00)]);
}

#[test]
fn test_vibration_gives_up_after_bounded_retries() {
    let mut device = vibration();
    let handle = device.handle();
    let mut rig = Rig::new(MockPhysicalBus::new());
    rig.bus.set_fallback(Response::WriteFailed);

    for now in 0..10 {
        rig.cycle(&mut device, now);
    }
    assert_eq!(rig.sent().len(), 3);
    assert_eq!(
        handle.take_fault(),
        Some(VibrationFault::Transfer {
            write_failed: true,
            read_failed: false
        })
    );
    assert_eq!(handle.delivered(), 0);
}

#[test]
fn test_newer_vibration_supersedes_a_retry() {
    let mut device = vibration();
    let handle = device.handle();
    let mut rig = Rig::new(MockPhysicalBus::new());
    rig.bus.set_fallback(Response::WriteFailed);

    rig.cycle(&mut device, 0);
    handle.start(7, 0);
    rig.bus.push_response(ack());
    rig.cycle(&mut device, 1);
    rig.cycle(&mut device, 2);

    let sent = rig.sent();
    assert_eq!(sent.len(), 2);
    let last = must_some(sent.last(), "effect");
    assert_eq!(last.payload.get(1), Some(&0x1170_3B00));
    assert_eq!(handle.delivered(), 1);
    assert!(handle.take_fault().is_none());
}
