//! Player bus orchestration against the mock wire.

use maple_atomic::SpinLock;
use maple_errors::{BusError, ConfigError, PeripheralError};
use maple_host::{PlayerBus, PlayerBusConfig, UsbEvent};
use maple_packet::{BusAddress, Command, MaplePacket};
use maple_peripherals::{
    Controller, GamepadState, MEMORY_CARD_DEFINITION, PeripheralTiming, PlayerData,
    StorageDevice, UsbSourceId,
};
use maple_scheduler::EndpointTxScheduler;
use maple_test_helpers::prelude::*;

const SERIAL: &str = "E66164084F4D5C2F";

type Bus = PlayerBus<SpinLock, MockPhysicalBus<SpinLock>>;

fn player_bus(config: PlayerBusConfig, wire: MockPhysicalBus<SpinLock>) -> Bus {
    let mut bus = must(PlayerBus::new(config, SpinLock::new(), wire));
    let port = bus.completion_port();
    bus.bus_mut().attach(port);
    bus
}

fn sub(slot: u8) -> BusAddress {
    must_some(BusAddress::sub(0, slot), "expansion slot")
}

fn player() -> PlayerData {
    PlayerData::new(0, UsbSourceId::default())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

#[test]
fn test_invalid_config_is_rejected() {
    let result = PlayerBus::new(
        PlayerBusConfig::for_player(7),
        SpinLock::new(),
        MockPhysicalBus::<SpinLock>::new(),
    );
    assert!(matches!(result, Err(ConfigError::InvalidPlayerIndex(7))));
}

#[test]
fn test_main_runs_first_and_wins_the_bus() {
    let mut bus = player_bus(PlayerBusConfig::default(), MockPhysicalBus::completing());
    let main = RecordingPeripheral::new(BusAddress::main(0));
    let expansion = RecordingPeripheral::new(sub(0));
    let (main_log, expansion_log) = (main.log(), expansion.log());
    must(bus.attach(Box::new(main)));
    must(bus.attach(Box::new(expansion)));

    bus.task(0);
    assert_eq!(
        *main_log.lock(),
        vec![
            Call::Task { now_us: 0 },
            Call::Scheduled(Ok(1)),
            Call::Started { id: 1 },
        ]
    );
    assert_eq!(
        *expansion_log.lock(),
        vec![Call::Task { now_us: 0 }, Call::Scheduled(Err(BusError::BusBusy))]
    );

    bus.task(1000);
    let main_calls = main_log.lock().clone();
    assert_eq!(
        main_calls.get(3..),
        Some(
            &[
                Call::Complete { id: 1, reply: None },
                Call::Task { now_us: 1000 },
                Call::Scheduled(Ok(2)),
                Call::Started { id: 2 },
            ][..]
        )
    );
    assert_eq!(bus.counters().rejected_busy, 2);
}

#[test]
fn test_expansions_run_in_slot_order() {
    let mut bus = player_bus(PlayerBusConfig::default(), MockPhysicalBus::completing());
    must(bus.attach(Box::new(RecordingPeripheral::passive(BusAddress::main(0)))));
    must(bus.attach(Box::new(RecordingPeripheral::passive(sub(2)))));
    must(bus.attach(Box::new(RecordingPeripheral::passive(sub(0)))));

    let order: Vec<u8> = bus.addresses().map(BusAddress::raw).collect();
    assert_eq!(order, vec![0x20, 0x01, 0x04]);
    assert_eq!(bus.len(), 3);
}

#[test]
fn test_attach_validation() {
    let mut bus = player_bus(PlayerBusConfig::for_player(1), MockPhysicalBus::new());

    let foreign = RecordingPeripheral::passive(BusAddress::main(0));
    assert_eq!(
        bus.attach(Box::new(foreign)),
        Err(PeripheralError::PlayerMismatch {
            expected: 1,
            actual: 0
        })
    );

    let host = RecordingPeripheral::passive(BusAddress::host(1));
    assert_eq!(
        bus.attach(Box::new(host)),
        Err(PeripheralError::InvalidAddress(0x40))
    );

    let two_slots = RecordingPeripheral::passive(BusAddress(0x43));
    assert_eq!(
        bus.attach(Box::new(two_slots)),
        Err(PeripheralError::InvalidAddress(0x43))
    );

    let orphan = RecordingPeripheral::passive(BusAddress(0x41));
    assert_eq!(
        bus.attach(Box::new(orphan)),
        Err(PeripheralError::NoPrimary(0x41))
    );

    must(bus.attach(Box::new(RecordingPeripheral::passive(BusAddress::main(1)))));
    let duplicate = RecordingPeripheral::passive(BusAddress::main(1));
    assert_eq!(
        bus.attach(Box::new(duplicate)),
        Err(PeripheralError::AddressInUse(0x60))
    );
    assert_eq!(bus.len(), 1);
}

#[test]
fn test_usb_events_attach_and_detach() {
    let mut bus = player_bus(PlayerBusConfig::default(), MockPhysicalBus::new());
    must(bus.handle(UsbEvent::Attached(Box::new(RecordingPeripheral::passive(
        BusAddress::main(0),
    )))));
    must(bus.handle(UsbEvent::Attached(Box::new(RecordingPeripheral::passive(
        sub(1),
    )))));

    must(bus.handle(UsbEvent::Detached(sub(1))));
    assert_eq!(bus.addresses().collect::<Vec<_>>(), vec![BusAddress::main(0)]);

    assert_eq!(
        bus.handle(UsbEvent::Detached(sub(1))),
        Err(PeripheralError::NotAttached(0x02))
    );
}

#[test]
fn test_detaching_main_removes_expansions() -> TestResult {
    let mut bus = player_bus(PlayerBusConfig::default(), MockPhysicalBus::new());
    bus.attach(Box::new(RecordingPeripheral::passive(BusAddress::main(0))))?;
    bus.attach(Box::new(RecordingPeripheral::passive(sub(0))))?;
    bus.attach(Box::new(RecordingPeripheral::passive(sub(4))))?;

    assert_eq!(bus.detach(BusAddress::main(0))?, 3);
    assert!(bus.is_empty());
    Ok(())
}

#[test]
fn test_detach_drops_pending_work() {
    // the wire refuses every write, so the report stays Pending
    let mut wire = MockPhysicalBus::new();
    wire.set_reject(true);
    let mut bus = player_bus(PlayerBusConfig::default(), wire);
    let main = RecordingPeripheral::new(BusAddress::main(0));
    let log = main.log();
    must(bus.attach(Box::new(main)));

    bus.task(0);
    assert_eq!(bus.scheduler().count_recipients(BusAddress::main(0)), 1);

    must(bus.detach(BusAddress::main(0)));
    assert!(bus.scheduler().is_idle());
    assert_eq!(bus.counters().cancelled, 1);

    bus.task(1000);
    assert!(bus.bus().sent().is_empty());
    assert_eq!(log.lock().len(), 2);
}

#[test]
fn test_result_for_detached_peripheral_is_released_silently() {
    let mut bus = player_bus(PlayerBusConfig::default(), MockPhysicalBus::new());
    let main = RecordingPeripheral::new(BusAddress::main(0));
    let log = main.log();
    must(bus.attach(Box::new(main)));

    bus.task(0);
    assert_eq!(log.lock().last(), Some(&Call::Started { id: 1 }));

    // already on the wire: detaching cannot recall it
    must(bus.detach(BusAddress::main(0)));
    assert!(!bus.scheduler().is_idle());

    assert!(bus.completion_port().write_complete());
    bus.task(1000);

    assert!(bus.scheduler().is_idle());
    assert_eq!(bus.counters().succeeded, 1);
    assert_eq!(log.lock().last(), Some(&Call::Started { id: 1 }));
}

#[test]
fn test_primary_failures_are_counted_and_reset() {
    init_tracing();
    let mut wire = MockPhysicalBus::new();
    wire.set_fallback(Response::WriteFailed);
    let mut bus = player_bus(PlayerBusConfig::default(), wire);
    must(bus.attach(Box::new(RecordingPeripheral::new(BusAddress::main(0)))));

    for now in 0..=3 {
        bus.task(now);
    }
    assert_eq!(bus.consecutive_failures(), 3);
    assert_eq!(bus.counters().write_failures, 3);

    bus.bus_mut().set_fallback(Response::WriteComplete);
    bus.task(4);
    assert_eq!(bus.consecutive_failures(), 4);
    bus.task(5);
    assert_eq!(bus.consecutive_failures(), 0);
}

#[test]
fn test_expansion_failures_do_not_count() {
    let mut wire = MockPhysicalBus::new();
    wire.set_fallback(Response::ReadFailed);
    let mut bus = player_bus(PlayerBusConfig::default(), wire);
    must(bus.attach(Box::new(RecordingPeripheral::passive(BusAddress::main(0)))));
    let expansion = RecordingPeripheral::new(sub(0)).expecting_reply();
    let log = expansion.log();
    must(bus.attach(Box::new(expansion)));

    for now in 0..4 {
        bus.task(now);
    }
    assert_eq!(bus.consecutive_failures(), 0);
    assert_eq!(bus.counters().read_failures, 3);
    let failures = log
        .lock()
        .iter()
        .filter(|call| {
            matches!(
                call,
                Call::Failed {
                    write_failed: false,
                    read_failed: true,
                    ..
                }
            )
        })
        .count();
    assert_eq!(failures, 3);
}

#[test]
fn test_controller_and_memory_card_share_the_bus() {
    init_tracing();
    let config = PlayerBusConfig::default();
    let mut wire = MockPhysicalBus::completing();
    let reply = must(MaplePacket::with_payload(
        Command::DataTransfer,
        BusAddress::host(0),
        sub(0),
        &[0x0000_0002, 0x00FF_0000, 0x00FF_00FE, 0x0001_00FD, 0x000D_0000, 0x00C8_001F, 0x0000_8000],
    ));
    wire.push_response(Response::WriteComplete);
    wire.push_response(Response::WriteComplete);
    wire.push_response(Response::reply(&reply));
    let mut bus = player_bus(config, wire);

    let input = MockInput::new(GamepadState::default());
    let controller = Controller::new(player(), &SERIAL, input, config.timing);
    let card = StorageDevice::new(sub(0), player(), MEMORY_CARD_DEFINITION);
    let handle = card.handle();
    must(bus.attach(Box::new(controller)));
    must(bus.attach(Box::new(card)));
    assert!(handle.request_media_info());

    for now in [0, 100, 200, 300] {
        bus.task(now);
    }

    let commands: Vec<Command> = bus.bus().decoded().iter().map(|p| p.command).collect();
    assert_eq!(
        commands,
        vec![Command::ExtDeviceInfo, Command::DataTransfer, Command::GetMemoryInfo]
    );
    let info = must_some(handle.media_info(), "media info");
    assert_eq!(info.block_count(), 256);
    assert!(!handle.is_busy());
    assert_eq!(bus.consecutive_failures(), 0);
}

#[test]
fn test_summary_lists_peripherals_in_task_order() {
    let mut bus = player_bus(PlayerBusConfig::default(), MockPhysicalBus::new());
    let timing = PeripheralTiming::default();
    let controller = Controller::new(player(), &SERIAL, GamepadState::default, timing);
    must(bus.attach(Box::new(controller)));
    must(bus.attach(Box::new(StorageDevice::new(
        sub(1),
        player(),
        MEMORY_CARD_DEFINITION,
    ))));
    must(bus.attach(Box::new(StorageDevice::new(
        sub(0),
        player(),
        MEMORY_CARD_DEFINITION,
    ))));

    let summary = bus
        .summary()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    insta::assert_snapshot!(summary);
}
