mod common;

use common::*;
use digibase_lib::status::fields;
use digibase_lib::variant::Variant;
use digibase_lib::{DigibaseError, StatusRegister};

fn last_written(device: &mut digibase_lib::Digibase<MockBase>) -> StatusRegister {
    let bytes = bulk(device).last_register_write().expect("no status write").to_vec();
    StatusRegister::from_response(&bytes)
}

#[test]
fn hv_setpoint_round_trip() {
    let mut device = ready(Variant::Rh);
    device.set_hv(800.0).unwrap();
    let written = last_written(&mut device);
    assert_eq!(written.field(fields::HV_SETPOINT), 640);
    assert_eq!(written.to_bytes()[42..44], [0x80, 0x02]);
    assert_eq!(bulk(&mut device).writes.len(), 1);
    assert_eq!(bulk(&mut device).writes[0].endpoint, 0x08);

    assert_eq!(device.hv().unwrap(), 800.0);
}

#[test]
fn hv_at_limit_is_rejected_without_io() {
    let mut device = ready(Variant::Classic);
    device.set_hv(500.0).unwrap();
    bulk(&mut device).clear();
    let before = *device.status();

    let err = device.set_hv(1200.0).unwrap_err();
    assert!(err.is_range_error());
    assert!(matches!(err, DigibaseError::HvOutOfRange { volts } if volts == 1200.0));
    assert_eq!(*device.status(), before);
    assert!(bulk(&mut device).writes.is_empty());
}

#[test]
fn enable_hv_checks_device_setpoint() {
    let mut device = ready(Variant::Rh);
    device.set_hv(900.0).unwrap();
    device.enable_hv().unwrap();
    assert!(last_written(&mut device).flag(fields::HV_ENABLE));

    // A setpoint above the limit already on the device (raw 1000 = 1250 V).
    let mut register = StatusRegister::from_response(&bulk(&mut device).register);
    register.set_field(fields::HV_SETPOINT, 1000);
    register.set_flag(fields::HV_ENABLE, false);
    bulk(&mut device).register = register.to_bytes().to_vec();
    bulk(&mut device).clear();

    let err = device.enable_hv().unwrap_err();
    assert!(matches!(err, DigibaseError::HvOutOfRange { volts } if volts == 1250.0));
    assert!(bulk(&mut device).register_writes().is_empty());

    device.disable_hv().unwrap();
    assert!(!last_written(&mut device).flag(fields::HV_ENABLE));
}

#[test]
fn pulse_width() {
    let mut device = ready(Variant::Classic);
    device.set_pulse_width(1.0).unwrap();
    assert_eq!(last_written(&mut device).field(fields::PULSE_WIDTH), 16);
    assert!((device.pulse_width().unwrap() - 1.0).abs() < 1e-9);

    bulk(&mut device).clear();
    for bad in [0.5, 2.5] {
        let err = device.set_pulse_width(bad).unwrap_err();
        assert!(matches!(err, DigibaseError::PulseWidthOutOfRange { .. }));
    }
    assert!(bulk(&mut device).writes.is_empty());
}

#[test]
fn run_enable() {
    let mut device = ready(Variant::Classic);
    device.start().unwrap();
    assert!(last_written(&mut device).flag(fields::RUN_ENABLE));
    device.stop().unwrap();
    assert!(!last_written(&mut device).flag(fields::RUN_ENABLE));
    assert_eq!(bulk(&mut device).register_writes().len(), 2);
}

#[test]
fn clear_counters_pulses_bit_608() {
    let mut device = ready(Variant::Rh);
    device.clear_counters().unwrap();
    let resets: Vec<bool> = bulk(&mut device)
        .register_writes()
        .iter()
        .map(|r| StatusRegister::from_response(r).bit(608))
        .collect();
    assert_eq!(resets, vec![true, false]);
}

#[test]
fn clear_spectrum_leaves_register_alone() {
    let mut device = ready(Variant::Rh);
    device.clear_spectrum().unwrap();
    let writes = &bulk(&mut device).writes;
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].data.len(), 4097);
    assert_eq!(writes[0].data[0], 0x02);
}

#[test]
fn list_mode_latches_then_clears() {
    let mut device = ready(Variant::Classic);
    device.set_acq_mode_pha().unwrap();
    device.start().unwrap();
    bulk(&mut device).clear();

    device.set_acq_mode_list().unwrap();
    let writes: Vec<StatusRegister> = bulk(&mut device)
        .register_writes()
        .iter()
        .map(|r| StatusRegister::from_response(r))
        .collect();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].get(0, 2), 0);
    assert!(writes[0].bit(7));
    assert!(writes[0].bit(608));
    assert_eq!(writes[1].get(0, 2), 0);
    assert!(!writes[1].bit(7));
    assert!(!writes[1].bit(608));

    device.set_acq_mode_pha().unwrap();
    assert!(last_written(&mut device).flag(fields::ACQ_MODE));
}

#[test]
fn discriminators_follow_variant_layout() {
    let mut classic = ready(Variant::Classic);
    classic.set_lld(0x1ff).unwrap();
    let written = last_written(&mut classic);
    assert_eq!(written.get(168, 8), 0xff);
    assert_eq!(written.bit(176), false);
    assert_eq!(classic.lld().unwrap(), 0xff);

    let mut rh = ready(Variant::Rh);
    rh.set_lld(100).unwrap();
    assert_eq!(last_written(&mut rh).get(170, 10), 100);
    assert_eq!(rh.lld().unwrap(), 100);

    rh.set_uld(0x1_2345).unwrap();
    assert_eq!(rh.uld().unwrap(), 0x2345);
}

#[test]
fn spectrum_readout() {
    let mut device = ready(Variant::Rh);
    let counts: Vec<u32> = (0..1024).map(|c| c * 2).collect();
    bulk(&mut device).queue_spectrum(&counts);

    let frame = device.spectrum().unwrap();
    assert_eq!(frame.counts(), &counts[..]);
    let bulk = bulk(&mut device);
    assert_eq!(bulk.writes[0].data, vec![0x80]);
    assert_eq!(bulk.reads[0], (0x82, 5000));
}

#[test]
fn short_spectrum_is_an_error() {
    let mut device = ready(Variant::Classic);
    bulk(&mut device).queue_spectrum(&[1, 2, 3]);
    let err = device.spectrum().unwrap_err();
    assert!(matches!(
        err,
        DigibaseError::InsufficientData {
            expected: 4096,
            actual: 12
        }
    ));
}

#[test]
fn hits_are_sized_by_response() {
    let mut device = ready(Variant::Rh);
    bulk(&mut device)
        .hit_lists
        .push_back(hex::decode("0a000000140000001e000000").unwrap());
    assert_eq!(device.hits().unwrap(), vec![10, 20, 30]);
    assert_eq!(bulk(&mut device).reads[0].1, 16384);

    assert!(device.hits().unwrap().is_empty());
}

#[test]
fn telemetry_refreshes_first() {
    let mut device = ready(Variant::Classic);
    let mut register = StatusRegister::new();
    register.set_field(fields::LIVETIME, 123_456);
    register.set_field(fields::REALTIME, 234_567);
    register.set_field(fields::HV_READBACK, 0x0280);
    bulk(&mut device).register = register.to_bytes().to_vec();

    assert_eq!(device.livetime().unwrap(), 123_456);
    assert_eq!(device.realtime().unwrap(), 234_567);
    assert_eq!(device.hv_readback().unwrap(), 0x0280);
    assert!(bulk(&mut device).writes.iter().all(|w| w.data == [0x01]));

    let dump = device.status_dump().unwrap();
    assert_eq!(dump.lines().count(), 5);
    assert!(dump.starts_with("0000: "));
}

#[test]
fn armed_acquisition_shuts_down_on_drop() {
    let mut device = ready(Variant::Rh);
    device.set_hv(800.0).unwrap();
    device.enable_hv().unwrap();
    {
        let mut armed = device.arm();
        armed.start().unwrap();
        assert!(armed.status().flag(fields::RUN_ENABLE));
    }
    let written = last_written(&mut device);
    assert!(!written.flag(fields::RUN_ENABLE));
    assert!(!written.flag(fields::HV_ENABLE));
}

#[test]
fn disarm_reports_and_does_not_repeat() {
    let mut device = ready(Variant::Classic);
    device.start().unwrap();
    bulk(&mut device).clear();
    device.arm().disarm().unwrap();
    assert_eq!(bulk(&mut device).register_writes().len(), 2);
}

#[test]
fn short_status_read_keeps_mirror_and_blocks_writes() {
    let mut device = ready(Variant::Rh);
    device.set_hv(800.0).unwrap();
    device.set_pulse_width(1.0).unwrap();
    device.set_lld(40).unwrap();
    let before = *device.status();

    bulk(&mut device).register.clear();
    bulk(&mut device).clear();

    let err = device.enable_hv().unwrap_err();
    assert!(matches!(
        err,
        DigibaseError::InsufficientData {
            expected: 80,
            actual: 0
        }
    ));
    assert!(bulk(&mut device).register_writes().is_empty());
    assert_eq!(*device.status(), before);
    assert!(device.hv().is_err());

    // A truncated reply is rejected the same way.
    bulk(&mut device).register = before.to_bytes()[..40].to_vec();
    assert!(matches!(
        device.livetime(),
        Err(DigibaseError::InsufficientData { actual: 40, .. })
    ));
    assert_eq!(device.status().field(fields::HV_SETPOINT), 640);
}
