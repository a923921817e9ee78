//! Integration scenarios driving [`Transceiver`] over the simulated
//! controller: bring-up, fail-fast transmit, one-frame-per-poll receive,
//! filtering, and the end-to-end beacon round trip.

use bxcan_node::{
    AcceptanceFilter, CanConfig, CanPeripheral, Frame, InitError, NominalBitTiming, SimCan,
    StandardId, TrafficCounters, Transceiver, TxError, beacon,
};
use core::num::{NonZeroU8, NonZeroU16};

fn demo_node() -> Transceiver<SimCan> {
    Transceiver::initialize(
        SimCan::new(),
        NominalBitTiming::default(),
        CanConfig::default(),
        AcceptanceFilter::accept_all(),
    )
    .expect("the default profile must initialize")
}

fn frame(raw_id: u16, data: &[u8]) -> Frame {
    Frame::new(StandardId::new(raw_id).unwrap(), data).unwrap()
}

#[test]
fn initialization_applies_the_whole_profile() {
    let node = demo_node();
    let sim = node.peripheral();

    assert_eq!(sim.timing(), Some(NominalBitTiming::default()));
    assert!(sim.config().is_some());
    assert!(sim.filter().is_some());
    assert!(sim.started());

    assert_eq!(node.counters(), TrafficCounters::default());
    assert!(node.last_sent().is_none());
    assert!(node.last_received().is_none());
}

#[test]
fn out_of_range_bit_timing_is_fatal() {
    let timing = NominalBitTiming {
        prescaler: NonZeroU16::new(1025).unwrap(),
        seg1: NonZeroU8::new(15).unwrap(),
        seg2: NonZeroU8::new(6).unwrap(),
        sync_jump_width: NonZeroU8::new(1).unwrap(),
    };
    let result = Transceiver::initialize(
        SimCan::new(),
        timing,
        CanConfig::default(),
        AcceptanceFilter::accept_all(),
    );
    assert!(matches!(result, Err(InitError::InvalidBitTiming)));
}

#[test]
fn filter_bank_out_of_range_is_fatal() {
    let filter = AcceptanceFilter::accept_all().set_bank(28);
    let result = Transceiver::initialize(
        SimCan::new(),
        NominalBitTiming::default(),
        CanConfig::default(),
        filter,
    );
    assert!(matches!(result, Err(InitError::InvalidFilter)));
}

#[test]
fn start_before_configure_is_rejected() {
    let mut sim = SimCan::new();
    assert_eq!(sim.start(), Err(InitError::NotConfigured));
}

#[test]
fn send_builds_a_beacon_frame_for_every_valid_length() {
    let mut node = demo_node();
    let payload = [0x5A; 8];

    for len in 0..=8 {
        node.send(&payload[..len]).expect("mailboxes are free");
        let sent = node.peripheral().sent_frames().last().unwrap();
        assert_eq!(sent.id(), beacon::BEACON_ID);
        assert_eq!(sent.dlc(), len);
        assert_eq!(sent.data(), &payload[..len]);
        assert_eq!(node.counters().sent, len as u32 + 1);
    }
}

#[test]
fn saturated_mailboxes_fail_fast_and_recover() {
    let mut node = demo_node();
    node.peripheral_mut().occupy_mailboxes(3);

    assert_eq!(node.send(&[beacon::STATUS_OK]), Err(TxError::MailboxesFull));
    assert_eq!(node.counters().sent, 0);
    assert!(node.last_sent().is_none());
    assert!(node.peripheral().sent_frames().is_empty());

    // Retry on a later cycle, once a mailbox drained.
    node.peripheral_mut().release_mailboxes();
    assert_eq!(node.send(&[beacon::STATUS_OK]), Ok(()));
    assert_eq!(node.counters().sent, 1);
}

#[test]
fn a_backlog_drains_one_frame_per_poll() {
    let mut node = demo_node();
    assert!(node.peripheral_mut().inject(frame(0x101, &[1])));
    assert!(node.peripheral_mut().inject(frame(0x102, &[2])));

    let first = node.poll_receive().expect("first poll pops the backlog head");
    assert_eq!(first.data(), &[1]);
    assert_eq!(node.counters().received, 1);

    let second = node.poll_receive().expect("second poll pops the rest");
    assert_eq!(second.data(), &[2]);
    assert_eq!(node.counters().received, 2);

    assert_eq!(node.poll_receive(), None);
    assert_eq!(node.last_received(), Some(&second));
}

#[test]
fn idle_polling_is_idempotent() {
    let mut node = demo_node();
    for _ in 0..1000 {
        assert_eq!(node.poll_receive(), None);
    }
    assert_eq!(node.counters(), TrafficCounters::default());
    assert!(node.last_received().is_none());
}

#[test]
fn transient_read_failure_skips_the_poll_and_recovers() {
    let mut node = demo_node();
    assert!(node.peripheral_mut().inject(frame(0x123, &[7, 8])));
    node.peripheral_mut().fail_next_read(1);

    // The queue reports a frame but the read comes back empty: silently
    // skipped, nothing counted.
    assert_eq!(node.poll_receive(), None);
    assert_eq!(node.counters().received, 0);
    assert!(node.last_received().is_none());

    let recovered = node.poll_receive().expect("next cycle reads the frame");
    assert_eq!(recovered.data(), &[7, 8]);
    assert_eq!(node.counters().received, 1);
}

#[test]
fn open_filter_passes_every_identifier() {
    let mut node = demo_node();
    for raw in [0x000, 0x1AB, 0x7FF] {
        assert!(node.peripheral_mut().inject(frame(raw, &[])));
        let got = node.poll_receive().expect("all-zero mask accepts anything");
        assert_eq!(got.id().as_raw(), raw);
    }
    assert_eq!(node.counters().received, 3);
}

#[test]
fn narrow_filter_drops_mismatched_identifiers() {
    let beacon_only = AcceptanceFilter::standard(beacon::BEACON_ID, 0x7FF);
    let mut node = Transceiver::initialize(
        SimCan::new(),
        NominalBitTiming::default(),
        CanConfig::default(),
        beacon_only,
    )
    .unwrap();

    assert!(!node.peripheral_mut().inject(frame(0x1AC, &[0xEE])));
    assert!(node.peripheral_mut().inject(frame(0x1AB, &[0xC3])));

    let got = node.poll_receive().expect("only the matching frame queued");
    assert_eq!(got.id(), beacon::BEACON_ID);
    assert_eq!(node.poll_receive(), None);
    assert_eq!(node.counters().received, 1);
}

#[test]
fn beacon_round_trip_end_to_end() {
    let mut node = demo_node();

    node.send_temperature(25.5).expect("send after init succeeds");
    assert_eq!(node.counters().sent, 1);

    let sent = *node.last_sent().unwrap();
    assert_eq!(sent.id(), beacon::BEACON_ID);
    assert_eq!(sent.data(), &[beacon::STATUS_OK, 0xFF, 0x00]);

    // The bus loops the beacon straight back into the receive queue.
    assert!(node.peripheral_mut().inject(sent));
    let received = node.poll_receive().expect("the beacon comes back");
    assert_eq!(beacon::decode_temperature(received.data()), Some(25.5));

    let counters = node.counters();
    assert_eq!((counters.sent, counters.received), (1, 1));
}
