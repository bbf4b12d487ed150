use linkbus_frame::{
    crc16, decode_frame, encode_frame, FrameEngine, FrameError, Incoming, Mode, ReadStatus,
    ReplyState, RequestQueue, Role, TimingConfig, DEFAULT_ADDR, MASTER_ADDR, MAX_PAYLOAD,
};
use linkbus_transport::{SimBus, SimPort};
use proptest::prelude::*;

fn mode() -> impl Strategy<Value = Mode> {
    prop_oneof![Just(Mode::Data), Just(Mode::Cmd)]
}

proptest! {
    #[test]
    fn encoded_frames_decode_and_validate(
        src in 0u8..16,
        dst in 0u8..16,
        mode in mode(),
        payload in proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD),
    ) {
        let mut wire = Vec::new();
        let written = encode_frame(src, dst, mode, &payload, &mut wire).unwrap();
        prop_assert_eq!(written, wire.len());
        prop_assert_eq!(crc16(&wire), 0);

        let frame = decode_frame(&wire).unwrap();
        prop_assert_eq!(frame.src, src);
        prop_assert_eq!(frame.dst, dst);
        prop_assert_eq!(frame.mode, mode);
        prop_assert_eq!(frame.payload.as_slice(), payload.as_slice());
    }

    #[test]
    fn single_byte_corruption_is_detected(
        payload in proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD),
        index in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let mut wire = Vec::new();
        encode_frame(MASTER_ADDR, 1, Mode::Data, &payload, &mut wire).unwrap();
        let i = index.index(wire.len());
        wire[i] ^= mask;

        // Whatever the header now claims, the frame must not pass as valid.
        prop_assert!(crc16(&wire) != 0);
        prop_assert!(decode_frame(&wire).is_err());
    }

    #[test]
    fn payloads_cross_the_bus_intact(
        payload in proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD),
        chunk in 1usize..=MAX_PAYLOAD,
    ) {
        let bus = SimBus::new();
        let mut master = FrameEngine::new(bus.attach(MASTER_ADDR), (), Role::Master, TimingConfig::default(), 7);
        let mut slave = FrameEngine::new(bus.attach(DEFAULT_ADDR), (), Role::Slave, TimingConfig::default(), 8);

        prop_assert!(master.send(DEFAULT_ADDR, Mode::Data, &payload, true));
        let len = match slave.parse() {
            Incoming::Data { len, .. } => usize::from(len),
            other => return Err(TestCaseError::fail(format!("unexpected {other:?}"))),
        };
        prop_assert_eq!(len, payload.len());

        let mut received = Vec::new();
        let mut buf = vec![0u8; chunk];
        loop {
            let take = chunk.min(len - received.len());
            let status = slave.read(&mut buf[..take]);
            received.extend_from_slice(&buf[..take]);
            match status {
                ReadStatus::Incomplete => {}
                ReadStatus::Valid => break,
                other => return Err(TestCaseError::fail(format!("unexpected {other:?}"))),
            }
        }
        prop_assert_eq!(received, payload);
    }

    #[test]
    fn at_most_one_request_is_pending(
        ops in proptest::collection::vec((any::<bool>(), any::<bool>(), 0u8..4), 1..60),
    ) {
        let bus = SimBus::new();
        let mut master: FrameEngine<SimPort, ()> =
            FrameEngine::new(bus.attach(MASTER_ADDR), (), Role::Master, TimingConfig::default(), 3);
        let _slave = bus.attach(DEFAULT_ADDR);
        let mut queue = RequestQueue::new();

        for (push, wait, ticks) in ops {
            if push {
                let before = queue.len();
                match queue.push(1, b"req", wait) {
                    Ok(()) => prop_assert_eq!(queue.len(), before + 1),
                    Err(_) => prop_assert_eq!(queue.len(), before),
                }
            }
            let was_pending = master.reply_state() == ReplyState::Pending;
            let sent = queue.dispatch(&mut master);
            prop_assert!(!(sent && was_pending));
            for _ in 0..ticks {
                master.update();
            }
        }
    }
}

#[test]
fn decode_reports_crc_values() {
    let mut wire = Vec::new();
    encode_frame(MASTER_ADDR, 2, Mode::Data, b"abc", &mut wire).unwrap();
    let good = u16::from_be_bytes([wire[5], wire[6]]);
    wire[6] ^= 0xFF;
    match decode_frame(&wire) {
        Err(FrameError::BadCrc { computed, received }) => {
            assert_eq!(computed, good);
            assert_eq!(received, good ^ 0x00FF);
        }
        other => panic!("expected BadCrc, got {other:?}"),
    }
}
