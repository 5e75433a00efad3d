use dmxp_fntrace::Trace::encoder::{
    decode, encode, native_pointer_width, record_size, validate_pointer_width, MAX_RECORD_SIZE,
    TIMESTAMP_WIDTH,
};
use dmxp_fntrace::{EventKind, Timestamp, TraceError, TraceEvent, TraceReader};

#[test]
fn record_size_matches_format() {
    assert_eq!(TIMESTAMP_WIDTH, 16);
    assert_eq!(record_size(8), 33);
    assert_eq!(record_size(4), 25);
    assert_eq!(MAX_RECORD_SIZE, record_size(8));
    assert_eq!(native_pointer_width() as usize, std::mem::size_of::<usize>());
}

#[test]
fn field_layout_is_fixed() {
    let event = TraceEvent::enter(Timestamp::new(3, 500), 0x1122_3344, 0xAABB);
    let rec = encode(&event, 8);
    let bytes = rec.as_bytes();

    assert_eq!(bytes.len(), 33);
    assert_eq!(bytes[0], EventKind::Enter.as_byte());
    assert_eq!(&bytes[1..9], &3i64.to_le_bytes());
    assert_eq!(&bytes[9..17], &500i64.to_le_bytes());
    assert_eq!(&bytes[17..25], &0x1122_3344u64.to_le_bytes());
    assert_eq!(&bytes[25..33], &0xAABBu64.to_le_bytes());
}

#[test]
fn single_event_round_trips() {
    let event = TraceEvent::exit(Timestamp::new(12_345, 999_999_999), 0x7fff_1234, 0x4000_0010);
    for width in [4u8, 8] {
        let rec = encode(&event, width);
        assert_eq!(rec.len(), record_size(width));
        assert_eq!(decode(rec.as_bytes(), width).unwrap(), event);
    }
}

#[test]
fn narrow_pointer_width_keeps_low_bytes() {
    let event = TraceEvent::enter(Timestamp::ZERO, usize::MAX, 0x1234);
    let decoded = decode(encode(&event, 4).as_bytes(), 4).unwrap();
    assert_eq!(decoded.function_id, 0xFFFF_FFFF);
    assert_eq!(decoded.caller_id, 0x1234);
}

#[test]
fn rejects_bad_input() {
    assert!(matches!(
        validate_pointer_width(3),
        Err(TraceError::UnsupportedPointerWidth(3))
    ));

    let rec = encode(&TraceEvent::enter(Timestamp::ZERO, 1, 2), 8);
    let mut bytes = rec.as_bytes().to_vec();
    assert!(matches!(
        decode(&bytes[..20], 8),
        Err(TraceError::Truncated { expected: 33, found: 20 })
    ));

    bytes[0] = 9;
    assert!(matches!(decode(&bytes, 8), Err(TraceError::UnknownEventKind(9))));
}

#[test]
fn reader_frames_records_from_header_width() {
    let events: Vec<TraceEvent> = (0..10)
        .map(|i| {
            let ts = Timestamp::from_nanos(fastrand::u64(..1 << 50));
            if i % 2 == 0 {
                TraceEvent::enter(ts, fastrand::usize(..), fastrand::usize(..))
            } else {
                TraceEvent::exit(ts, fastrand::usize(..), fastrand::usize(..))
            }
        })
        .collect();

    let width = native_pointer_width();
    let mut file = vec![width];
    for e in &events {
        file.extend_from_slice(encode(e, width).as_bytes());
    }

    let reader = TraceReader::new(&file).unwrap();
    assert_eq!(reader.pointer_width(), width);
    assert_eq!(reader.remaining(), events.len());
    assert_eq!(TraceReader::read_all(&file).unwrap(), events);

    // A torn tail is reported, not silently dropped.
    file.pop();
    let results: Vec<_> = TraceReader::new(&file).unwrap().collect();
    assert_eq!(results.len(), events.len());
    assert!(matches!(results.last(), Some(Err(TraceError::Truncated { .. }))));

    assert!(matches!(TraceReader::new(&[]), Err(TraceError::Truncated { .. })));
}

#[test]
fn timestamp_nanos_conversion() {
    let ts = Timestamp::from_nanos(5_000_000_123);
    assert_eq!(ts, Timestamp::new(5, 123));
    assert_eq!(ts.as_nanos(), 5_000_000_123);
    assert_eq!(Timestamp::new(-1, -5).as_nanos(), 0);
}
