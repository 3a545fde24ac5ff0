use std::error::Error;

use litmatch::{
    Action, Groups, Literal, Match, ScanErrorKind, ScanStatus, StreamState,
    StreamStatus, Table,
};

use crate::util::{scan_chunks, tables};

// Tests that a stream split into two chunks reports the same matches as a
// single block scan of the concatenation.
#[test]
fn aardvark() {
    let lits =
        [Literal::new("a", 0).nocase(true), Literal::new("aardvark", 1)];
    for (name, table) in tables(&lits) {
        let block = table.find_all("aaardvark").unwrap();
        let stream = scan_chunks(&table, b"aaardvark", &[4], Groups::ALL);
        assert_eq!(block, stream, "{}", name);
        assert_eq!(
            vec![
                Match::new(0, 0, 0),
                Match::new(1, 1, 0),
                Match::new(2, 2, 0),
                Match::new(6, 6, 0),
                Match::new(1, 8, 1),
            ],
            stream,
            "{}",
            name,
        );
    }
}

// Tests every way of splitting a haystack into chunks of one to four bytes,
// with literals that straddle many boundaries.
#[test]
fn every_split() {
    let lits = [
        Literal::new("abcdefghij", 0),
        Literal::new("fgh", 1),
        Literal::new("J", 2).nocase(true),
        Literal::new("ja", 3).noruns(true),
    ];
    let haystack = b"abcdefghijabcdefghijja";
    for (name, table) in tables(&lits) {
        let block = table.find_all(haystack).unwrap();
        for size in 1..=4 {
            let splits: Vec<usize> =
                (size..haystack.len()).step_by(size).collect();
            let stream = scan_chunks(&table, haystack, &splits, Groups::ALL);
            assert_eq!(block, stream, "{} with chunks of {}", name, size);
        }
    }
}

// Tests a literal that is longer than most of the chunks it spans.
#[test]
fn long_literal_across_chunks() {
    let pattern: Vec<u8> = (0..5_000u32).map(|i| (i % 97) as u8).collect();
    let mut haystack = b"prefix".to_vec();
    haystack.extend_from_slice(&pattern);
    haystack.extend_from_slice(b"suffix");
    let lits = [Literal::new(&pattern, 4)];
    for (name, table) in tables(&lits) {
        assert_eq!(4_999, table.history_len());
        let splits: Vec<usize> = (0..haystack.len()).step_by(333).collect();
        let got = scan_chunks(&table, &haystack, &splits, Groups::ALL);
        assert_eq!(vec![Match::new(6, 5_005, 4)], got, "{}", name);
    }
}

// Tests that the group filter may change between chunks.
#[test]
fn groups_per_chunk() -> Result<(), Box<dyn Error>> {
    let lits = [
        Literal::new("one", 1).groups(Groups::new(0b01)),
        Literal::new("two", 2).groups(Groups::new(0b10)),
    ];
    let table = Table::new(&lits)?;
    let mut state = table.open_stream();
    let mut got = vec![];
    let chunks = [("one tw", 0b01), ("o one two", 0b10)];
    for &(chunk, bits) in chunks.iter() {
        table.scan_stream(&mut state, chunk, Groups::new(bits), |m| {
            got.push((m.start(), m.id()));
            Action::Continue
        })?;
    }
    assert_eq!(vec![(0, 1), (4, 2), (12, 2)], got);
    Ok(())
}

// Tests that terminating inside a chunk still consumes the chunk, so that
// later chunks keep their stream offsets.
#[test]
fn terminate_then_continue() -> Result<(), Box<dyn Error>> {
    let table = Table::new(&[Literal::new("ab", 0)])?;
    let mut state = table.open_stream();
    let status = table.scan_stream(&mut state, "ababa", Groups::ALL, |_| {
        Action::Terminate
    })?;
    assert_eq!(ScanStatus::Terminated, status);
    assert_eq!(5, state.offset());

    let mut got = vec![];
    let status = table.scan_stream(&mut state, "bab", Groups::ALL, |m| {
        got.push(*m);
        Action::Continue
    })?;
    assert_eq!(ScanStatus::Success, status);
    assert_eq!(vec![Match::new(4, 5, 0), Match::new(6, 7, 0)], got);
    Ok(())
}

// Tests that states are tied to their table and rejected after closing.
#[test]
fn state_errors() -> Result<(), Box<dyn Error>> {
    let table = Table::new(&[Literal::new("abc", 0)])?;
    let other = Table::new(&[Literal::new("xyz", 0)])?;
    let mut state = table.open_stream();

    let err = other
        .scan_stream(&mut state, "x", Groups::ALL, |_| Action::Continue)
        .unwrap_err();
    assert_eq!(&ScanErrorKind::StateMismatch, err.kind());
    assert_eq!(0, state.offset());

    table.close_stream(&mut state)?;
    assert_eq!(StreamStatus::Closed, state.status());
    let err = table
        .scan_stream(&mut state, "abc", Groups::ALL, |_| Action::Continue)
        .unwrap_err();
    assert_eq!(&ScanErrorKind::StreamClosed, err.kind());

    table.reset_stream(&mut state)?;
    let mut count = 0;
    table.scan_stream(&mut state, "abc", Groups::ALL, |_| {
        count += 1;
        Action::Continue
    })?;
    assert_eq!(1, count);
    Ok(())
}

// Tests that a state whose offset was damaged is rejected rather than
// scanned with its history placed before the start of the stream.
#[test]
fn damaged_state_offset() -> Result<(), Box<dyn Error>> {
    let table = Table::new(&[Literal::new("abcd", 0)])?;
    let mut state = table.open_stream();
    table.scan_stream(&mut state, "xyz", Groups::ALL, |_| Action::Continue)?;
    assert_eq!(3, state.offset());

    let mut bytes = state.as_bytes().to_vec();
    bytes[8..16].copy_from_slice(&0u64.to_ne_bytes());
    assert!(StreamState::from_bytes(bytes).is_err());

    let mut bytes = state.as_bytes().to_vec();
    bytes[8..16].copy_from_slice(&(u64::MAX - 1).to_ne_bytes());
    let mut moved = StreamState::from_bytes(bytes)?;
    let err = table
        .scan_stream(&mut moved, "cd", Groups::ALL, |_| Action::Continue)
        .unwrap_err();
    assert_eq!(
        &ScanErrorKind::OffsetOverflow { offset: u64::MAX - 1, len: 2 },
        err.kind(),
    );
    assert_eq!(u64::MAX - 1, moved.offset());
    Ok(())
}

// Tests a stream whose table and state both live in relocated buffers.
#[test]
fn relocated_table_and_state() -> Result<(), Box<dyn Error>> {
    let built = Table::new(&[
        Literal::new("needle", 0),
        Literal::new("NEEDLES", 1).nocase(true),
    ])?;
    let mut table_buf = vec![0u8; built.write_to_len() + 5];
    built.write_to(&mut table_buf[5..])?;
    let table = Table::from_bytes(&table_buf[5..])?;

    let mut state = table.open_stream();
    let mut got = vec![];
    table.scan_stream(&mut state, "hay nee", Groups::ALL, |m| {
        got.push(*m);
        Action::Continue
    })?;

    let mut state_buf = vec![0u8; state.as_bytes().len() + 3];
    state_buf[3..].copy_from_slice(state.as_bytes());
    let mut moved = StreamState::from_bytes(&mut state_buf[3..])?;
    table.scan_stream(&mut moved, "dles hay", Groups::ALL, |m| {
        got.push(*m);
        Action::Continue
    })?;
    assert_eq!(vec![Match::new(4, 9, 0), Match::new(4, 10, 1)], got);
    Ok(())
}
