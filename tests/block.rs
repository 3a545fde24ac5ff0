use std::error::Error;

use litmatch::{
    table::{Builder, Config},
    Action, Groups, Input, Literal, Match, ScanStatus, SchemeKind, Table,
};

use crate::util::{
    assert_all_agree, assert_tables_agree, naive, scan, tables,
};

fn ends(matches: &[Match]) -> Vec<(u64, u64, u32)> {
    matches.iter().map(|m| (m.start(), m.end(), m.id())).collect()
}

// Tests that every occurrence of a single case sensitive literal is found,
// including one right at the end of the haystack.
#[test]
fn single_literal() {
    let lits = [Literal::new("mnopqr", 0)];
    let haystack = b"mnopqrabcdefghijklmnopqrstuvwxyzmnopqr";
    for (name, table) in tables(&lits) {
        let got = table.find_all(haystack).unwrap();
        assert_eq!(
            vec![(0, 5, 0), (18, 23, 0), (32, 37, 0)],
            ends(&got),
            "{}",
            name,
        );
    }
}

// Tests that a one byte caseless literal reports every occurrence of
// either case.
#[test]
fn single_byte_nocase() {
    let lits = [Literal::new("m", 0).nocase(true)];
    let mut haystack = vec![b'x'; 300];
    let offsets = [0, 5, 16, 31, 32, 100, 255, 256, 299];
    for (k, &at) in offsets.iter().enumerate() {
        haystack[at] = if k % 2 == 0 { b'm' } else { b'M' };
    }
    let expected: Vec<(u64, u64, u32)> =
        offsets.iter().map(|&at| (at as u64, at as u64, 0)).collect();
    for (name, table) in tables(&lits) {
        let got = table.find_all(&haystack).unwrap();
        assert_eq!(expected, ends(&got), "{}", name);
    }
}

// Tests that overlapping literals inside a long flood are each reported at
// every position, which exercises the flood guard.
#[test]
fn flood_of_overlapping_literals() {
    let lits = [Literal::new("aaaa", 1), Literal::new("aaaaaaaa", 2)];
    let haystack = vec![b'a'; 1024];
    for (name, table) in tables(&lits) {
        let got = table.find_all(&haystack).unwrap();
        let short: Vec<&Match> = got.iter().filter(|m| m.id() == 1).collect();
        let long: Vec<&Match> = got.iter().filter(|m| m.id() == 2).collect();
        assert_eq!(1024 - 3, short.len(), "{}", name);
        assert_eq!(1024 - 7, long.len(), "{}", name);
        for (i, m) in short.iter().enumerate() {
            assert_eq!(i as u64 + 3, m.end(), "{}", name);
        }
        for (i, m) in long.iter().enumerate() {
            assert_eq!(i as u64 + 7, m.end(), "{}", name);
        }
        assert_eq!(naive(&lits, &Input::new(&haystack)), got, "{}", name);
    }
}

// Tests floods that begin and end at awkward places, surrounded by bytes
// that complete other literals.
#[test]
fn flood_boundaries() {
    let lits = [
        Literal::new("zzz", 0),
        Literal::new("zzzzzzzzzz", 1),
        Literal::new("yzz", 2),
        Literal::new("zzy", 3),
        Literal::new("ZzZ", 4).nocase(true),
        Literal::new("q", 5),
    ];
    let mut haystack = vec![];
    let runs = [(b'y', 1), (b'z', 300), (b'y', 1), (b'q', 40), (b'z', 33)];
    for &(byte, len) in runs.iter() {
        haystack.extend(std::iter::repeat(byte).take(len));
    }
    let tables = tables(&lits);
    for &start in &[0, 1, 2, 250, 256, 300, 301, 310] {
        let input = Input::new(&haystack).start(start);
        assert_tables_agree(&tables, &lits, &input);
    }
}

// Tests that a literal much longer than any window or block is found,
// including back to back occurrences.
#[test]
fn long_literal() {
    let pattern: Vec<u8> = (0..66_000u32).map(|i| (i % 251) as u8).collect();
    let mut haystack = pattern.clone();
    haystack.extend_from_slice(&pattern);
    let lits = [Literal::new(&pattern, 0)];
    for (name, table) in tables(&lits) {
        let got = table.find_all(&haystack).unwrap();
        assert_eq!(
            vec![(0, 65_999, 0), (66_000, 131_999, 0)],
            ends(&got),
            "{}",
            name,
        );
    }
}

// Tests that terminating on the first match stops the scan, no matter how
// many matches follow.
#[test]
fn terminate_on_first() {
    let lits = [Literal::new("ab", 0), Literal::new("b", 1)];
    let haystack = "ab".repeat(500);
    for (name, table) in tables(&lits) {
        let mut got = vec![];
        let status = table
            .scan(&Input::new(&haystack), |m| {
                got.push(*m);
                Action::Terminate
            })
            .unwrap();
        assert_eq!(ScanStatus::Terminated, status, "{}", name);
        assert_eq!(vec![Match::new(0, 1, 0)], got, "{}", name);
    }
}

// Tests that terminating on the k-th match reports exactly k matches, even
// when several matches share an end position.
#[test]
fn terminate_on_kth() {
    let lits = [
        Literal::new("abc", 0),
        Literal::new("bc", 1),
        Literal::new("c", 2),
    ];
    let haystack = "xabcxabc";
    let all = naive(&lits, &Input::new(haystack));
    assert_eq!(6, all.len());
    for (name, table) in tables(&lits) {
        for k in 1..=all.len() {
            let mut got = vec![];
            let status = table
                .scan(&Input::new(haystack), |m| {
                    got.push(*m);
                    if got.len() == k {
                        Action::Terminate
                    } else {
                        Action::Continue
                    }
                })
                .unwrap();
            assert_eq!(&all[..k], &got[..], "{} at {}", name, k);
            assert_eq!(ScanStatus::Terminated, status);
        }
    }
}

// Tests the report order of literals ending at the same position: longest
// first, then in the order they were given.
#[test]
fn report_order() {
    let lits = [
        Literal::new("c", 10),
        Literal::new("bc", 11),
        Literal::new("BC", 12).nocase(true),
        Literal::new("abc", 13),
    ];
    for (name, table) in tables(&lits) {
        let got = table.find_all("abc").unwrap();
        assert_eq!(
            vec![(0, 2, 13), (1, 2, 11), (1, 2, 12), (2, 2, 10)],
            ends(&got),
            "{}",
            name,
        );
    }
}

// Tests that a "no runs" literal is not reported again when the match
// reported right before it was the same literal.
#[test]
fn no_repeat_single() {
    let lits = [Literal::new("a", 0).noruns(true)];
    for (name, table) in tables(&lits) {
        let got = table.find_all("aaaxaa").unwrap();
        assert_eq!(vec![(0, 0, 0)], ends(&got), "{}", name);
    }
}

// Tests that interleaved matches of other literals reset suppression.
#[test]
fn no_repeat_interleaved() {
    let lits = [Literal::new("a", 0).noruns(true), Literal::new("b", 1)];
    for (name, table) in tables(&lits) {
        let got = table.find_all("aabaab").unwrap();
        assert_eq!(
            vec![(0, 0, 0), (2, 2, 1), (3, 3, 0), (5, 5, 1)],
            ends(&got),
            "{}",
            name,
        );
    }
}

// Tests suppression when two "no runs" literals share an identifier and
// overlap inside a flood.
#[test]
fn no_repeat_shared_id() {
    let lits = [
        Literal::new("xx", 7).noruns(true),
        Literal::new("x", 7).noruns(true),
        Literal::new("y", 8),
    ];
    let haystack = format!("{}y{}", "x".repeat(100), "x".repeat(3));
    for (name, table) in tables(&lits) {
        let got = table.find_all(&haystack).unwrap();
        assert_eq!(
            vec![(0, 0, 7), (100, 100, 8), (101, 101, 7)],
            ends(&got),
            "{}",
            name,
        );
    }
}

// Tests that group filtering hides literals whose groups are all inactive,
// without affecting the others.
#[test]
fn groups() {
    let lits = [
        Literal::new("foo", 0).groups(Groups::new(0b01)),
        Literal::new("bar", 1).groups(Groups::new(0b10)),
        Literal::new("baz", 2).groups(Groups::new(0b11)),
    ];
    let haystack = "foo bar baz";
    for (name, table) in tables(&lits) {
        let only = |bits| {
            let input = Input::new(haystack).groups(Groups::new(bits));
            ends(&scan(&table, &input))
        };
        assert_eq!(vec![(0, 2, 0), (8, 10, 2)], only(0b01), "{}", name);
        assert_eq!(vec![(4, 6, 1), (8, 10, 2)], only(0b10), "{}", name);
        assert!(only(0b100).is_empty(), "{}", name);
        assert_eq!(3, only(u64::MAX).len(), "{}", name);
    }
}

// Tests that trailing masks constrain the bytes before a literal, including
// bytes in the history.
#[test]
fn masks() -> Result<(), Box<dyn Error>> {
    let lits = [
        // A digit, then "px".
        Literal::new("px", 0).mask(b"\xF0\xFF\xFF", b"\x30px")?,
        // Any uppercase-or-lowercase "k" followed by "!".
        Literal::new("k!", 1).nocase(true).mask(b"\x00\x00", b"\x00\x00")?,
        // "ab" where the "a" must be lowercase.
        Literal::new("AB", 2).nocase(true).mask(b"\x20\x00", b"\x20\x00")?,
    ];
    let haystack = "1px apx 9px K! k! ab Ab aB";
    for (name, table) in tables(&lits) {
        let got = table.find_all(haystack)?;
        assert_eq!(
            vec![
                (1, 2, 0),
                (9, 10, 0),
                (12, 13, 1),
                (15, 16, 1),
                (18, 19, 2),
                (24, 25, 2),
            ],
            ends(&got),
            "{}",
            name,
        );
        let input = Input::new("px").history("5").offset(10);
        assert_eq!(vec![(10, 11, 0)], ends(&scan(&table, &input)), "{}", name);
    }
    assert_all_agree(&lits, &Input::new(haystack));
    Ok(())
}

// Tests that masks longer than their literal need the whole mask to fit in
// the buffer, so nothing is reported at the very start.
#[test]
fn masks_need_room() -> Result<(), Box<dyn Error>> {
    let lit = Literal::new("b", 0).mask(b"\x00\x00\x00\xFF", b"\0\0\0b")?;
    for (name, table) in tables(&[lit]) {
        let got = table.find_all("bbbb")?;
        assert_eq!(vec![(3, 3, 0)], ends(&got), "{}", name);
    }
    Ok(())
}

// Tests the start position and offset of a block scan with history.
#[test]
fn start_offset_and_history() {
    let lits = [
        Literal::new("foobar", 0),
        Literal::new("oba", 1),
        Literal::new("r", 2),
    ];
    for (name, table) in tables(&lits) {
        let input = Input::new("barfoobar").history("xfoo").offset(1_000);
        assert_eq!(
            vec![
                (999, 1001, 1),
                (997, 1002, 0),
                (1002, 1002, 2),
                (1005, 1007, 1),
                (1003, 1008, 0),
                (1008, 1008, 2),
            ],
            ends(&scan(&table, &input)),
            "{}",
            name,
        );
        let input = input.start(3);
        assert_eq!(
            vec![(1005, 1007, 1), (1003, 1008, 0), (1008, 1008, 2)],
            ends(&scan(&table, &input)),
            "{}",
            name,
        );
        let input = Input::new("barfoobar").start(9);
        assert!(scan(&table, &input).is_empty(), "{}", name);
    }
}

// Tests literals straddling every alignment of vector blocks, and matches
// too close to either end of the haystack.
#[test]
fn alignment_and_edges() {
    let lits = [
        Literal::new("abcdefghijklmnop", 0),
        Literal::new("xyz", 1),
        Literal::new("Q", 2),
        Literal::new("wxyzA", 3).nocase(true),
    ];
    let tables = tables(&lits);
    for len in 1..80 {
        for at in 0..len {
            let mut haystack = vec![b'.'; len];
            let pat = b"abcdefghijklmnopwxyzaQ";
            for (i, &b) in pat.iter().enumerate() {
                if at + i < len {
                    haystack[at + i] = b;
                }
            }
            assert_tables_agree(&tables, &lits, &Input::new(&haystack));
        }
    }
}

// Tests that a table used through copies of its bytes at odd addresses
// behaves exactly like the original.
#[test]
fn relocation() -> Result<(), Box<dyn Error>> {
    let lits: Vec<Literal> = ["alpha", "beta", "gamma", "delta", "Epsilon"]
        .iter()
        .enumerate()
        .map(|(i, s)| Literal::new(s, i as u32).nocase(i % 2 == 0))
        .collect();
    let haystack = "ALPHA beta gamma DELTA epsilon alphabet";
    for (name, table) in tables(&lits) {
        let expected = table.find_all(haystack)?;
        for shift in 0..8 {
            let mut buf = vec![0xAAu8; table.write_to_len() + shift];
            table.write_to(&mut buf[shift..])?;
            let copy = Table::from_bytes(&buf[shift..])?;
            assert_eq!(table.scheme(), copy.scheme());
            let got = copy.find_all(haystack)?;
            assert_eq!(expected, got, "{} at {}", name, shift);
            assert_eq!(expected, copy.to_owned().find_all(haystack)?);
        }
    }
    Ok(())
}

// Tests a literal set too large for the masked scheme, along with one that
// fits it, against the naive scanner.
#[test]
fn many_literals() {
    let words: Vec<String> = (0..500u32)
        .map(|i| format!("w{}{}", i, ["x", "yy", "zzz"][i as usize % 3]))
        .collect();
    let lits: Vec<Literal> = words
        .iter()
        .enumerate()
        .map(|(i, w)| Literal::new(w, i as u32).nocase(i % 7 == 0))
        .collect();
    let haystack: String = words
        .iter()
        .rev()
        .step_by(3)
        .map(|w| w.to_uppercase() + " ")
        .collect();
    assert_all_agree(&lits, &Input::new(&haystack));
    assert_all_agree(&lits[..12], &Input::new(&haystack));
}

// Tests a set of 512 literals that has 512 distinct lengths. Each literal is
// a prefix of the counting haystack, and those of at most 256 bytes occur a
// second time once the byte values wrap around.
#[test]
fn many_lengths() {
    let haystack: Vec<u8> = (0..512u32).map(|i| i as u8).collect();
    let lits: Vec<Literal> = (1..=haystack.len())
        .map(|len| Literal::new(&haystack[..len], len as u32))
        .collect();
    let tables = tables(&lits);
    for (name, table) in tables.iter() {
        let got = table.find_all(&haystack).unwrap();
        assert_eq!(768, got.len(), "{}", name);
        for m in got.iter() {
            assert_eq!(m.id() as u64, m.end() - m.start() + 1, "{}", name);
            assert!(m.start() == 0 || m.start() == 256, "{}", name);
        }
    }
    assert_tables_agree(&tables, &lits, &Input::new(&haystack));
}

// Tests that selection follows the configured preference and forced scheme.
#[test]
fn selection() -> Result<(), Box<dyn Error>> {
    let lits = [Literal::new("foo", 0), Literal::new("bar", 1)];
    let table = Builder::new()
        .configure(Config::new().scheme(Some(SchemeKind::Hash)))
        .build(&lits)?;
    assert_eq!(SchemeKind::Hash, table.scheme().kind());

    let table =
        Builder::new().configure(Config::new().masked(false)).build(&lits)?;
    assert_eq!(SchemeKind::Hash, table.scheme().kind());
    assert_eq!(2, table.literal_count());
    assert!(table.bucket_count() >= 1);
    assert_eq!(2, table.history_len());
    Ok(())
}
