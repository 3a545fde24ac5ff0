use litmatch::{
    table::{Builder, Config, Table},
    Action, BuildErrorKind, Groups, Input, Literal, Match, Preference,
    SchemeKind, Target, VectorWidth,
};

/// Every way of building a table that the tests check against each other.
///
/// Each entry forces a scheme and its parameters, so that a literal set is
/// exercised under every scheme that can represent it rather than only the
/// one the default selection would pick.
pub fn builders() -> Vec<(&'static str, Builder)> {
    let hash = || Config::new().scheme(Some(SchemeKind::Hash));
    let masked = || Config::new().scheme(Some(SchemeKind::Masked));
    let mut builders = vec![];
    let mut add = |name: &'static str, target: Target, config: Config| {
        let mut b = Builder::new();
        b.target(target).configure(config);
        builders.push((name, b));
    };
    add("default", Target::detect(), Config::new());
    add("scalar", Target::scalar(), Config::new());
    add(
        "speed",
        Target::detect(),
        Config::new().preference(Preference::Speed),
    );
    add("hash", Target::scalar(), hash().packed(false));
    add("hash-packed", Target::scalar(), hash());
    add(
        "hash-wide",
        Target::scalar(),
        hash().packed(false).domain_bits(Some(15)),
    );
    add(
        "hash-bare",
        Target::scalar(),
        hash().packed(false).floodguard(false).accelerate(false),
    );
    add("masked-128", Target::new(VectorWidth::V128), masked().packed(false));
    add("masked-256", Target::new(VectorWidth::V256), masked().packed(false));
    add("masked-packed", Target::new(VectorWidth::V256), masked());
    add(
        "masked-bare",
        Target::new(VectorWidth::V128),
        masked().packed(false).floodguard(false).accelerate(false),
    );
    add(
        "masked-narrow",
        Target::new(VectorWidth::V256),
        masked().bucket_width(2).wide_vectors(false),
    );
    builders
}

/// Builds a table for the given literals with every builder that supports
/// them. Forced masked builds are skipped when the masked scheme cannot
/// represent the literals, and any other build failure panics.
pub fn tables(lits: &[Literal]) -> Vec<(&'static str, Table)> {
    let mut tables = vec![];
    for (name, builder) in builders() {
        match builder.build(lits) {
            Ok(table) => tables.push((name, table)),
            Err(err) => match err.kind() {
                BuildErrorKind::NoScheme { .. }
                    if name.starts_with("masked") => {}
                _ => panic!("failed to build {}: {}", name, err),
            },
        }
    }
    assert!(!tables.is_empty());
    tables
}

/// Collects every match the table reports for the given input.
pub fn scan(table: &Table, input: &Input<'_>) -> Vec<Match> {
    let mut got = vec![];
    table
        .scan(input, |m| {
            got.push(*m);
            Action::Continue
        })
        .unwrap();
    got
}

/// A straightforward scanner that checks every literal at every end
/// position. It implements the same reporting rules as a table: positions
/// ascend, literals at one position are reported longest first and then in
/// the order they were given, and "no runs" literals are suppressed when
/// the previously reported match has the same identifier.
pub fn naive(lits: &[Literal], input: &Input<'_>) -> Vec<Match> {
    let history = input.get_history();
    let buf: Vec<u8> =
        history.iter().chain(input.haystack()).copied().collect();
    let base = input.get_offset() - history.len() as u64;
    let from = history.len() + input.get_start();

    let mut order: Vec<usize> = (0..lits.len()).collect();
    order.sort_by_key(|&i| (std::cmp::Reverse(lits[i].len()), i));

    let mut last_id = None;
    let mut matches = vec![];
    for end in from..buf.len() {
        for &i in &order {
            let lit = &lits[i];
            if !is_match_at(lit, &buf, end) {
                continue;
            }
            if !lit.get_groups().intersects(input.get_groups()) {
                continue;
            }
            if lit.is_noruns() && last_id == Some(lit.id()) {
                continue;
            }
            last_id = Some(lit.id());
            let end = base + end as u64;
            let start = end + 1 - lit.len() as u64;
            matches.push(Match::new(start, end, lit.id()));
        }
    }
    matches
}

fn is_match_at(lit: &Literal, buf: &[u8], end: usize) -> bool {
    if end + 1 < lit.coverage() {
        return false;
    }
    let got = &buf[end + 1 - lit.len()..=end];
    let same = if lit.is_nocase() {
        got.eq_ignore_ascii_case(lit.pattern())
    } else {
        got == lit.pattern()
    };
    let (mask, cmp) = (lit.get_mask(), lit.get_cmp());
    same && mask.iter().zip(cmp).rev().enumerate().all(|(j, (&m, &c))| {
        buf[end - j] & m == c & m
    })
}

/// Asserts that every table built for the literals agrees with the naive
/// scanner on the given input.
pub fn assert_all_agree(lits: &[Literal], input: &Input<'_>) {
    assert_tables_agree(&tables(lits), lits, input);
}

/// Like `assert_all_agree`, but with tables that were already built.
pub fn assert_tables_agree(
    tables: &[(&'static str, Table)],
    lits: &[Literal],
    input: &Input<'_>,
) {
    let expected = naive(lits, input);
    for (name, table) in tables.iter() {
        assert_eq!(
            expected,
            scan(table, input),
            "{} ({:?}) disagrees for {:?}",
            name,
            table.scheme(),
            input,
        );
    }
}

/// Scans the haystack as a stream, splitting it at the given positions.
pub fn scan_chunks<T: AsRef<[u8]>>(
    table: &Table<T>,
    haystack: &[u8],
    splits: &[usize],
    groups: Groups,
) -> Vec<Match> {
    let mut got = vec![];
    let mut state = table.open_stream();
    let mut at = 0;
    for &split in splits.iter().chain(Some(&haystack.len())) {
        if split <= at || split > haystack.len() {
            continue;
        }
        table
            .scan_stream(&mut state, &haystack[at..split], groups, |m| {
                got.push(*m);
                Action::Continue
            })
            .unwrap();
        at = split;
    }
    table.close_stream(&mut state).unwrap();
    got
}
