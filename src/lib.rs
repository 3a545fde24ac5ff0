/*!
A multi-literal matching engine that compiles a set of byte string literals
into a single relocatable table and scans buffers, or streams of buffers,
for every occurrence of every literal.

Two matching schemes are supported:

* A hash-bucket scheme, which runs a shift-or filter over a two byte domain
  and confirms candidates through per-bucket hash tables. It works for any
  literal set.
* A masked nibble scheme, which checks the low and high nibbles of up to four
  trailing bytes of each literal with vector shuffles, 16 or 32 positions at a
  time. It only applies to small literal sets that can be disambiguated by a
  short suffix.

Which scheme is used is decided when a table is built, based on the literal
set, the [`Target`] capabilities and the [`table::Config`] in use. Both
schemes report matches through the same callback with the same ordering
guarantees: matches are reported in ascending order of their end offset, and
matches sharing an end offset are reported longest first.

# Example

```
use litmatch::{Action, Literal, Match, Table};

let table = Table::new(&[
    Literal::new("samwise", 1),
    Literal::new("Gamgee", 2).nocase(true),
])?;

let mut matches = vec![];
table.scan(
    &litmatch::Input::new("Samwise samwise GAMGEE"),
    |m: &Match| {
        matches.push((m.start(), m.end(), m.id()));
        Action::Continue
    },
)?;
assert_eq!(matches, vec![(8, 14, 1), (16, 21, 2)]);

# Ok::<(), Box<dyn std::error::Error>>(())
```

# Streaming

A table can also scan a sequence of chunks through a [`StreamState`]. The
state carries enough trailing history from previous chunks to find literals
that straddle chunk boundaries, and match offsets are always reported in
cumulative stream coordinates:

```
use litmatch::{Action, Groups, Literal, Table};

let table = Table::new(&[Literal::new("aardvark", 7)])?;
let mut state = table.open_stream();

let mut ends = vec![];
for chunk in [&b"aaar"[..], &b"dvark"[..]].iter() {
    table.scan_stream(&mut state, chunk, Groups::ALL, |m| {
        ends.push(m.end());
        Action::Continue
    })?;
}
table.close_stream(&mut state)?;
assert_eq!(ends, vec![8]);

# Ok::<(), Box<dyn std::error::Error>>(())
```

# Crate features

* **std** - Enables `std::error::Error` implementations and runtime CPU
feature detection. Enabled by default.
* **logging** - Logs build decisions through the `log` crate.
*/

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(any(
    target_pointer_width = "32",
    target_pointer_width = "64"
)))]
compile_error!("litmatch currently not supported on non-{32,64}");

extern crate alloc;

pub use crate::{
    error::{BuildError, BuildErrorKind, ScanError, ScanErrorKind},
    literal::{mask_is_consistent, Groups, Literal, MAX_MASK_LEN, RESERVED_ID},
    scan::{Action, Input, Match, ScanStatus},
    scheme::{Preference, Scheme, SchemeKind, Target, VectorWidth},
    stream::{StreamState, StreamStatus},
    table::Table,
    util::wire::{DeserializeError, SerializeError},
};

#[macro_use]
mod macros;

mod confirm;
mod error;
mod fdr;
mod flood;
mod literal;
mod scan;
mod scheme;
mod stream;
pub mod table;
mod teddy;
pub mod util;
