//! Fuzz target for the default event builders.
//!
//! Any tokenized line must turn into some event without panicking; malformed
//! fields degrade to defaults or `Unknown`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use twirc::builder::{BuildContext, BuilderRegistry};

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    let Ok(line) = input.parse::<twirc::ParsedLine>() else {
        return;
    };

    let registry = BuilderRegistry::new(BuildContext::new("gikkbot", "gikkman"));
    let _ = registry.build(&line);
});
