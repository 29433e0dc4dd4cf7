//! Fuzz target for the line tokenizer.
//!
//! Feeds arbitrary input to the tokenizer and the tag decoder; neither may
//! panic, and a tokenized line must always carry a command.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The socket decodes lossily, so the tokenizer only ever sees valid UTF-8.
    let input = String::from_utf8_lossy(data);
    if input.len() > 8191 {
        return;
    }

    if let Ok(line) = input.parse::<twirc::ParsedLine>() {
        assert!(!line.command.is_empty());
        let _ = line.to_string();
    }

    let _ = twirc::message::tags::parse_tags(&input);
});
