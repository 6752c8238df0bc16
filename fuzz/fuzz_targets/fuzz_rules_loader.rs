#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use wolfden::config::RulesLoader;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml) = std::str::from_utf8(data) {
        // merged over the built-in rules, like a user file
        let _ = RulesLoader::default().load_from_str(yaml, Path::new("fuzz.yaml"));
    }
});
