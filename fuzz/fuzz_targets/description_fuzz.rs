//! Description fuzz target: feed arbitrary text to the XML reader and the
//! in-memory compile. Neither may panic; malformed input must come back as Err.
//! Build with: cargo fuzz run description_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    let _ = wireidl::xml::parse_document(s);
    // Imports resolve against a directory that does not exist, so only the
    // in-memory description is compiled.
    let options = wireidl::LoadOptions::new("/nonexistent");
    let _ = wireidl::compile_str(s, &options, &wireidl::Config::default());
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run description_fuzz");
}
