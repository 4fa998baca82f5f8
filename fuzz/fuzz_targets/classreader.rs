#![no_main]

use classweave::classfile::{ClassReader, ReaderFlags};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = ClassReader::new(data).read(ReaderFlags::empty());
    let _ = classweave::signature::parse_signature(&String::from_utf8_lossy(data));
});
