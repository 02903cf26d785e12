#![no_main]

use libfuzzer_sys::fuzz_target;
use pio_program::{parse_program, program_image};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(program) = parse_program("fuzz", text) {
        assert!(!program.is_empty());
        assert!(program.len() <= 32);
        assert!(program.wrap() < 32 && program.wrap_target() < 32);
        assert_eq!(
            program.allocation_mask().count_ones() as usize,
            program.len()
        );
        assert_eq!(program_image(&program).len(), program.len() * 2);
    }
});
