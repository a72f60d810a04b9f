#![no_main]

use glint_engine::{merge, scan, Template};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        let tags = scan(source);
        for tag in &tags {
            assert!(tag.span.start <= tag.span.end && tag.span.end <= source.len());
        }
        let stream = merge(source, &tags);
        assert!(stream.windows(2).all(|pair| pair[0].span.start <= pair[1].span.start));
        let _ = Template::compile("fuzz-template", source);
    }
});
