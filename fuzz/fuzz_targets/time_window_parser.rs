#![no_main]

use libfuzzer_sys::fuzz_target;
use routegraph::time_window::TimeWindow;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Split on the first space into start/end bounds; must never panic
        let (start, end) = input.split_once(' ').unwrap_or((input, input));
        if let Ok(window) = TimeWindow::parse(start, end) {
            assert!(window.start <= window.end);
            let _ = window.to_query_strings();
        }
    }
});
