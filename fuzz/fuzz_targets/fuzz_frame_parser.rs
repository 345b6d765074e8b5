#![no_main]
use libfuzzer_sys::fuzz_target;
use std::time::Instant;

use weigh_core::{ChannelId, RawFrame, StabilizationEngine};

fuzz_target!(|data: (bool, Vec<String>)| {
    let (reverse, chunks) = data;
    let mut engine = StabilizationEngine::default();
    engine.register(ChannelId::from("F"), reverse);
    let mut last = None;
    for text in chunks {
        let frame = RawFrame {
            channel: ChannelId::from("F"),
            text,
            received_at: Instant::now(),
        };
        if let Some(w) = engine.process(&frame) {
            assert_ne!(Some(w.value), last);
            last = Some(w.value);
        }
    }
});
