//! Fuzz target for Frame::decode and Message::decode
//!
//! This fuzzer feeds arbitrary byte sequences to the framing layer to find:
//! - Parser crashes or panics
//! - Length prefixes that bypass the frame limit
//! - Allocation driven by the declared length rather than the data present
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use keyward_proto::{Frame, Message, DEFAULT_MAX_FRAME_LEN};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = Frame::decode(data, DEFAULT_MAX_FRAME_LEN) {
        assert!(frame.body.len() <= DEFAULT_MAX_FRAME_LEN);
        let _ = Message::from_frame(&frame);
    }

    // Bodies are also decoded directly by the stream transport
    let _ = Message::decode(data);
});
