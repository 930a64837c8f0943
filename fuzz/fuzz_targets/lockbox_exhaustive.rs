//! Exhaustive positive-space fuzzer for the lockbox share messages.
//!
//! Every edge-case share version is combined with a range of share sizes;
//! the input only picks the share contents and the version slice to start at.

#![no_main]

use derec_proto::{Message, StoreLockboxShareRequest, StoreLockboxShareResponse};
use libfuzzer_sys::fuzz_target;

const VERSIONS: &[u16] = &[0, 1, 0x00ff, 0x0100, u16::MAX / 2, u16::MAX - 1, u16::MAX];

const SHARE_SIZES: &[usize] = &[0, 1, 255, 256, 1024, u16::MAX as usize];

fuzz_target!(|data: &[u8]| {
    let Some((&first, rest)) = data.split_first() else {
        return;
    };

    for &version in &VERSIONS[first as usize % VERSIONS.len()..] {
        for &size in SHARE_SIZES {
            let share = if size <= rest.len() { rest[..size].to_vec() } else { vec![0xa5; size] };

            let request = Message::from(StoreLockboxShareRequest::new(version, share.clone()));
            let bytes = request.encode(None).expect("share request encodes");
            assert_eq!(bytes.len(), 2 + 2 + 2 + 2 + share.len());
            let decoded = Message::decode(&bytes, None).expect("share request decodes");
            assert_eq!(decoded, request);

            let response = Message::from(StoreLockboxShareResponse::new(version));
            let bytes = response.encode(None).expect("share response encodes");
            let decoded = Message::decode(&bytes, None).expect("share response decodes");
            assert_eq!(decoded, response);
        }
    }
});
