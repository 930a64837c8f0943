//! Random-input fuzzer for `Message::decode`.
//!
//! Arbitrary bytes must never panic the decoder, with or without a cipher
//! context. Anything that decodes must re-encode to a message that decodes
//! to the same value.

#![no_main]

use derec_proto::{ChaChaCipher, Envelope, Message};
use libfuzzer_sys::fuzz_target;

const KEY: [u8; ChaChaCipher::KEY_SIZE] = [0x42; ChaChaCipher::KEY_SIZE];
const NONCE: [u8; ChaChaCipher::NONCE_SIZE] = [0x07; ChaChaCipher::NONCE_SIZE];

fuzz_target!(|data: &[u8]| {
    let cipher = ChaChaCipher::new(&KEY);

    if let Ok(message) = Message::decode(data, None) {
        let encoded = message.encode(None).expect("cleartext message re-encodes");
        let again = Message::decode(&encoded, None).expect("re-encoded message decodes");
        assert_eq!(message, again);
    }

    if let Ok(message) = Message::decode(data, Some(Envelope::new(&cipher, &NONCE))) {
        let encoded = message
            .encode(Some(Envelope::new(&cipher, &NONCE)))
            .expect("decoded message re-encodes");
        let again = Message::decode(&encoded, Some(Envelope::new(&cipher, &NONCE)))
            .expect("re-encoded message decodes");
        assert_eq!(message, again);
    }
});
