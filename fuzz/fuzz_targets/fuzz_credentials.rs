//! Fuzz testing for the credential classifier.
//!
//! The classifier sees raw `Authorization` header values from the network
//! before anything else has checked them. It must:
//!
//! - Never panic on any input, including invalid base64 and odd separators
//! - Return the same answer for the same input
//! - Only produce `Basic` credentials for headers using the basic scheme
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_credentials
//! cargo +nightly fuzz run fuzz_credentials -- -max_total_time=60
//! ```

#![no_main]

use arbitrary::Arbitrary;
use edge_pipeline::auth::{Credential, CredentialClassifier};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    header: Option<&'a str>,
    prefix: &'a str,
    separator: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let default = CredentialClassifier::default();
    let custom = CredentialClassifier::new(input.prefix, input.separator);

    for classifier in [&default, &custom] {
        let first = classifier.classify(input.header);
        let second = classifier.classify(input.header);
        assert_eq!(first, second);

        if let Ok(Credential::Basic { .. }) = first {
            let scheme = input
                .header
                .and_then(|h| h.split(' ').next())
                .unwrap_or_default();
            assert!(scheme.eq_ignore_ascii_case("basic"));
        }
    }
});
