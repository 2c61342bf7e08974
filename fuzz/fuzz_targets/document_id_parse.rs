#![no_main]

use docsum_types::{DocumentId, DocumentIdError, MAX_DOCUMENT_ID_LEN};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);

    match DocumentId::parse(&raw) {
        Ok(id) => {
            assert!(!id.as_str().is_empty());
            assert!(id.as_str().len() <= MAX_DOCUMENT_ID_LEN);
            assert!(id
                .as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
            let reparsed = DocumentId::parse(id.as_str()).expect("canonical id must reparse");
            assert_eq!(reparsed, id);
        }
        Err(DocumentIdError::Missing) => assert!(raw.trim().is_empty()),
        Err(DocumentIdError::Malformed(value)) => assert!(!value.is_empty()),
    }
});
