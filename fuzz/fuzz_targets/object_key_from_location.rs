#![no_main]

use docsum_content::{default_url_prefix, object_key_from_location, FilesystemContentStore};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let prefix = default_url_prefix("docs");
    let store = FilesystemContentStore::new("/srv/objects");

    if let Ok(key) = object_key_from_location(&raw, &prefix) {
        assert!(!key.is_empty());
        if let Ok(path) = store.object_path("docs", &key) {
            assert!(path.starts_with("/srv/objects/docs"));
        }
    }
});
