//! Property tests for the in-place rewriter.

use domain_patcher::codec::{DomainPattern, Encoding, ORIGINAL_DOMAIN};
use domain_patcher::rewrite;
use proptest::prelude::*;

fn pattern() -> DomainPattern {
    DomainPattern::new(ORIGINAL_DOMAIN, "sanasol.ws").unwrap()
}

/// Filler that can never start or complete an occurrence.
fn filler() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>().prop_filter("no 'h'", |b| *b != b'h'), 0..64)
}

fn build(chunks: &[Vec<u8>], occurrence: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    for (idx, chunk) in chunks.iter().enumerate() {
        if idx > 0 {
            data.extend_from_slice(occurrence);
        }
        data.extend_from_slice(chunk);
    }
    data
}

proptest! {
    #[test]
    fn wide_count_matches_inserted(chunks in prop::collection::vec(filler(), 1..8)) {
        let encoded = pattern().encode(Encoding::Wide);
        let mut data = build(&chunks, &Encoding::Wide.encode(ORIGINAL_DOMAIN));
        let len = data.len();

        prop_assert_eq!(rewrite::rewrite(&mut data, &encoded), chunks.len() - 1);
        prop_assert_eq!(data.len(), len);
        prop_assert_eq!(rewrite::count(&data, &encoded), 0);
    }

    #[test]
    fn narrow_count_matches_inserted(chunks in prop::collection::vec(filler(), 1..8)) {
        let encoded = pattern().encode(Encoding::Narrow);
        let mut data = build(&chunks, ORIGINAL_DOMAIN.as_bytes());
        let len = data.len();

        prop_assert_eq!(rewrite::rewrite(&mut data, &encoded), chunks.len() - 1);
        prop_assert_eq!(data.len(), len);
    }

    #[test]
    fn rewrite_never_changes_length(mut data in prop::collection::vec(any::<u8>(), 0..512)) {
        let len = data.len();
        for encoded in pattern().encodings() {
            let _ = rewrite::rewrite(&mut data, &encoded);
        }
        prop_assert_eq!(data.len(), len);
    }
}
