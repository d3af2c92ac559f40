//! In-place, length-preserving byte rewriting.
//!
//! Every function here mutates only the byte ranges it matched and never
//! changes the length of the buffer. Offsets elsewhere in a native binary
//! depend on absolute positions, so anything that resizes the buffer would
//! corrupt it.

use crate::codec::{EncodedPattern, Encoding, PartialPattern};

/// Rewrite every occurrence of `pattern` in `buf`, returning the number of
/// replacements.
///
/// Wide patterns go through the partial-pattern scanner, narrow patterns
/// through a plain non-overlapping scan.
pub fn rewrite(buf: &mut [u8], pattern: &EncodedPattern) -> usize {
    match pattern.partial() {
        Some(partial) => rewrite_partial(buf, &partial),
        None => rewrite_exact(buf, pattern.search(), pattern.replacement()),
    }
}

/// Count occurrences `rewrite` would replace, without mutating anything.
pub fn count(buf: &[u8], pattern: &EncodedPattern) -> usize {
    match pattern.partial() {
        Some(partial) => scan_partial(buf, &partial, |_, _| {}),
        None => scan_exact(buf, pattern.search(), |_| {}),
    }
}

/// Wide-encoding scan.
///
/// Finds `search_prefix`, then requires the byte right after it to equal
/// `search_last`. A prefix match whose trailing byte disagrees (or that runs
/// into the end of the buffer) is a lookalike; scanning resumes one byte
/// later so an overlapping real match is still found.
pub fn rewrite_partial(buf: &mut [u8], partial: &PartialPattern) -> usize {
    let mut hits = Vec::new();
    let total = scan_partial(buf, partial, |start, last| hits.push((start, last)));

    for (start, last) in hits {
        buf[start..last].copy_from_slice(&partial.replacement_prefix);
        buf[last] = partial.replacement_last;
    }

    total
}

/// Narrow-encoding scan: overwrite each non-overlapping occurrence of
/// `search` with `replacement`.
///
/// # Panics
///
/// Panics if `search` and `replacement` differ in length.
pub fn rewrite_exact(buf: &mut [u8], search: &[u8], replacement: &[u8]) -> usize {
    assert_eq!(
        search.len(),
        replacement.len(),
        "in-place rewrite requires equal-length search and replacement"
    );

    let mut hits = Vec::new();
    let total = scan_exact(buf, search, |start| hits.push(start));

    for start in hits {
        buf[start..start + replacement.len()].copy_from_slice(replacement);
    }

    total
}

/// Whether `needle` occurs anywhere in `haystack`.
pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

/// Position of the first occurrence of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    let (&first, rest) = needle.split_first()?;
    if haystack.len() < needle.len() {
        return None;
    }

    let last_start = haystack.len() - needle.len();
    let mut pos = 0;
    while pos <= last_start {
        let offset = haystack[pos..=last_start].iter().position(|&b| b == first)?;
        let start = pos + offset;
        if &haystack[start + 1..start + needle.len()] == rest {
            return Some(start);
        }
        pos = start + 1;
    }
    None
}

// Matches are collected before writing so a replacement can never create a
// new match further along the buffer.
fn scan_partial(buf: &[u8], partial: &PartialPattern, mut on_match: impl FnMut(usize, usize)) -> usize {
    let prefix = &partial.search_prefix;
    let mut total = 0;
    let mut pos = 0;

    while pos < buf.len() {
        let found = if prefix.is_empty() {
            buf[pos..].iter().position(|&b| b == partial.search_last)
        } else {
            find(&buf[pos..], prefix)
        };
        let Some(offset) = found else {
            break;
        };
        let start = pos + offset;
        let last = start + prefix.len();

        match buf.get(last) {
            Some(&b) if b == partial.search_last => {
                on_match(start, last);
                total += 1;
                pos = last + 1;
            }
            _ => pos = start + 1,
        }
    }

    total
}

fn scan_exact(buf: &[u8], search: &[u8], mut on_match: impl FnMut(usize)) -> usize {
    if search.is_empty() {
        return 0;
    }

    let mut total = 0;
    let mut pos = 0;
    while let Some(offset) = find(&buf[pos..], search) {
        let start = pos + offset;
        on_match(start);
        total += 1;
        pos = start + search.len();
    }
    total
}
