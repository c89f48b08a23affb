//! Recursive-descent scanner over signature bytes.
//!
//! A signature is a sequence of *single complete types*, and every container
//! code is followed by the complete types it contains, so the grammar is
//! scanned one complete type at a time: `scan_one` consumes exactly one and
//! reports where it ends, recursing into container contents. [`validate`]
//! repeats that from the start, and [`complete_len`] is the same walk with
//! validity taken for granted, used by the cursor primitives.

use super::signature_error::SignatureErrorKind::*;
use super::{SignatureError, MAX_ARRAY_NESTING, MAX_PAIR_NESTING, MAX_SIGNATURE_LEN};

/// One scanned single complete type.
struct Scan {
    /// Offset one past the end of the type.
    end: usize,
    /// Whether the type is basic and therefore permitted as a dict key.
    basic: bool,
}

/// Validate a full signature.
pub(super) const fn validate(bytes: &[u8]) -> Result<(), SignatureError> {
    if bytes.len() > MAX_SIGNATURE_LEN {
        return Err(SignatureError::new(TooLong, 0));
    }

    let mut at = 0;

    while at < bytes.len() {
        at = match scan_one(bytes, at, MAX_ARRAY_NESTING, MAX_PAIR_NESTING, false) {
            Ok(scan) => scan.end,
            Err(error) => return Err(error),
        };
    }

    Ok(())
}

/// Scan the single complete type starting at `at`.
///
/// `arrays` and `pairs` are the remaining nesting budgets for array codes
/// and for struct/dict-entry delimiters; `in_array` is set while scanning
/// the element type of an array, the only position a dict entry may occupy.
const fn scan_one(
    bytes: &[u8],
    at: usize,
    arrays: usize,
    pairs: usize,
    in_array: bool,
) -> Result<Scan, SignatureError> {
    match bytes[at] {
        b'y' | b'b' | b'n' | b'q' | b'i' | b'u' | b'x' | b't' | b'd' | b's' | b'o' | b'g'
        | b'h' => Ok(Scan {
            end: at + 1,
            basic: true,
        }),
        // A variant is a single complete type of its own, but not a basic
        // one: it cannot key a dict entry.
        b'v' => Ok(Scan {
            end: at + 1,
            basic: false,
        }),
        b'a' => {
            if arrays == 0 {
                return Err(SignatureError::new(NestingTooDeep, at));
            }

            if at + 1 >= bytes.len() || bytes[at + 1] == b')' || bytes[at + 1] == b'}' {
                return Err(SignatureError::new(TrailingArray, at));
            }

            match scan_one(bytes, at + 1, arrays - 1, pairs, true) {
                Ok(element) => Ok(Scan {
                    end: element.end,
                    basic: false,
                }),
                Err(error) => Err(error),
            }
        }
        b'(' => {
            if pairs == 0 {
                return Err(SignatureError::new(NestingTooDeep, at));
            }

            let mut n = at + 1;
            let mut fields = 0;

            loop {
                if n >= bytes.len() {
                    return Err(SignatureError::new(UnmatchedDelimiter, at));
                }

                if bytes[n] == b')' {
                    if fields == 0 {
                        return Err(SignatureError::new(EmptyStruct, at));
                    }

                    return Ok(Scan {
                        end: n + 1,
                        basic: false,
                    });
                }

                n = match scan_one(bytes, n, arrays, pairs - 1, false) {
                    Ok(field) => field.end,
                    Err(error) => return Err(error),
                };

                fields += 1;
            }
        }
        b'{' => {
            if !in_array {
                return Err(SignatureError::new(StrayDictEntry, at));
            }

            if pairs == 0 {
                return Err(SignatureError::new(NestingTooDeep, at));
            }

            if at + 1 >= bytes.len() || bytes[at + 1] == b'}' {
                return Err(SignatureError::new(DictEntryArity, at));
            }

            let key = match scan_one(bytes, at + 1, arrays, pairs - 1, false) {
                Ok(key) => key,
                Err(error) => return Err(error),
            };

            if !key.basic {
                return Err(SignatureError::new(NonBasicDictKey, at + 1));
            }

            if key.end >= bytes.len() {
                return Err(SignatureError::new(UnmatchedDelimiter, at));
            }

            if bytes[key.end] == b'}' {
                return Err(SignatureError::new(DictEntryArity, at));
            }

            let value = match scan_one(bytes, key.end, arrays, pairs - 1, false) {
                Ok(value) => value,
                Err(error) => return Err(error),
            };

            if value.end >= bytes.len() {
                return Err(SignatureError::new(UnmatchedDelimiter, at));
            }

            if bytes[value.end] != b'}' {
                return Err(SignatureError::new(DictEntryArity, value.end));
            }

            Ok(Scan {
                end: value.end + 1,
                basic: false,
            })
        }
        b')' | b'}' => Err(SignatureError::new(UnmatchedDelimiter, at)),
        other => Err(SignatureError::new(UnknownType(other), at)),
    }
}

/// The length in bytes of the single complete type starting at `at`.
///
/// Assumes the bytes are a validated signature.
pub(super) fn complete_len(bytes: &[u8], at: usize) -> usize {
    match bytes[at] {
        b'a' => 1 + complete_len(bytes, at + 1),
        open @ (b'(' | b'{') => {
            let close = if open == b'(' { b')' } else { b'}' };
            let mut n = at + 1;

            while bytes[n] != close {
                n += complete_len(bytes, n);
            }

            n + 1 - at
        }
        _ => 1,
    }
}
