//! Token-prefix rollback arithmetic (spec §4.5).
//!
//! No tokenizer is available to this crate (the decoder that owns real
//! tokens is an external collaborator, spec §1), so a "token" is
//! approximated as a fixed number of bytes of the previous transcript.
//! The approximation is irrelevant to the invariant the spec actually
//! cares about (§8 property 5: rollback never produces a string that cuts
//! a UTF-8 code point in half) — `floor_char_boundary` is what enforces
//! that, regardless of how the byte count was chosen.

/// Rough average byte width of a decode token, used only to turn
/// `unfixed_token_num` into a byte count to trim. A real decoder
/// implementing the contract directly would use its own tokenizer
/// instead of this driver-side estimate.
const APPROX_BYTES_PER_TOKEN: usize = 4;

/// Returns the previous transcript with its last `tokens_to_roll` tokens
/// dropped, retreating the cut point to the nearest valid UTF-8 char
/// boundary if the estimated cut falls mid-code-point.
pub fn rollback_prefix(previous_text: &str, tokens_to_roll: usize) -> String {
    if tokens_to_roll == 0 || previous_text.is_empty() {
        return previous_text.to_string();
    }

    let cut_bytes = tokens_to_roll.saturating_mul(APPROX_BYTES_PER_TOKEN);
    let keep_bytes = previous_text.len().saturating_sub(cut_bytes);
    let boundary = floor_char_boundary(previous_text, keep_bytes);
    previous_text[..boundary].to_string()
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_tokens_is_noop() {
        assert_eq!(rollback_prefix("hello world", 0), "hello world");
    }

    #[test]
    fn empty_text_is_noop() {
        assert_eq!(rollback_prefix("", 5), "");
    }

    #[test]
    fn trims_ascii_cleanly() {
        let result = rollback_prefix("hello world", 2);
        assert!("hello world".starts_with(&result));
        assert!(result.len() < "hello world".len());
    }

    #[test]
    fn never_splits_a_multibyte_code_point() {
        // Each emoji is 4 bytes; a naive byte-count cut of 4*token would
        // often land mid-codepoint if token boundaries don't align to 4.
        let text = "hi \u{1F600}\u{1F601}\u{1F602}\u{1F603}\u{1F604}";
        for n in 0..10 {
            let result = rollback_prefix(text, n);
            assert!(result.is_char_boundary(result.len()));
            assert!(std::str::from_utf8(result.as_bytes()).is_ok());
        }
    }

    #[test]
    fn result_is_always_a_prefix_of_the_input() {
        let text = "the quick brown fox jumps over the lazy dog";
        for n in 0..20 {
            let result = rollback_prefix(text, n);
            assert!(text.starts_with(&result));
        }
    }
}
