//! Generated tokens to display text
//!
//! Pieces are joined with a spacing heuristic: a space goes between two
//! pieces unless the output already ends in whitespace or the next piece
//! starts with whitespace, punctuation or an apostrophe.

use crate::inference::backend::{InferenceContext, Token};

/// Decodes `tokens` through the engine and joins the pieces.
pub fn tokens_to_text<C: InferenceContext + ?Sized>(ctx: &C, tokens: &[Token]) -> String {
    join_pieces(tokens.iter().map(|&token| ctx.token_piece(token)))
}

/// Joins raw token pieces. Empty pieces are skipped. Bytes are converted
/// once at the end so characters split across pieces survive.
pub fn join_pieces<I, P>(pieces: I) -> String
where
    I: IntoIterator<Item = P>,
    P: AsRef<[u8]>,
{
    let mut out: Vec<u8> = Vec::new();
    for piece in pieces {
        let piece = piece.as_ref();
        if piece.is_empty() {
            continue;
        }
        if needs_space(&out, piece) {
            out.push(b' ');
        }
        out.extend_from_slice(piece);
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn needs_space(out: &[u8], piece: &[u8]) -> bool {
    let (Some(&last), Some(&head)) = (out.last(), piece.first()) else {
        return false;
    };
    !is_space(last)
        && !is_utf8_continuation(head)
        && head != b' '
        && head != b'\n'
        && !head.is_ascii_punctuation()
        && head != b'\''
}

// The tail of a character split across two pieces
fn is_utf8_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

// Matches C isspace: also vertical tab and form feed
fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_pieces_get_single_spaces() {
        assert_eq!(join_pieces(["Hello", "there", "friend"]), "Hello there friend");
    }

    #[test]
    fn test_leading_space_pieces_are_not_doubled() {
        assert_eq!(join_pieces(["Hello", " there", " friend"]), "Hello there friend");
    }

    #[test]
    fn test_no_space_before_punctuation_or_contraction() {
        assert_eq!(join_pieces(["Hi", "!", "I", "'m", "fine", "."]), "Hi! I'm fine.");
        assert_eq!(join_pieces(["yes", ",", "no", "?"]), "yes, no?");
    }

    #[test]
    fn test_no_space_after_whitespace_or_before_newline() {
        assert_eq!(join_pieces(["line", "\n", "next"]), "line\nnext");
        assert_eq!(join_pieces(["tab\t", "next"]), "tab\tnext");
    }

    #[test]
    fn test_empty_pieces_are_skipped() {
        assert_eq!(join_pieces(["", "Hello", "", "world"]), "Hello world");
        assert_eq!(join_pieces(Vec::<&str>::new()), "");
    }

    #[test]
    fn test_multibyte_character_split_across_pieces() {
        let euro = "€".as_bytes();
        let pieces: Vec<&[u8]> = vec![b"cost ", &euro[..1], &euro[1..], b"5"];
        assert_eq!(join_pieces(pieces), "cost \u{20ac} 5");
    }

    #[test]
    fn test_never_inserts_double_space_or_space_before_punctuation() {
        let vocabulary = [
            "a", " b", "c ", ".", ",", "!", "?", "'", "\n", " ", "word", " x", "'s", "  ",
        ];
        // Every ordered triple of fragments
        for a in vocabulary {
            for b in vocabulary {
                for c in vocabulary {
                    let pieces = [a, b, c];
                    let joined = join_pieces(pieces);
                    let raw: String = pieces.concat();
                    let inserted = joined.len() - raw.len();

                    let mut rebuilt = String::new();
                    for piece in pieces {
                        if needs_space(rebuilt.as_bytes(), piece.as_bytes()) {
                            assert!(!rebuilt.ends_with(' '));
                            assert!(!piece.starts_with(' '));
                            assert!(!matches!(
                                piece.chars().next(),
                                Some('.' | ',' | '!' | '?' | '\'')
                            ));
                            rebuilt.push(' ');
                        }
                        rebuilt.push_str(piece);
                    }
                    assert_eq!(rebuilt, joined);
                    assert!(inserted <= 2);
                    if !raw.contains("  ") {
                        assert!(!joined.contains("  "), "{pieces:?} -> {joined:?}");
                    }
                }
            }
        }
    }
}
