//! # Field Tokenizer Module
//!
//! Splits one complete sample frame such as `t2121p10.3f3.2` into
//! letter-tagged numeric fields (`t` = `2121`, `p` = `10.3`, `f` = `3.2`).
//!
//! The scanner has two states. In `AwaitingTag` it skips everything except a
//! letter; a letter opens a field and moves to `AccumulatingNumber`, where
//! digits, `.` and `-` extend the field's text. Another letter closes the
//! field and opens the next one; any other character closes it and returns to
//! `AwaitingTag`. The numeric text is not validated here.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    AwaitingTag,
    AccumulatingNumber { tag: char, start: usize },
}

/// One tagged field, borrowing its numeric text from the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    pub tag: char,
    pub text: &'a str,
}

fn is_numeric_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.' || c == '-'
}

/// Tokenize a frame into fields in left-to-right order.
///
/// A tag followed directly by another tag yields a field with empty text.
pub fn tokenize(frame: &str) -> Vec<Field<'_>> {
    let mut fields = Vec::new();
    let mut state = ScanState::AwaitingTag;

    for (idx, c) in frame.char_indices() {
        match state {
            ScanState::AwaitingTag => {
                if c.is_ascii_alphabetic() {
                    state = ScanState::AccumulatingNumber {
                        tag: c,
                        start: idx + c.len_utf8(),
                    };
                }
            }
            ScanState::AccumulatingNumber { tag, start } => {
                if is_numeric_char(c) {
                    continue;
                }

                fields.push(Field {
                    tag,
                    text: &frame[start..idx],
                });

                state = if c.is_ascii_alphabetic() {
                    ScanState::AccumulatingNumber {
                        tag: c,
                        start: idx + c.len_utf8(),
                    }
                } else {
                    ScanState::AwaitingTag
                };
            }
        }
    }

    if let ScanState::AccumulatingNumber { tag, start } = state {
        fields.push(Field {
            tag,
            text: &frame[start..],
        });
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(frame: &str) -> Vec<(char, &str)> {
        tokenize(frame).into_iter().map(|f| (f.tag, f.text)).collect()
    }

    #[test]
    fn test_tokenize_sample_frame() {
        assert_eq!(
            pairs("t2121p10.3f3.2"),
            vec![('t', "2121"), ('p', "10.3"), ('f', "3.2")]
        );
    }

    #[test]
    fn test_tokenize_negative_values() {
        assert_eq!(pairs("t5p-1.5"), vec![('t', "5"), ('p', "-1.5")]);
    }

    #[test]
    fn test_tokenize_leading_digits_are_skipped() {
        assert_eq!(pairs("123t5"), vec![('t', "5")]);
    }

    #[test]
    fn test_tokenize_adjacent_tags_give_empty_text() {
        assert_eq!(pairs("tp4"), vec![('t', ""), ('p', "4")]);
    }

    #[test]
    fn test_tokenize_other_characters_close_field() {
        assert_eq!(pairs("t1 2p3"), vec![('t', "1"), ('p', "3")]);
    }

    #[test]
    fn test_tokenize_malformed_text_is_passed_through() {
        assert_eq!(pairs("t1.2.3p--"), vec![('t', "1.2.3"), ('p', "--")]);
    }

    #[test]
    fn test_tokenize_empty_frame() {
        assert!(tokenize("").is_empty());
    }
}
