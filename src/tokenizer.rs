/// A lexical token of one input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Word(String),
    /// `|`
    Pipe,
    /// `&`
    Background,
    /// `<`
    RedirectIn,
    /// `>`
    RedirectOut,
    /// `>>`
    RedirectAppend,
}

/// Split one input line into tokens.
///
/// Unquoted runs split on whitespace; `|`, `&`, `<` and `>` delimit
/// themselves, so `ls>out` is three tokens; `>>` is a single operator.
/// `"…"` and `'…'` regions are taken literally with the quotes removed;
/// whitespace and operator characters inside quotes are plain text. An
/// unterminated quote is an error.
pub fn tokenize(line: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    // Distinguishes "no word in progress" from an empty quoted word ("").
    let mut in_word = false;
    let mut chars = line.chars().peekable();

    fn flush(tokens: &mut Vec<Token>, current: &mut String, in_word: &mut bool) {
        if *in_word {
            tokens.push(Token::Word(std::mem::take(current)));
            *in_word = false;
        }
    }

    while let Some(ch) = chars.next() {
        match ch {
            c if c.is_whitespace() => flush(&mut tokens, &mut current, &mut in_word),
            '\'' | '"' => {
                let quote = ch;
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == quote {
                        closed = true;
                        break;
                    }
                    current.push(c);
                }
                if !closed {
                    return Err(match quote {
                        '\'' => "unmatched single quotes".to_string(),
                        _ => "unmatched double quotes".to_string(),
                    });
                }
                in_word = true;
            }
            '|' => {
                flush(&mut tokens, &mut current, &mut in_word);
                tokens.push(Token::Pipe);
            }
            '&' => {
                flush(&mut tokens, &mut current, &mut in_word);
                tokens.push(Token::Background);
            }
            '<' => {
                flush(&mut tokens, &mut current, &mut in_word);
                tokens.push(Token::RedirectIn);
            }
            '>' => {
                flush(&mut tokens, &mut current, &mut in_word);
                if chars.peek() == Some(&'>') {
                    chars.next();
                    tokens.push(Token::RedirectAppend);
                } else {
                    tokens.push(Token::RedirectOut);
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    flush(&mut tokens, &mut current, &mut in_word);

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(tokens: &[Token]) -> Vec<&str> {
        tokens
            .iter()
            .filter_map(|t| match t {
                Token::Word(w) => Some(w.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn splits_on_whitespace() {
        let tokens = tokenize("echo hello\tworld").unwrap();
        assert_eq!(words(&tokens), vec!["echo", "hello", "world"]);
    }

    #[test]
    fn operators_delimit_without_spaces() {
        let tokens = tokenize("ls>out").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Word("ls".into()),
                Token::RedirectOut,
                Token::Word("out".into()),
            ]
        );
    }

    #[test]
    fn append_is_one_operator() {
        let tokens = tokenize("echo hi >> log").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Word("echo".into()),
                Token::Word("hi".into()),
                Token::RedirectAppend,
                Token::Word("log".into()),
            ]
        );
    }

    #[test]
    fn adjacent_gt_gt_gt_is_append_then_out() {
        let tokens = tokenize("a >>> b").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Word("a".into()),
                Token::RedirectAppend,
                Token::RedirectOut,
                Token::Word("b".into()),
            ]
        );
    }

    #[test]
    fn pipeline_and_background_tokens() {
        let tokens = tokenize("cat f | sort | uniq &").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Word("cat".into()),
                Token::Word("f".into()),
                Token::Pipe,
                Token::Word("sort".into()),
                Token::Pipe,
                Token::Word("uniq".into()),
                Token::Background,
            ]
        );
    }

    #[test]
    fn double_quotes_preserve_spaces_and_operators() {
        let tokens = tokenize(r#"echo "a | b > c""#).unwrap();
        assert_eq!(words(&tokens), vec!["echo", "a | b > c"]);
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn single_quotes_are_literal() {
        let tokens = tokenize("echo 'kill -STOP $$'").unwrap();
        assert_eq!(words(&tokens), vec!["echo", "kill -STOP $$"]);
    }

    #[test]
    fn quotes_join_mid_word() {
        let tokens = tokenize(r#"he"llo wor"ld"#).unwrap();
        assert_eq!(words(&tokens), vec!["hello world"]);
    }

    #[test]
    fn empty_quoted_word_is_kept() {
        let tokens = tokenize(r#"echo "" x"#).unwrap();
        assert_eq!(words(&tokens), vec!["echo", "", "x"]);
    }

    #[test]
    fn unmatched_quotes_error() {
        assert!(tokenize("echo 'abc").is_err());
        assert!(tokenize(r#"echo "abc"#).is_err());
    }

    #[test]
    fn empty_line_yields_no_tokens() {
        assert!(tokenize("").unwrap().is_empty());
        assert!(tokenize("   \t ").unwrap().is_empty());
    }
}
