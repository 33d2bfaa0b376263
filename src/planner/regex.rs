//! Anchored-prefix extraction from regular expressions.
//!
//! A regex constrains an index scan only when it pins a literal prefix
//! to the start of the string. Extraction is deliberately conservative:
//! the moment a construct could match anything other than the literal
//! text seen so far, it stops and returns what it has.

/// Result of prefix extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexPrefix {
    /// Longest literal prefix every match must start with; empty when
    /// the pattern cannot constrain a scan
    pub prefix: String,
    /// True iff the whole pattern is the literal prefix, optionally
    /// followed by `.*` or the end anchor
    pub pure_prefix: bool,
}

impl RegexPrefix {
    fn none() -> Self {
        Self {
            prefix: String::new(),
            pure_prefix: false,
        }
    }
}

/// Extracts the longest anchored literal prefix of a pattern.
///
/// Rules:
/// - the pattern must start with `^`; otherwise no prefix
/// - the `i` flag defeats extraction (case folding breaks the order)
/// - the `m` flag defeats extraction (`^` no longer pins start of string)
/// - the `s` and `x` flags are permitted; under `x`, literal whitespace
///   is skipped and `#` starts a comment
/// - `\Q...\E` quotes its contents literally
/// - any other metacharacter ends extraction; `*` and `?` also retract
///   the character they make optional
pub fn simple_regex(pattern: &str, flags: &str) -> RegexPrefix {
    let mut extended = false;
    for flag in flags.chars() {
        match flag {
            's' => {}
            'x' => extended = true,
            _ => return RegexPrefix::none(),
        }
    }

    let Some(body) = pattern.strip_prefix('^') else {
        return RegexPrefix::none();
    };

    let mut prefix = String::new();
    let mut pure = false;
    let mut chars = body.chars().peekable();

    loop {
        let Some(c) = chars.next() else {
            // consumed the entire pattern literally
            pure = true;
            break;
        };
        match c {
            '\\' => match chars.next() {
                Some('Q') => {
                    // literal until \E (or end of pattern)
                    while let Some(q) = chars.next() {
                        if q == '\\' && chars.peek() == Some(&'E') {
                            chars.next();
                            break;
                        }
                        prefix.push(q);
                    }
                }
                Some(e) if e.is_ascii_alphanumeric() => break, // class escape like \d or \w
                Some(e) => prefix.push(e),                     // escaped punctuation is literal
                None => break,
            },
            '*' | '?' => {
                // the previous character is optional; retract it
                prefix.pop();
                break;
            }
            '$' => {
                if chars.peek().is_none() {
                    pure = true;
                }
                break;
            }
            '.' => {
                // a trailing .* still matches exactly the strings with
                // this prefix
                if chars.peek() == Some(&'*') {
                    chars.next();
                    if chars.peek().is_none() {
                        pure = true;
                    }
                }
                break;
            }
            '[' | '(' | ')' | '+' | '{' | '|' | '^' => break,
            '#' if extended => break,
            c if extended && c.is_whitespace() => {}
            c => prefix.push(c),
        }
    }

    if prefix.is_empty() {
        pure = false;
    }
    RegexPrefix {
        prefix,
        pure_prefix: pure,
    }
}

/// Computes the exclusive upper bound of the set of strings starting
/// with `prefix`: the last byte below 0xFF is incremented and the tail
/// truncated. An all-0xFF prefix has no finite upper bound and yields
/// an empty result.
pub fn simple_regex_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(&last) = end.last() {
        if last < 0xFF {
            let idx = end.len() - 1;
            end[idx] = last + 1;
            return end;
        }
        end.pop();
    }
    Vec::new()
}
