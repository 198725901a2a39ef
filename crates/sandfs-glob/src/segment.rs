//! Glob matching for a single path segment.
//!
//! Supported syntax:
//! - `*` matches zero or more characters
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]` match one character from a set or range
//! - `[!abc]` or `[^abc]` match one character NOT in the set
//! - `\x` matches `x` literally
//! - `{a,b,c}` matches any of the alternatives (nesting allowed)
//!
//! Matching never crosses a `/`; path-level matching lives in
//! [`GlobPath`](crate::GlobPath).

/// Upper bound on brace alternatives produced from one pattern.
const MAX_BRACE_EXPANSIONS: usize = 1024;

/// Check if a string contains glob metacharacters.
///
/// ```
/// use sandfs_glob::contains_glob;
/// assert!(contains_glob("*.txt"));
/// assert!(contains_glob("file{1,2}"));
/// assert!(!contains_glob("notes/today.txt"));
/// ```
pub fn contains_glob(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

/// Match a single segment against a glob pattern.
///
/// ```
/// use sandfs_glob::segment_match;
///
/// assert!(segment_match("*.txt", "notes.txt"));
/// assert!(segment_match("*", ".hidden"));
/// assert!(segment_match("img_[0-9]?.{png,jpg}", "img_42.png"));
/// assert!(!segment_match("*.txt", "notes.md"));
/// ```
pub fn segment_match(pattern: &str, input: &str) -> bool {
    let input: Vec<char> = input.chars().collect();
    expand_braces(pattern).iter().any(|alt| {
        let tokens = tokenize(alt);
        match_tokens(&tokens, &input)
    })
}

/// Expand `{a,b}` groups into every alternative.
///
/// Unbalanced braces are kept literally.
///
/// ```
/// use sandfs_glob::expand_braces;
///
/// assert_eq!(expand_braces("a{1,2}"), vec!["a1", "a2"]);
/// assert_eq!(expand_braces("plain"), vec!["plain"]);
/// ```
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let mut out = Vec::new();
    expand_into(pattern, &mut out);
    out
}

fn expand_into(pattern: &str, out: &mut Vec<String>) {
    if out.len() >= MAX_BRACE_EXPANSIONS {
        return;
    }
    let Some((open, close)) = find_brace_group(pattern) else {
        out.push(pattern.to_string());
        return;
    };

    let head = &pattern[..open];
    let tail = &pattern[close + 1..];
    for alt in split_alternatives(&pattern[open + 1..close]) {
        expand_into(&format!("{head}{alt}{tail}"), out);
    }
}

/// Byte offsets of the first balanced top-level `{...}` group.
fn find_brace_group(pattern: &str) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut open = None;
    let mut escaped = false;
    for (i, c) in pattern.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => {
                if depth == 0 {
                    open = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return open.map(|o| (o, i));
                }
            }
            _ => {}
        }
    }
    None
}

fn split_alternatives(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(char),
    AnyOne,
    AnyRun,
    Class { negated: bool, items: Vec<ClassItem> },
}

#[derive(Debug, Clone, PartialEq)]
enum ClassItem {
    Char(char),
    Range(char, char),
}

impl Token {
    fn accepts(&self, c: char) -> bool {
        match self {
            Token::Literal(l) => *l == c,
            Token::AnyOne => true,
            Token::AnyRun => true,
            Token::Class { negated, items } => {
                let hit = items.iter().any(|item| match item {
                    ClassItem::Char(x) => *x == c,
                    ClassItem::Range(lo, hi) => (*lo..=*hi).contains(&c),
                });
                hit != *negated
            }
        }
    }
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                // Runs of stars behave like one.
                if tokens.last() != Some(&Token::AnyRun) {
                    tokens.push(Token::AnyRun);
                }
                i += 1;
            }
            '?' => {
                tokens.push(Token::AnyOne);
                i += 1;
            }
            '\\' if i + 1 < chars.len() => {
                tokens.push(Token::Literal(chars[i + 1]));
                i += 2;
            }
            '[' => match parse_class(&chars[i..]) {
                Some((token, used)) => {
                    tokens.push(token);
                    i += used;
                }
                None => {
                    tokens.push(Token::Literal('['));
                    i += 1;
                }
            },
            c => {
                tokens.push(Token::Literal(c));
                i += 1;
            }
        }
    }
    tokens
}

/// Parse `[...]` starting at `chars[0]`. Returns `None` when unclosed.
fn parse_class(chars: &[char]) -> Option<(Token, usize)> {
    let mut i = 1;
    let negated = matches!(chars.get(i), Some('!' | '^'));
    if negated {
        i += 1;
    }

    let body_start = i;
    let mut items = Vec::new();
    while i < chars.len() {
        let c = chars[i];
        // A `]` right after the opener is a literal member.
        if c == ']' && i > body_start {
            return Some((Token::Class { negated, items }, i + 1));
        }
        if i + 2 < chars.len() && chars[i + 1] == '-' && chars[i + 2] != ']' {
            items.push(ClassItem::Range(c, chars[i + 2]));
            i += 3;
        } else {
            items.push(ClassItem::Char(c));
            i += 1;
        }
    }
    None
}

/// Iterative matcher with single-star backtracking. Linear in practice and
/// immune to the exponential blowup of naive recursion.
fn match_tokens(tokens: &[Token], input: &[char]) -> bool {
    let (mut t, mut s) = (0usize, 0usize);
    let mut resume: Option<(usize, usize)> = None;

    while s < input.len() {
        match tokens.get(t) {
            Some(Token::AnyRun) => {
                resume = Some((t, s));
                t += 1;
            }
            Some(tok) if tok.accepts(input[s]) => {
                t += 1;
                s += 1;
            }
            _ => match resume {
                Some((star_t, star_s)) => {
                    t = star_t + 1;
                    s = star_s + 1;
                    resume = Some((star_t, star_s + 1));
                }
                None => return false,
            },
        }
    }

    tokens[t..].iter().all(|tok| *tok == Token::AnyRun)
}
