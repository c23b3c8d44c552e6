//! Single-pass lexical region scanner for JavaScript source text.
//!
//! Every analysis step in the kernel (persistence rewriting, declared-name
//! extraction, completeness classification, cursor-context detection) needs
//! to know whether a position sits inside a string, template literal,
//! comment, or regular-expression literal. They all consume this one scanner
//! so they never diverge on what counts as "inside a string".
//!
//! Scanning never fails: an unterminated construct at end of input is
//! reported as still open, which downstream consumers use directly (the
//! completeness classifier treats an open string as "needs more input").

/// Lexical region kind at a given position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum RegionKind {
    /// Plain code, including code inside a template expression.
    Code,
    /// Single- or double-quoted string literal.
    String,
    /// Template literal text (between backticks, outside `${}`).
    Template,
    /// Line comment, up to but not including the newline.
    LineComment,
    /// Block comment, including an unterminated one.
    BlockComment,
    /// Regular-expression literal, including its character classes.
    Regex,
}

/// A contiguous span of one region kind. Byte offsets, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub kind: RegionKind,
    pub start: usize,
    pub end: usize,
}

/// Internal scanner mode. `Code` covers template-expression interiors; the
/// nesting stack distinguishes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    Single,
    Double,
    Template,
    LineComment,
    BlockComment,
    Regex,
    RegexClass,
}

/// One level of template nesting. A template expression tracks its interior
/// brace depth so the scanner knows which `}` closes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nest {
    Template,
    TemplateExpr { brace_depth: u32 },
}

/// Keywords after which a `/` starts a regular-expression literal rather
/// than a division operator.
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do", "else", "yield",
    "await",
];

/// Incremental scanner state.
///
/// Feed characters one at a time with [`ScanState::feed`]; query the lexical
/// kind at any point with [`ScanState::kind`]. The final state after feeding
/// a whole snippet reports open constructs and bracket balance.
#[derive(Debug, Clone)]
pub struct ScanState {
    mode: Mode,
    /// Pending escape inside a string/template/regex literal.
    escaped: bool,
    /// Open templates and template expressions, innermost last.
    nesting: Vec<Nest>,
    /// Open code brackets, innermost last. Template-expression braces are
    /// tracked in `nesting`, not here.
    brackets: Vec<char>,
    /// Set when a closing bracket arrives with nothing open, or closes the
    /// wrong kind of bracket. Never cleared.
    mismatched: bool,
    /// Last significant (non-whitespace, non-comment) character seen in code.
    last_significant: Option<char>,
    /// Identifier/keyword token currently being accumulated in code.
    word: String,
    /// Last completed identifier/keyword token in code.
    last_word: String,
    /// A `$` was seen in template text and the following `{` opens an
    /// expression rather than being literal text.
    pending_expr: bool,
    /// The next block-comment character is the `*` of the `/*` opener and
    /// must not count toward a `*/` closer.
    fresh_block_comment: bool,
}

impl Default for ScanState {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: Mode::Code,
            escaped: false,
            nesting: Vec::new(),
            brackets: Vec::new(),
            mismatched: false,
            last_significant: None,
            word: String::new(),
            last_word: String::new(),
            pending_expr: false,
            fresh_block_comment: false,
        }
    }

    /// Region kind the *next* character would belong to.
    #[must_use]
    pub fn kind(&self) -> RegionKind {
        match self.mode {
            Mode::Code => {
                if matches!(self.nesting.last(), Some(Nest::Template)) {
                    RegionKind::Template
                } else {
                    RegionKind::Code
                }
            }
            Mode::Single | Mode::Double => RegionKind::String,
            Mode::Template => RegionKind::Template,
            Mode::LineComment => RegionKind::LineComment,
            Mode::BlockComment => RegionKind::BlockComment,
            Mode::Regex | Mode::RegexClass => RegionKind::Regex,
        }
    }

    /// True when the next character is plain code (not string/comment/regex
    /// and not template literal text).
    #[must_use]
    pub fn in_code(&self) -> bool {
        self.kind() == RegionKind::Code
    }

    /// Number of unclosed code brackets of any kind.
    #[must_use]
    pub fn bracket_depth(&self) -> usize {
        self.brackets.len()
    }

    /// Number of unclosed `{` braces in code (template-expression braces
    /// excluded). Top-level declarations sit at brace depth zero.
    #[must_use]
    pub fn brace_depth(&self) -> usize {
        self.brackets.iter().filter(|&&b| b == '{').count()
    }

    /// True when a closing bracket never matched an opener.
    #[must_use]
    pub fn has_mismatch(&self) -> bool {
        self.mismatched
    }

    /// True when the scanner is inside an unterminated string literal.
    #[must_use]
    pub fn open_string(&self) -> bool {
        matches!(self.mode, Mode::Single | Mode::Double)
    }

    /// True when the scanner is inside an unterminated template literal.
    #[must_use]
    pub fn open_template(&self) -> bool {
        self.mode == Mode::Template || self.nesting.iter().any(|n| matches!(n, Nest::Template))
    }

    /// True when the scanner is inside an unterminated block comment.
    #[must_use]
    pub fn open_block_comment(&self) -> bool {
        self.mode == Mode::BlockComment
    }

    /// True when the scanner is inside an unterminated regex literal.
    #[must_use]
    pub fn open_regex(&self) -> bool {
        matches!(self.mode, Mode::Regex | Mode::RegexClass)
    }

    /// Number of open template expressions (`${` without its closing `}`).
    #[must_use]
    pub fn template_expr_depth(&self) -> usize {
        self.nesting.iter().filter(|n| matches!(n, Nest::TemplateExpr { .. })).count()
    }

    /// Advances the scanner by one character. `next` is the following
    /// character, needed to recognize two-character openers (`//`, `/*`).
    pub fn feed(&mut self, ch: char, next: Option<char>) {
        match self.mode {
            Mode::Code => self.feed_code(ch, next),
            Mode::Single => self.feed_string(ch, '\''),
            Mode::Double => self.feed_string(ch, '"'),
            Mode::Template => self.feed_template(ch, next),
            Mode::LineComment => {
                if ch == '\n' {
                    self.mode = Mode::Code;
                }
            }
            Mode::BlockComment => {
                if self.fresh_block_comment {
                    // The `*` of the `/*` opener is not part of a closer.
                    self.fresh_block_comment = false;
                    self.escaped = false;
                } else if ch == '/' && self.escaped {
                    self.mode = Mode::Code;
                    self.escaped = false;
                } else {
                    self.escaped = ch == '*';
                }
            }
            Mode::Regex => self.feed_regex(ch),
            Mode::RegexClass => {
                if self.escaped {
                    self.escaped = false;
                } else if ch == '\\' {
                    self.escaped = true;
                } else if ch == ']' {
                    self.mode = Mode::Regex;
                }
            }
        }
    }

    fn feed_code(&mut self, ch: char, next: Option<char>) {
        // Track identifier tokens for regex/keyword context decisions.
        if is_ident_part(ch) {
            self.word.push(ch);
        } else if !self.word.is_empty() {
            self.last_word = std::mem::take(&mut self.word);
        }

        match ch {
            '\'' => self.enter(Mode::Single),
            '"' => self.enter(Mode::Double),
            '`' => {
                self.nesting.push(Nest::Template);
                self.mode = Mode::Template;
                self.last_significant = Some(ch);
            }
            '/' => match next {
                Some('/') => self.mode = Mode::LineComment,
                Some('*') => {
                    self.mode = Mode::BlockComment;
                    self.escaped = false;
                    self.fresh_block_comment = true;
                }
                _ => {
                    if self.regex_can_start() {
                        self.enter(Mode::Regex);
                    } else {
                        self.last_significant = Some(ch);
                    }
                }
            },
            '{' => {
                if let Some(Nest::TemplateExpr { brace_depth }) = self.nesting.last_mut() {
                    *brace_depth += 1;
                }
                self.brackets.push('{');
                self.last_significant = Some(ch);
            }
            '}' => {
                match self.nesting.last_mut() {
                    Some(Nest::TemplateExpr { brace_depth }) if *brace_depth == 0 => {
                        self.nesting.pop();
                        self.mode = Mode::Template;
                        return;
                    }
                    Some(Nest::TemplateExpr { brace_depth }) => *brace_depth -= 1,
                    _ => {}
                }
                self.close_bracket('{');
                self.last_significant = Some(ch);
            }
            '(' | '[' => {
                self.brackets.push(ch);
                self.last_significant = Some(ch);
            }
            ')' => {
                self.close_bracket('(');
                self.last_significant = Some(ch);
            }
            ']' => {
                self.close_bracket('[');
                self.last_significant = Some(ch);
            }
            c if c.is_whitespace() => {}
            c => self.last_significant = Some(c),
        }
    }

    fn enter(&mut self, mode: Mode) {
        self.mode = mode;
        self.escaped = false;
        // A literal is a value: after it closes, `/` means division.
        self.last_significant = Some('\u{0}');
        self.last_word.clear();
    }

    fn feed_string(&mut self, ch: char, quote: char) {
        if self.escaped {
            self.escaped = false;
        } else if ch == '\\' {
            self.escaped = true;
        } else if ch == quote || ch == '\n' {
            // An unescaped newline ends scanning of a broken string; the
            // classifier reports the open state before this point.
            self.mode = Mode::Code;
        }
    }

    fn feed_template(&mut self, ch: char, next: Option<char>) {
        if self.pending_expr {
            // `ch` is the `{` of a `${` opener; it belongs to the template
            // expression marker, not to code brackets.
            debug_assert_eq!(ch, '{');
            self.pending_expr = false;
            self.nesting.push(Nest::TemplateExpr { brace_depth: 0 });
            self.mode = Mode::Code;
            self.last_significant = Some('{');
            return;
        }
        if self.escaped {
            self.escaped = false;
        } else if ch == '\\' {
            self.escaped = true;
        } else if ch == '`' {
            debug_assert!(matches!(self.nesting.last(), Some(Nest::Template)));
            self.nesting.pop();
            self.mode = Mode::Code;
        } else if ch == '$' && next == Some('{') {
            self.pending_expr = true;
        }
    }

    fn feed_regex(&mut self, ch: char) {
        if self.escaped {
            self.escaped = false;
        } else if ch == '\\' {
            self.escaped = true;
        } else if ch == '[' {
            self.mode = Mode::RegexClass;
        } else if ch == '/' || ch == '\n' {
            self.mode = Mode::Code;
        }
    }

    fn close_bracket(&mut self, open: char) {
        match self.brackets.pop() {
            Some(b) if b == open => {}
            _ => self.mismatched = true,
        }
    }

    /// Whether a `/` in the current position starts a regex literal.
    ///
    /// Heuristic from the preceding significant character: after a value
    /// (identifier, number, `)`, `]`, string) it is division; after an
    /// operator, opener, separator, or a continuation keyword it is a regex.
    fn regex_can_start(&self) -> bool {
        let word = if self.word.is_empty() { &self.last_word } else { &self.word };
        if REGEX_PRECEDING_KEYWORDS.contains(&word.as_str()) {
            // Only when the keyword is the immediately preceding token.
            if let Some(c) = self.last_significant {
                if is_ident_part(c) {
                    return true;
                }
            }
        }
        match self.last_significant {
            None => true,
            Some(c) => matches!(
                c,
                '(' | '[' | '{' | '}' | ';' | ',' | '=' | ':' | '?' | '!' | '&' | '|' | '+' | '-' | '*' | '/' | '%'
                    | '^' | '~' | '<' | '>'
            ),
        }
    }
}

/// Scans a whole source string and returns its final state.
#[must_use]
pub fn final_state(source: &str) -> ScanState {
    let mut state = ScanState::new();
    let mut chars = source.chars().peekable();
    while let Some(ch) = chars.next() {
        state.feed(ch, chars.peek().copied());
    }
    // Flush a trailing identifier token.
    if !state.word.is_empty() {
        state.last_word = std::mem::take(&mut state.word);
    }
    state
}

/// Returns the lexical region kind at `offset` (byte index) in `source`.
///
/// Offsets past the end report the end-of-input state.
#[must_use]
pub fn region_at(source: &str, offset: usize) -> RegionKind {
    let mut state = ScanState::new();
    let mut chars = source.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if idx >= offset {
            return state.kind();
        }
        let next = chars.peek().map(|&(_, c)| c);
        state.feed(ch, next);
    }
    state.kind()
}

/// Scans a whole source string into contiguous regions covering every byte.
#[must_use]
pub fn scan_regions(source: &str) -> Vec<Region> {
    let mut regions: Vec<Region> = Vec::new();
    let mut state = ScanState::new();
    let mut chars = source.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        let kind = state.kind();
        match regions.last_mut() {
            Some(last) if last.kind == kind => last.end = idx + ch.len_utf8(),
            _ => regions.push(Region {
                kind,
                start: idx,
                end: idx + ch.len_utf8(),
            }),
        }
        let next = chars.peek().map(|&(_, c)| c);
        state.feed(ch, next);
    }
    regions
}

/// Replaces the contents of non-code regions with spaces, preserving byte
/// offsets and line structure. Closing string/template/regex delimiters are
/// kept so statement shapes survive; comment text and literal interiors are
/// blanked. One space per UTF-8 byte keeps indices into the original text
/// valid on the blanked copy.
#[must_use]
pub fn blank_noncode(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut state = ScanState::new();
    let mut chars = source.chars().peekable();
    while let Some(ch) = chars.next() {
        let kind_before = state.kind();
        let next = chars.peek().copied();
        state.feed(ch, next);
        let kind_after = state.kind();
        let keep = match kind_before {
            RegionKind::Code => true,
            RegionKind::String | RegionKind::Template | RegionKind::Regex => {
                // `{` covers the `${` expression opener, so brackets stay
                // balanced in the blanked copy.
                matches!(ch, '\'' | '"' | '`' | '/' | '{') && kind_after != kind_before
            }
            RegionKind::LineComment | RegionKind::BlockComment => false,
        };
        if keep || ch == '\n' {
            out.push(ch);
        } else {
            for _ in 0..ch.len_utf8() {
                out.push(' ');
            }
        }
    }
    out
}

/// True for characters that can start a JavaScript identifier.
#[must_use]
pub fn is_ident_start(ch: char) -> bool {
    ch == '$' || ch == '_' || unicode_ident::is_xid_start(ch)
}

/// True for characters that can continue a JavaScript identifier.
#[must_use]
pub fn is_ident_part(ch: char) -> bool {
    ch == '$' || ch == '_' || unicode_ident::is_xid_continue(ch)
}

/// Converts a UTF-16 code-unit offset (the editor convention) into a byte
/// offset into `source`. Clamps to the end of the text.
#[must_use]
pub fn utf16_to_byte_offset(source: &str, utf16_offset: usize) -> usize {
    let mut units = 0usize;
    for (idx, ch) in source.char_indices() {
        if units >= utf16_offset {
            return idx;
        }
        units += ch.len_utf16();
    }
    source.len()
}
