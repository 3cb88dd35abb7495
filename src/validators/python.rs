//! Lexical well-formedness check for Python source.
//!
//! This is not a parser. It tokenizes just enough to find strings, comments,
//! brackets and logical lines, then checks the indentation rules the Python
//! tokenizer enforces. Code that passes may still fail to compile; code that
//! fails here would never compile.

/// Where a lexical check failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub line: usize,
    pub detail: String,
}

impl LexError {
    fn new(line: usize, detail: impl Into<String>) -> Self {
        Self {
            line,
            detail: detail.into(),
        }
    }
}

/// Facts collected while lexing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    /// 1-based line numbers where a logical line starts at indentation zero.
    pub top_level_lines: Vec<usize>,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    brackets: Vec<(char, usize)>,
    indents: Vec<usize>,
    indent_char: Option<char>,
    /// Line of the statement ending in `:` whose block has not started yet.
    pending_block: Option<usize>,
    last_significant: Option<char>,
    logical_start: usize,
    outline: Outline,
}

pub fn check(source: &str) -> Result<Outline, LexError> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        brackets: Vec::new(),
        indents: vec![0],
        indent_char: None,
        pending_block: None,
        last_significant: None,
        logical_start: 1,
        outline: Outline::default(),
    };
    lexer.run()?;
    Ok(lexer.outline)
}

impl Lexer {
    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn run(&mut self) -> Result<(), LexError> {
        let mut at_line_start = true;
        while self.pos < self.chars.len() {
            if at_line_start {
                at_line_start = false;
                if !self.start_logical_line()? {
                    // Blank or comment-only line: skip to its newline.
                    self.skip_to_newline();
                    if self.peek(0) == Some('\n') {
                        self.pos += 1;
                        self.line += 1;
                        at_line_start = true;
                    }
                    continue;
                }
            }

            let Some(c) = self.peek(0) else { break };
            match c {
                '#' => self.skip_to_newline(),
                '\'' | '"' => {
                    self.string(c)?;
                    self.last_significant = Some(c);
                }
                '(' | '[' | '{' => {
                    self.brackets.push((c, self.line));
                    self.last_significant = Some(c);
                    self.pos += 1;
                }
                ')' | ']' | '}' => {
                    self.close_bracket(c)?;
                    self.last_significant = Some(c);
                    self.pos += 1;
                }
                '\\' => {
                    let next = if self.peek(1) == Some('\r') {
                        self.peek(2)
                    } else {
                        self.peek(1)
                    };
                    match next {
                        Some('\n') => {}
                        Some(_) => {
                            return Err(LexError::new(
                                self.line,
                                "unexpected character after line continuation character",
                            ))
                        }
                        None => {
                            return Err(LexError::new(
                                self.line,
                                "unexpected end of file after line continuation character",
                            ))
                        }
                    }
                    while self.peek(0) != Some('\n') {
                        self.pos += 1;
                    }
                    self.pos += 1;
                    self.line += 1;
                }
                '\n' => {
                    self.pos += 1;
                    self.line += 1;
                    if self.brackets.is_empty() {
                        self.end_logical_line();
                        at_line_start = true;
                    }
                }
                c if c.is_whitespace() => self.pos += 1,
                c => {
                    self.last_significant = Some(c);
                    self.pos += 1;
                }
            }
        }

        if let Some((open, line)) = self.brackets.last() {
            return Err(LexError::new(*line, format!("'{}' was never closed", open)));
        }
        self.end_logical_line();
        if let Some(line) = self.pending_block {
            return Err(LexError::new(
                line,
                format!("expected an indented block after line {}", line),
            ));
        }
        Ok(())
    }

    /// Measures indentation and applies the block rules.
    ///
    /// Returns false when the line is blank or holds only a comment.
    fn start_logical_line(&mut self) -> Result<bool, LexError> {
        let start = self.pos;
        let mut saw_space = false;
        let mut saw_tab = false;
        while let Some(c) = self.peek(0) {
            match c {
                ' ' => saw_space = true,
                '\t' => saw_tab = true,
                '\x0c' => {}
                _ => break,
            }
            self.pos += 1;
        }
        let width = self.pos - start;

        match self.peek(0) {
            None | Some('\n') | Some('#') => return Ok(false),
            Some('\r') if matches!(self.peek(1), Some('\n') | None) => return Ok(false),
            _ => {}
        }

        if saw_space && saw_tab {
            return Err(LexError::new(
                self.line,
                "inconsistent use of tabs and spaces in indentation",
            ));
        }
        if width > 0 {
            let used = if saw_tab { '\t' } else { ' ' };
            match self.indent_char {
                Some(existing) if existing != used => {
                    return Err(LexError::new(
                        self.line,
                        "inconsistent use of tabs and spaces in indentation",
                    ));
                }
                _ => self.indent_char = Some(used),
            }
        }

        let current = self.indents.last().copied().unwrap_or(0);
        if let Some(opener) = self.pending_block.take() {
            if width <= current {
                return Err(LexError::new(
                    self.line,
                    format!("expected an indented block after line {}", opener),
                ));
            }
            self.indents.push(width);
        } else if width > current {
            return Err(LexError::new(self.line, "unexpected indent"));
        } else if width < current {
            while self.indents.last().is_some_and(|&top| top > width) {
                self.indents.pop();
            }
            if self.indents.last().copied().unwrap_or(0) != width {
                return Err(LexError::new(
                    self.line,
                    "unindent does not match any outer indentation level",
                ));
            }
        }

        self.logical_start = self.line;
        if width == 0 {
            self.outline.top_level_lines.push(self.line);
        }
        Ok(true)
    }

    fn end_logical_line(&mut self) {
        if self.last_significant == Some(':') {
            self.pending_block = Some(self.logical_start);
        }
        self.last_significant = None;
    }

    fn skip_to_newline(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn close_bracket(&mut self, close: char) -> Result<(), LexError> {
        let expected_open = match close {
            ')' => '(',
            ']' => '[',
            _ => '{',
        };
        match self.brackets.pop() {
            Some((open, _)) if open == expected_open => Ok(()),
            Some((open, line)) if line == self.line => Err(LexError::new(
                self.line,
                format!("closing '{}' does not match opening '{}'", close, open),
            )),
            Some((open, line)) => Err(LexError::new(
                self.line,
                format!(
                    "closing '{}' does not match opening '{}' on line {}",
                    close, open, line
                ),
            )),
            None => Err(LexError::new(self.line, format!("unmatched '{}'", close))),
        }
    }

    /// Consumes a string literal starting at the current quote.
    fn string(&mut self, quote: char) -> Result<(), LexError> {
        let start_line = self.line;
        let triple = self.peek(1) == Some(quote) && self.peek(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        loop {
            let Some(c) = self.peek(0) else {
                let detail = if triple {
                    "unterminated triple-quoted string literal"
                } else {
                    "unterminated string literal"
                };
                return Err(LexError::new(start_line, detail));
            };
            match c {
                '\\' => {
                    if self.peek(1) == Some('\r') && self.peek(2) == Some('\n') {
                        self.line += 1;
                        self.pos += 3;
                    } else {
                        if self.peek(1) == Some('\n') {
                            self.line += 1;
                        }
                        self.pos += 2;
                    }
                }
                '\n' if !triple => {
                    return Err(LexError::new(start_line, "unterminated string literal"));
                }
                '\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                c if c == quote => {
                    if !triple {
                        self.pos += 1;
                        return Ok(());
                    }
                    if self.peek(1) == Some(quote) && self.peek(2) == Some(quote) {
                        self.pos += 3;
                        return Ok(());
                    }
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
    }
}
