//! Tokenizer for Tern source text.
//!
//! Newlines are tokens: they separate statements and top-level items the
//! same way `;` does, so the parser sees them explicitly. String literals
//! are byte strings — `\xHH` escapes may produce bytes that are not valid
//! UTF-8, and `\u`/`\U` escapes expand to the UTF-8 encoding of the code
//! point.

use anyhow::{bail, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(Vec<u8>),

    // keywords
    Fn,
    Var,
    Type,
    Struct,
    Union,
    Ns,
    If,
    Else,
    For,
    Break,
    Continue,
    Return,
    Pub,
    Extern,
    Variadic,
    Cast,

    // punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBrack,
    RBrack,
    Comma,
    Dot,
    Semi,
    Newline,

    // operators
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pipe,
    Caret,
    Amp,
    Shl,
    Shr,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    PipeEq,
    CaretEq,
    AmpEq,
    ShlEq,
    ShrEq,
    EqEq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    AndAnd,
    OrOr,
    Not,
    PlusPlus,
    MinusMinus,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
    pub col: usize,
}

fn keyword(ident: &str) -> Option<Tok> {
    Some(match ident {
        "fn" => Tok::Fn,
        "var" => Tok::Var,
        "type" => Tok::Type,
        "struct" => Tok::Struct,
        "union" => Tok::Union,
        "ns" => Tok::Ns,
        "if" => Tok::If,
        "else" => Tok::Else,
        "for" => Tok::For,
        "break" => Tok::Break,
        "continue" => Tok::Continue,
        "return" => Tok::Return,
        "pub" => Tok::Pub,
        "extern" => Tok::Extern,
        "variadic" => Tok::Variadic,
        "cast" => Tok::Cast,
        _ => return None,
    })
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

/// Tokenize a whole source text. The returned stream always ends with a
/// single `Eof` token.
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut lx = Lexer {
        chars: src.chars().collect(),
        pos: 0,
        line: 1,
        col: 1,
    };
    let mut out = Vec::new();
    loop {
        let tok = lx.next_token()?;
        let eof = tok.tok == Tok::Eof;
        out.push(tok);
        if eof {
            return Ok(out);
        }
    }
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn token(&self, tok: Tok, line: usize, col: usize) -> Token {
        Token { tok, line, col }
    }

    fn next_token(&mut self) -> Result<Token> {
        // Skip horizontal whitespace and comments; newlines are tokens.
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.bump();
                }
                Some('/') if self.peek2() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }

        let (line, col) = (self.line, self.col);
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(self.token(Tok::Eof, line, col)),
        };

        if c == '\n' {
            self.bump();
            return Ok(self.token(Tok::Newline, line, col));
        }

        if c.is_ascii_digit() {
            return self.number(line, col);
        }
        if c.is_alphabetic() || c == '_' {
            let mut s = String::new();
            while let Some(c) = self.peek() {
                if c.is_alphanumeric() || c == '_' {
                    s.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
            let tok = keyword(&s).unwrap_or(Tok::Ident(s));
            return Ok(self.token(tok, line, col));
        }
        if c == '"' {
            return self.string(line, col);
        }
        if c == '\'' {
            return self.rune(line, col);
        }

        self.bump();
        let two = |lx: &mut Lexer, tok| {
            lx.bump();
            tok
        };
        let tok = match c {
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            '{' => Tok::LBrace,
            '}' => Tok::RBrace,
            '[' => Tok::LBrack,
            ']' => Tok::RBrack,
            ',' => Tok::Comma,
            '.' => Tok::Dot,
            ';' => Tok::Semi,
            '+' => match self.peek() {
                Some('=') => two(self, Tok::PlusEq),
                Some('+') => two(self, Tok::PlusPlus),
                _ => Tok::Plus,
            },
            '-' => match self.peek() {
                Some('=') => two(self, Tok::MinusEq),
                Some('-') => two(self, Tok::MinusMinus),
                _ => Tok::Minus,
            },
            '*' => match self.peek() {
                Some('=') => two(self, Tok::StarEq),
                _ => Tok::Star,
            },
            '/' => match self.peek() {
                Some('=') => two(self, Tok::SlashEq),
                _ => Tok::Slash,
            },
            '%' => match self.peek() {
                Some('=') => two(self, Tok::PercentEq),
                _ => Tok::Percent,
            },
            '|' => match self.peek() {
                Some('=') => two(self, Tok::PipeEq),
                Some('|') => two(self, Tok::OrOr),
                _ => Tok::Pipe,
            },
            '^' => match self.peek() {
                Some('=') => two(self, Tok::CaretEq),
                _ => Tok::Caret,
            },
            '&' => match self.peek() {
                Some('=') => two(self, Tok::AmpEq),
                Some('&') => two(self, Tok::AndAnd),
                _ => Tok::Amp,
            },
            '<' => match self.peek() {
                Some('<') => {
                    self.bump();
                    match self.peek() {
                        Some('=') => two(self, Tok::ShlEq),
                        _ => Tok::Shl,
                    }
                }
                Some('=') => two(self, Tok::Le),
                _ => Tok::Lt,
            },
            '>' => match self.peek() {
                Some('>') => {
                    self.bump();
                    match self.peek() {
                        Some('=') => two(self, Tok::ShrEq),
                        _ => Tok::Shr,
                    }
                }
                Some('=') => two(self, Tok::Ge),
                _ => Tok::Gt,
            },
            '=' => match self.peek() {
                Some('=') => two(self, Tok::EqEq),
                _ => Tok::Assign,
            },
            '!' => match self.peek() {
                Some('=') => two(self, Tok::Ne),
                _ => Tok::Not,
            },
            _ => bail!("{}:{}: unexpected character {:?}", line, col, c),
        };
        Ok(self.token(tok, line, col))
    }

    fn number(&mut self, line: usize, col: usize) -> Result<Token> {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if self.peek() == Some('.') && self.peek2().is_some_and(|c| c.is_ascii_digit()) {
            s.push('.');
            self.bump();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    s.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
            let f: f64 = s
                .parse()
                .map_err(|_| anyhow::anyhow!("{}:{}: invalid float literal", line, col))?;
            return Ok(self.token(Tok::Float(f), line, col));
        }
        let n: i64 = s
            .parse()
            .map_err(|_| anyhow::anyhow!("{}:{}: integer literal out of range", line, col))?;
        Ok(self.token(Tok::Int(n), line, col))
    }

    fn hex_digits(&mut self, n: usize, line: usize, col: usize) -> Result<u32> {
        let mut v: u32 = 0;
        for _ in 0..n {
            let c = self
                .bump()
                .ok_or_else(|| anyhow::anyhow!("{}:{}: unterminated escape", line, col))?;
            let d = c
                .to_digit(16)
                .ok_or_else(|| anyhow::anyhow!("{}:{}: invalid hex digit {:?}", line, col, c))?;
            v = v * 16 + d;
        }
        Ok(v)
    }

    /// Decode one escape sequence after the backslash has been consumed,
    /// appending its bytes to `out`.
    fn escape(&mut self, out: &mut Vec<u8>, line: usize, col: usize) -> Result<()> {
        let c = self
            .bump()
            .ok_or_else(|| anyhow::anyhow!("{}:{}: unterminated escape", line, col))?;
        match c {
            'e' => out.push(0x1b),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            '\\' => out.push(b'\\'),
            '"' => out.push(b'"'),
            '\'' => out.push(b'\''),
            'x' => out.push(self.hex_digits(2, line, col)? as u8),
            'u' => {
                let v = self.hex_digits(4, line, col)?;
                push_utf8(out, v, line, col)?;
            }
            'U' => {
                let v = self.hex_digits(8, line, col)?;
                push_utf8(out, v, line, col)?;
            }
            _ => bail!("{}:{}: unknown escape sequence \\{}", line, col, c),
        }
        Ok(())
    }

    fn string(&mut self, line: usize, col: usize) -> Result<Token> {
        self.bump(); // opening quote
        let mut bytes = Vec::new();
        loop {
            let c = self
                .bump()
                .ok_or_else(|| anyhow::anyhow!("{}:{}: unterminated string literal", line, col))?;
            match c {
                '"' => break,
                '\\' => self.escape(&mut bytes, line, col)?,
                '\n' => bail!("{}:{}: unterminated string literal", line, col),
                _ => {
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
        Ok(self.token(Tok::Str(bytes), line, col))
    }

    fn rune(&mut self, line: usize, col: usize) -> Result<Token> {
        self.bump(); // opening quote
        let c = self
            .bump()
            .ok_or_else(|| anyhow::anyhow!("{}:{}: unterminated rune literal", line, col))?;
        let value: i64 = if c == '\\' {
            let mut bytes = Vec::new();
            self.escape(&mut bytes, line, col)?;
            match bytes.len() {
                1 => bytes[0] as i64,
                _ => {
                    // \u/\U escapes denote a code point, not its encoding.
                    let s = String::from_utf8(bytes)
                        .map_err(|_| anyhow::anyhow!("{}:{}: invalid rune literal", line, col))?;
                    s.chars().next().unwrap() as i64
                }
            }
        } else if c == '\'' {
            bail!("{}:{}: empty rune literal", line, col);
        } else {
            c as i64
        };
        if self.bump() != Some('\'') {
            bail!("{}:{}: unterminated rune literal", line, col);
        }
        Ok(self.token(Tok::Int(value), line, col))
    }
}

fn push_utf8(out: &mut Vec<u8>, v: u32, line: usize, col: usize) -> Result<()> {
    let c = char::from_u32(v)
        .ok_or_else(|| anyhow::anyhow!("{}:{}: invalid code point in escape", line, col))?;
    let mut buf = [0u8; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    Ok(())
}
