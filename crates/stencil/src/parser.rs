use serde_json::{Number, Value};

use crate::{
    funcs::Func,
    template::{Branch, Expr, ExprKind, Node, Pipeline, Span},
    ParseError, ParseErrorKind,
};

const LEFT: &str = "{{";
const RIGHT: &str = "}}";
const TRIM_RIGHT: &str = "-}}";

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[derive(Debug)]
struct Failure {
    span: Span,
    kind: ParseErrorKind,
}

impl Failure {
    fn new(span: Span, kind: ParseErrorKind) -> Self {
        Self { span, kind }
    }
}

pub(crate) fn parse(name: &str, src: &str) -> Result<Vec<Node>, ParseError> {
    scan(src)
        .and_then(|pieces| Builder::new(pieces).document())
        .map_err(|failure| ParseError::new(name, src, failure.span, failure.kind))
}

/// Text between actions, or one parsed action.
#[derive(Debug)]
enum Piece {
    Text(String),
    Action { span: Span, action: Action },
}

#[derive(Debug)]
enum Action {
    Pipeline(Pipeline),
    If(Pipeline),
    ElseIf(Pipeline),
    Else,
    End,
    Range(Pipeline),
    With(Pipeline),
}

/// Split the source into text and actions, applying trim markers and
/// dropping comments.
fn scan(src: &str) -> Result<Vec<Piece>, Failure> {
    let mut pieces = Vec::new();
    let mut pos = 0;
    let mut trim_next = false;

    while pos < src.len() {
        let rest = &src[pos..];
        let Some(open) = rest.find(LEFT) else {
            push_text(&mut pieces, rest, trim_next, false);
            break;
        };

        let start = pos + open;
        let mut body = start + LEFT.len();
        let trim_left = src[body..].starts_with('-') && src[body + 1..].starts_with(is_space);
        if trim_left {
            body += 2;
        }
        push_text(&mut pieces, &rest[..open], trim_next, trim_left);

        if src[body..].starts_with("/*") {
            let (end, trim) = comment(src, start, body)?;
            pos = end;
            trim_next = trim;
            continue;
        }

        let (tokens, close) = Lexer::new(src, start, body).tokens()?;
        let span = Span::new(start, close.end);
        let action = ActionParser::new(src, &tokens, span).action()?;
        pieces.push(Piece::Action { span, action });

        pos = close.end;
        trim_next = close.trim;
    }

    Ok(pieces)
}

fn push_text(pieces: &mut Vec<Piece>, mut text: &str, trim_start: bool, trim_end: bool) {
    if trim_start {
        text = text.trim_start_matches(is_space);
    }
    if trim_end {
        text = text.trim_end_matches(is_space);
    }
    if !text.is_empty() {
        pieces.push(Piece::Text(text.to_owned()));
    }
}

/// Skip a `/* ... */` comment that must fill its whole action.
///
/// Returns the end of the action and whether it carries a right trim marker.
fn comment(src: &str, start: usize, body: usize) -> Result<(usize, bool), Failure> {
    let Some(close) = src[body + 2..].find("*/") else {
        return Err(Failure::new(
            Span::new(start, src.len()),
            ParseErrorKind::UnclosedComment,
        ));
    };
    let after = body + 2 + close + 2;
    let rest = &src[after..];

    if rest.starts_with(RIGHT) {
        Ok((after + RIGHT.len(), false))
    } else if rest.starts_with(is_space) && rest[1..].starts_with(TRIM_RIGHT) {
        Ok((after + 1 + TRIM_RIGHT.len(), true))
    } else {
        Err(Failure::new(
            Span::new(start, after),
            ParseErrorKind::CommentNotAlone,
        ))
    }
}

#[derive(Clone, Debug, PartialEq)]
enum TokenKind {
    Dot,
    Field(String),
    Var(String),
    Ident(String),
    Str(String),
    Number(Number),
    Pipe,
    LParen,
    RParen,
}

#[derive(Clone, Debug)]
struct Token {
    kind: TokenKind,
    span: Span,
}

struct Close {
    end: usize,
    trim: bool,
}

struct Lexer<'s> {
    src: &'s str,
    action_start: usize,
    pos: usize,
}

impl<'s> Lexer<'s> {
    fn new(src: &'s str, action_start: usize, pos: usize) -> Self {
        Self {
            src,
            action_start,
            pos,
        }
    }

    fn tokens(mut self) -> Result<(Vec<Token>, Close), Failure> {
        let mut tokens = Vec::new();

        let src = self.src;
        loop {
            let rest = &src[self.pos..];
            let Some(c) = rest.chars().next() else {
                return Err(Failure::new(
                    Span::new(self.action_start, self.src.len()),
                    ParseErrorKind::UnclosedAction,
                ));
            };

            if rest.starts_with(RIGHT) {
                let end = self.pos + RIGHT.len();
                return Ok((tokens, Close { end, trim: false }));
            }
            if rest.starts_with(TRIM_RIGHT) && src[..self.pos].ends_with(is_space) {
                let end = self.pos + TRIM_RIGHT.len();
                return Ok((tokens, Close { end, trim: true }));
            }

            let start = self.pos;
            let kind = match c {
                c if is_space(c) => {
                    self.pos += c.len_utf8();
                    continue;
                }
                '|' => self.single(TokenKind::Pipe),
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '"' => self.quoted()?,
                '`' => self.raw_quoted()?,
                '.' if rest[1..].starts_with(|c: char| c.is_ascii_digit()) => self.number()?,
                '.' => {
                    self.pos += 1;
                    let name = self.word();
                    if name.is_empty() {
                        TokenKind::Dot
                    } else {
                        TokenKind::Field(name.to_owned())
                    }
                }
                '$' => {
                    self.pos += 1;
                    TokenKind::Var(self.word().to_owned())
                }
                '0'..='9' => self.number()?,
                '-' | '+' if rest[1..].starts_with(|c: char| c.is_ascii_digit() || c == '.') => {
                    self.number()?
                }
                c if is_ident(c) => TokenKind::Ident(self.word().to_owned()),
                other => {
                    return Err(Failure::new(
                        Span::new(start, start + other.len_utf8()),
                        ParseErrorKind::UnexpectedChar(other),
                    ))
                }
            };

            tokens.push(Token {
                kind,
                span: Span::new(start, self.pos),
            });
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn word(&mut self) -> &'s str {
        let src = self.src;
        let rest = &src[self.pos..];
        let len = rest.find(|c: char| !is_ident(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn quoted(&mut self) -> Result<TokenKind, Failure> {
        let start = self.pos;
        let mut out = String::new();
        let mut chars = self.src[start + 1..].char_indices();

        let unterminated = || {
            Failure::new(
                Span::new(start, start + 1),
                ParseErrorKind::UnterminatedString,
            )
        };

        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos = start + 1 + i + 1;
                    return Ok(TokenKind::Str(out));
                }
                '\n' => return Err(unterminated()),
                '\\' => {
                    let (j, escaped) = chars.next().ok_or_else(unterminated)?;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '\\' => '\\',
                        '"' => '"',
                        other => {
                            let at = start + 1 + j;
                            return Err(Failure::new(
                                Span::new(at - 1, at + other.len_utf8()),
                                ParseErrorKind::UnknownEscape(other),
                            ));
                        }
                    });
                }
                c => out.push(c),
            }
        }

        Err(unterminated())
    }

    fn raw_quoted(&mut self) -> Result<TokenKind, Failure> {
        let start = self.pos;
        let Some(len) = self.src[start + 1..].find('`') else {
            return Err(Failure::new(
                Span::new(start, start + 1),
                ParseErrorKind::UnterminatedRawString,
            ));
        };
        self.pos = start + 1 + len + 1;
        Ok(TokenKind::Str(self.src[start + 1..start + 1 + len].to_owned()))
    }

    fn number(&mut self) -> Result<TokenKind, Failure> {
        let start = self.pos;
        let rest = &self.src[start..];
        let mut len = 0;
        let mut prev = None;
        for c in rest.chars() {
            let sign_ok = len == 0 || matches!(prev, Some('e' | 'E'));
            if c.is_ascii_alphanumeric() || c == '.' || ((c == '-' || c == '+') && sign_ok) {
                len += c.len_utf8();
                prev = Some(c);
            } else {
                break;
            }
        }
        self.pos += len;

        let text = &rest[..len];
        parse_number(text).map(TokenKind::Number).ok_or_else(|| {
            Failure::new(
                Span::new(start, start + len),
                ParseErrorKind::BadNumber(text.to_owned()),
            )
        })
    }
}

fn parse_number(text: &str) -> Option<Number> {
    let digits = text.strip_prefix('+').unwrap_or(text);
    if digits.contains(['.', 'e', 'E']) {
        digits.parse::<f64>().ok().and_then(Number::from_f64)
    } else if let Ok(n) = digits.parse::<i64>() {
        Some(n.into())
    } else {
        digits.parse::<u64>().ok().map(Number::from)
    }
}

/// Recursive descent over the tokens of a single action.
struct ActionParser<'t> {
    src: &'t str,
    tokens: &'t [Token],
    idx: usize,
    span: Span,
}

impl<'t> ActionParser<'t> {
    fn new(src: &'t str, tokens: &'t [Token], span: Span) -> Self {
        Self {
            src,
            tokens,
            idx: 0,
            span,
        }
    }

    fn action(mut self) -> Result<Action, Failure> {
        let tokens = self.tokens;
        let keyword = match tokens.first() {
            Some(Token {
                kind: TokenKind::Ident(word),
                ..
            }) => word.as_str(),
            _ => "",
        };

        let action = match keyword {
            "if" => {
                self.idx += 1;
                Action::If(self.pipeline("if")?)
            }
            "range" => {
                self.idx += 1;
                Action::Range(self.pipeline("range")?)
            }
            "with" => {
                self.idx += 1;
                Action::With(self.pipeline("with")?)
            }
            "else" => {
                self.idx += 1;
                match self.peek().map(|t| &t.kind) {
                    None => Action::Else,
                    Some(TokenKind::Ident(word)) if word == "if" => {
                        self.idx += 1;
                        Action::ElseIf(self.pipeline("if")?)
                    }
                    Some(_) => return Err(self.unexpected("else")),
                }
            }
            "end" => {
                self.idx += 1;
                Action::End
            }
            "define" | "template" | "block" | "break" | "continue" => {
                return Err(Failure::new(
                    tokens[0].span,
                    ParseErrorKind::Unsupported(keyword.to_owned()),
                ))
            }
            _ => Action::Pipeline(self.pipeline("command")?),
        };

        if self.peek().is_some() {
            let context = match action {
                Action::End => "end",
                _ => "command",
            };
            return Err(self.unexpected(context));
        }
        Ok(action)
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.idx)
    }

    fn unexpected(&self, context: &'static str) -> Failure {
        match self.peek() {
            Some(token) => Failure::new(
                token.span,
                ParseErrorKind::UnexpectedToken(token.span.snippet(self.src), context),
            ),
            None => Failure::new(self.span, ParseErrorKind::MissingValue(context)),
        }
    }

    /// The span to blame when something is missing at the current position.
    fn here(&self) -> Span {
        self.peek().map_or(self.span, |token| token.span)
    }

    fn pipeline(&mut self, context: &'static str) -> Result<Pipeline, Failure> {
        let mut cmds: Vec<Expr> = Vec::new();

        loop {
            let Some(cmd) = self.command()? else {
                return Err(Failure::new(self.here(), ParseErrorKind::MissingValue(context)));
            };
            if !cmds.is_empty() && !matches!(cmd.kind, ExprKind::Call(..)) {
                return Err(Failure::new(
                    cmd.span,
                    ParseErrorKind::NonFunctionArgs(cmd.span.snippet(self.src)),
                ));
            }
            cmds.push(cmd);

            match self.peek() {
                Some(Token {
                    kind: TokenKind::Pipe,
                    ..
                }) => self.idx += 1,
                _ => break,
            }
        }

        let span = cmds[0].span.to(cmds[cmds.len() - 1].span);
        Ok(Pipeline { span, cmds })
    }

    fn command(&mut self) -> Result<Option<Expr>, Failure> {
        let Some(mut head) = self.operand()? else {
            return Ok(None);
        };

        let mut args = Vec::new();
        while let Some(arg) = self.operand()? {
            args.push(arg);
        }

        if let Some(last) = args.last() {
            match &mut head.kind {
                ExprKind::Call(_, head_args) if head_args.is_empty() => {
                    head.span = head.span.to(last.span);
                    *head_args = args;
                }
                _ => {
                    return Err(Failure::new(
                        head.span,
                        ParseErrorKind::NonFunctionArgs(head.span.snippet(self.src)),
                    ))
                }
            }
        }

        Ok(Some(head))
    }

    fn operand(&mut self) -> Result<Option<Expr>, Failure> {
        let Some(token) = self.peek() else {
            return Ok(None);
        };

        let kind = match &token.kind {
            TokenKind::Pipe | TokenKind::RParen => return Ok(None),
            TokenKind::LParen => return self.parenthesized().map(Some),
            TokenKind::Dot => ExprKind::Dot,
            TokenKind::Field(name) => ExprKind::Field(
                Box::new(Expr {
                    span: Span::new(token.span.start, token.span.start),
                    kind: ExprKind::Dot,
                }),
                name.clone(),
            ),
            TokenKind::Var(name) if name.is_empty() => ExprKind::Root,
            TokenKind::Var(name) => {
                return Err(Failure::new(
                    token.span,
                    ParseErrorKind::UndefinedVariable(format!("${name}")),
                ))
            }
            TokenKind::Ident(word) => match word.as_str() {
                "true" => ExprKind::Literal(Value::Bool(true)),
                "false" => ExprKind::Literal(Value::Bool(false)),
                "nil" => ExprKind::Literal(Value::Null),
                name => match Func::lookup(name) {
                    Some(func) => ExprKind::Call(func, Vec::new()),
                    None => {
                        return Err(Failure::new(
                            token.span,
                            ParseErrorKind::UndefinedFunction(name.to_owned()),
                        ))
                    }
                },
            },
            TokenKind::Str(s) => ExprKind::Literal(Value::String(s.clone())),
            TokenKind::Number(n) => ExprKind::Literal(Value::Number(n.clone())),
        };
        self.idx += 1;

        let expr = Expr {
            span: token.span,
            kind,
        };
        Ok(Some(self.field_chain(expr)))
    }

    fn parenthesized(&mut self) -> Result<Expr, Failure> {
        let open = self.tokens[self.idx].span;
        self.idx += 1;

        let inner = self.pipeline("parenthesized pipeline")?;
        match self.peek() {
            Some(Token {
                kind: TokenKind::RParen,
                span,
            }) => {
                self.idx += 1;
                let expr = Expr {
                    span: open.to(*span),
                    kind: ExprKind::Pipeline(inner),
                };
                Ok(self.field_chain(expr))
            }
            _ => Err(Failure::new(open, ParseErrorKind::UnclosedParen)),
        }
    }

    /// Attach `.a.b` written directly after a dot, field, `$` or parenthesized
    /// pipeline.
    fn field_chain(&mut self, mut expr: Expr) -> Expr {
        if !matches!(
            expr.kind,
            ExprKind::Dot | ExprKind::Root | ExprKind::Field(..) | ExprKind::Pipeline(_)
        ) {
            return expr;
        }

        while let Some(Token {
            kind: TokenKind::Field(name),
            span,
        }) = self.peek()
        {
            if span.start != expr.span.end {
                break;
            }
            self.idx += 1;
            expr = Expr {
                span: expr.span.to(*span),
                kind: ExprKind::Field(Box::new(expr), name.clone()),
            };
        }
        expr
    }
}

/// Assembles the flat list of pieces into nested control structures.
struct Builder {
    pieces: std::vec::IntoIter<Piece>,
}

/// Why [`Builder::list`] stopped.
enum Stop {
    Eof,
    Else(Span),
    ElseIf(Pipeline, Span),
    End(Span),
}

impl Builder {
    fn new(pieces: Vec<Piece>) -> Self {
        Self {
            pieces: pieces.into_iter(),
        }
    }

    fn document(mut self) -> Result<Vec<Node>, Failure> {
        let (nodes, stop) = self.list()?;
        match stop {
            Stop::Eof => Ok(nodes),
            Stop::Else(span) | Stop::ElseIf(_, span) => Err(Failure::new(
                span,
                ParseErrorKind::UnexpectedKeyword("else"),
            )),
            Stop::End(span) => Err(Failure::new(
                span,
                ParseErrorKind::UnexpectedKeyword("end"),
            )),
        }
    }

    fn list(&mut self) -> Result<(Vec<Node>, Stop), Failure> {
        let mut nodes = Vec::new();

        while let Some(piece) = self.pieces.next() {
            let (span, action) = match piece {
                Piece::Text(text) => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Piece::Action { span, action } => (span, action),
            };

            match action {
                Action::Pipeline(pipeline) => nodes.push(Node::Action(pipeline)),
                Action::If(cond) => nodes.push(self.if_chain(cond, span)?),
                Action::Range(pipeline) => {
                    let (body, otherwise) = self.block(span, "range")?;
                    nodes.push(Node::Range {
                        pipeline,
                        body,
                        otherwise,
                    });
                }
                Action::With(pipeline) => {
                    let (body, otherwise) = self.block(span, "with")?;
                    nodes.push(Node::With {
                        pipeline,
                        body,
                        otherwise,
                    });
                }
                Action::Else => return Ok((nodes, Stop::Else(span))),
                Action::ElseIf(cond) => return Ok((nodes, Stop::ElseIf(cond, span))),
                Action::End => return Ok((nodes, Stop::End(span))),
            }
        }

        Ok((nodes, Stop::Eof))
    }

    /// Body and optional `else` body of a `range` or `with`.
    fn block(
        &mut self,
        open: Span,
        keyword: &'static str,
    ) -> Result<(Vec<Node>, Option<Vec<Node>>), Failure> {
        let (body, stop) = self.list()?;
        match stop {
            Stop::End(_) => Ok((body, None)),
            Stop::Else(_) => Ok((body, Some(self.else_body(open, keyword)?))),
            Stop::ElseIf(_, span) => Err(Failure::new(
                span,
                ParseErrorKind::ExpectedEnd("else if"),
            )),
            Stop::Eof => Err(Failure::new(open, ParseErrorKind::UnclosedBlock(keyword))),
        }
    }

    fn if_chain(&mut self, mut cond: Pipeline, open: Span) -> Result<Node, Failure> {
        let mut branches = Vec::new();

        let otherwise = loop {
            let (body, stop) = self.list()?;
            branches.push(Branch { cond, body });

            match stop {
                Stop::End(_) => break None,
                Stop::ElseIf(next, _) => cond = next,
                Stop::Else(_) => break Some(self.else_body(open, "if")?),
                Stop::Eof => return Err(Failure::new(open, ParseErrorKind::UnclosedBlock("if"))),
            }
        };

        Ok(Node::If {
            branches,
            otherwise,
        })
    }

    fn else_body(&mut self, open: Span, keyword: &'static str) -> Result<Vec<Node>, Failure> {
        let (otherwise, stop) = self.list()?;
        match stop {
            Stop::End(_) => Ok(otherwise),
            Stop::Else(span) | Stop::ElseIf(_, span) => {
                Err(Failure::new(span, ParseErrorKind::ExpectedEnd("else")))
            }
            Stop::Eof => Err(Failure::new(open, ParseErrorKind::UnclosedBlock(keyword))),
        }
    }
}
