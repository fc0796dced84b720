use logos::Logos;
use lox_common::error::{ErrorS, SyntaxError};
use lox_common::types::Spanned;

/// Splits source text into tokens, with byte spans.
///
/// Invalid input does not end the stream. A run of unrecognized characters
/// is reported as one error and lexing resumes with the next valid token.
pub struct Lexer<'a> {
    inner: logos::Lexer<'a, Token>,
    pending: Option<Spanned<Token>>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { inner: Token::lexer(source), pending: None }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Spanned<Token>, ErrorS>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(token) = self.pending.take() {
            return Some(Ok(token));
        }

        let token = self.inner.next()?;
        let mut span = self.inner.span();
        if token != Token::Error {
            return Some(Ok((token, span)));
        }

        // A quote that never closes swallows the rest of the input.
        if self.inner.slice().starts_with('"') {
            return Some(Err((SyntaxError::UnterminatedString.into(), span)));
        }

        // Merge everything directly adjacent into a single error.
        while let Some(token) = self.inner.next() {
            let next = self.inner.span();
            if span.end != next.start {
                self.pending = Some((token, next));
                break;
            }
            span.end = next.end;
        }
        let token = self.inner.source()[span.clone()].to_string();
        Some(Err((SyntaxError::UnexpectedInput { token }.into(), span)))
    }
}

#[derive(Clone, Debug, Logos, PartialEq)]
pub enum Token {
    // Single-character tokens.
    #[token("(")]
    LtParen,
    #[token(")")]
    RtParen,
    #[token("{")]
    LtBrace,
    #[token("}")]
    RtBrace,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("-")]
    Minus,
    #[token("+")]
    Plus,
    #[token(";")]
    Semicolon,
    #[token("/")]
    Slash,
    #[token("*")]
    Asterisk,

    // One or two character tokens.
    #[token("!")]
    Bang,
    #[token("!=")]
    BangEqual,
    #[token("=")]
    Equal,
    #[token("==")]
    EqualEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,

    // Literals. Strings may span lines and have no escapes.
    #[regex("[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),
    #[regex(r#""[^"]*""#, |lex| { let s = lex.slice(); s[1..s.len() - 1].to_string() })]
    String(String),
    #[regex(r#"[0-9]+(\.[0-9]+)?"#, |lex| lex.slice().parse::<f64>())]
    Number(f64),

    // Keywords.
    #[token("and")]
    And,
    #[token("class")]
    Class,
    #[token("else")]
    Else,
    #[token("false")]
    False,
    #[token("for")]
    For,
    #[token("fun")]
    Fun,
    #[token("if")]
    If,
    #[token("nil")]
    Nil,
    #[token("or")]
    Or,
    #[token("print")]
    Print,
    #[token("return")]
    Return,
    #[token("super")]
    Super,
    #[token("this")]
    This,
    #[token("true")]
    True,
    #[token("var")]
    Var,
    #[token("while")]
    While,

    #[regex(r"//.*", logos::skip)]
    #[regex(r"[ \r\n\t\f]+", logos::skip)]
    #[error]
    Error,
}

impl Token {
    /// Reserved words that are not literal values.
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            Token::And
                | Token::Class
                | Token::Else
                | Token::For
                | Token::Fun
                | Token::If
                | Token::Or
                | Token::Print
                | Token::Return
                | Token::Super
                | Token::This
                | Token::Var
                | Token::While
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn lex(source: &str) -> Vec<Result<Spanned<Token>, ErrorS>> {
        Lexer::new(source).collect()
    }

    #[test]
    fn unexpected_input_recovers() {
        let exp = vec![
            Err((SyntaxError::UnexpectedInput { token: "@foo".to_string() }.into(), 0..4)),
            Ok((Token::Identifier("bar".to_string()), 5..8)),
        ];
        assert_eq!(exp, lex("@foo bar"));
    }

    #[test]
    fn unterminated_string() {
        let exp = vec![Err((SyntaxError::UnterminatedString.into(), 0..5))];
        assert_eq!(exp, lex("\"\nfoo"));
    }

    #[test]
    fn multiline_string_and_comment() {
        let exp = vec![
            Ok((Token::Print, 0..5)),
            Ok((Token::String("a\nb".to_string()), 6..11)),
            Ok((Token::Semicolon, 11..12)),
        ];
        assert_eq!(exp, lex("print \"a\nb\"; // trailing"));
    }

    #[test]
    fn keywords_and_numbers() {
        let got = lex("var answer = 4.5;")
            .into_iter()
            .map(|token| token.map(|(token, _)| token))
            .collect::<Vec<_>>();
        let exp = vec![
            Ok(Token::Var),
            Ok(Token::Identifier("answer".to_string())),
            Ok(Token::Equal),
            Ok(Token::Number(4.5)),
            Ok(Token::Semicolon),
        ];
        assert_eq!(exp, got);
    }

    #[test]
    fn literals_are_not_keywords() {
        assert!(Token::While.is_keyword());
        assert!(!Token::Nil.is_keyword());
        assert!(!Token::Identifier("classy".to_string()).is_keyword());
    }
}
