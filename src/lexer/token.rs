use std::fmt;

use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
pub enum Token {
    // Keywords
    #[token("func")]
    Func,
    #[token("var")]
    Var,
    #[token("select")]
    Select,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("chan")]
    Chan,
    #[token("for")]
    For,
    #[token("break")]
    Break,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("nil")]
    Nil,

    // Literals
    #[regex(r"[0-9][0-9_]*", |lex| lex.slice().replace('_', "").parse::<i64>().ok())]
    IntLit(i64),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    // Operators
    #[token("<-")]
    Arrow,
    #[token(":=")]
    ColonEq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("!")]
    Bang,

    // Punctuation
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,

    #[token("\n")]
    Newline,

    #[regex(r"//[^\n]*")]
    Comment,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Token::Func => "'func'",
            Token::Var => "'var'",
            Token::Select => "'select'",
            Token::Case => "'case'",
            Token::Default => "'default'",
            Token::Chan => "'chan'",
            Token::For => "'for'",
            Token::Break => "'break'",
            Token::If => "'if'",
            Token::Else => "'else'",
            Token::True => "'true'",
            Token::False => "'false'",
            Token::Nil => "'nil'",
            Token::IntLit(n) => return write!(f, "integer {n}"),
            Token::Ident => "identifier",
            Token::Arrow => "'<-'",
            Token::ColonEq => "':='",
            Token::EqEq => "'=='",
            Token::BangEq => "'!='",
            Token::LtEq => "'<='",
            Token::GtEq => "'>='",
            Token::AmpAmp => "'&&'",
            Token::PipePipe => "'||'",
            Token::Eq => "'='",
            Token::Lt => "'<'",
            Token::Gt => "'>'",
            Token::Plus => "'+'",
            Token::Minus => "'-'",
            Token::Bang => "'!'",
            Token::Comma => "','",
            Token::Colon => "':'",
            Token::Semi => "';'",
            Token::LParen => "'('",
            Token::RParen => "')'",
            Token::LBrace => "'{'",
            Token::RBrace => "'}'",
            Token::Newline => "newline",
            Token::Comment => "comment",
        };
        f.write_str(s)
    }
}
