//! PDF lexer (tokenizer).
//!
//! Every byte belongs to one of four classes:
//!
//! | Class | Bytes |
//! |---|---|
//! | whitespace | NUL, TAB, LF, FF, CR, SP, 0x80, 0xFF |
//! | numeric | `0-9 + - .` |
//! | delimiter | `% ( ) / < > [ ] { }` |
//! | regular | everything else |
//!
//! Keywords (`true`, `obj`, `R`, content operators such as `RG`) are runs of
//! numeric and regular bytes; the lexer reads the whole run before deciding
//! what it is, so `RG` never lexes as `R` followed by `G`.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::char,
    combinator::{map, opt, value},
    multi::many0,
    sequence::preceded,
};

/// Lexical class of a byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    /// Separates tokens
    Whitespace,
    /// Digits, signs and the decimal point
    Numeric,
    /// Starts or ends a compound token
    Delimiter,
    /// Any other byte
    Regular,
}

const fn build_char_classes() -> [CharClass; 256] {
    let mut table = [CharClass::Regular; 256];
    let ws: [u8; 8] = [0x00, 0x09, 0x0A, 0x0C, 0x0D, 0x20, 0x80, 0xFF];
    let mut i = 0;
    while i < ws.len() {
        table[ws[i] as usize] = CharClass::Whitespace;
        i += 1;
    }
    let delims = b"%()/<>[]{}";
    i = 0;
    while i < delims.len() {
        table[delims[i] as usize] = CharClass::Delimiter;
        i += 1;
    }
    let mut d = b'0';
    while d <= b'9' {
        table[d as usize] = CharClass::Numeric;
        d += 1;
    }
    table[b'+' as usize] = CharClass::Numeric;
    table[b'-' as usize] = CharClass::Numeric;
    table[b'.' as usize] = CharClass::Numeric;
    table
}

static CHAR_CLASSES: [CharClass; 256] = build_char_classes();

/// Class of a single byte.
#[inline]
pub fn char_class(byte: u8) -> CharClass {
    CHAR_CLASSES[byte as usize]
}

/// True for whitespace bytes.
#[inline]
pub fn is_whitespace(byte: u8) -> bool {
    char_class(byte) == CharClass::Whitespace
}

/// True for delimiter bytes.
#[inline]
pub fn is_delimiter(byte: u8) -> bool {
    char_class(byte) == CharClass::Delimiter
}

/// True for bytes that may appear inside a keyword or name.
#[inline]
pub fn is_regular(byte: u8) -> bool {
    matches!(char_class(byte), CharClass::Regular | CharClass::Numeric)
}

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),

    /// Real number (e.g., 3.14, -.5)
    Real(f32),

    /// Literal string bytes between the outer parentheses, escapes not decoded
    LiteralString(&'a [u8]),

    /// Hexadecimal string digits between `<` and `>`
    HexString(&'a [u8]),

    /// Name with `#xx` escapes decoded
    Name(String),

    /// Boolean true keyword
    True,

    /// Boolean false keyword
    False,

    /// Null keyword
    Null,

    /// Array start delimiter [
    ArrayStart,

    /// Array end delimiter ]
    ArrayEnd,

    /// Dictionary start delimiter <<
    DictStart,

    /// Dictionary end delimiter >>
    DictEnd,

    /// Indirect object start keyword "obj"
    ObjStart,

    /// Indirect object end keyword "endobj"
    ObjEnd,

    /// Stream start keyword "stream"
    StreamStart,

    /// Stream end keyword "endstream"
    StreamEnd,

    /// Reference keyword "R" (used in "10 0 R")
    R,

    /// Any other keyword (content-stream operators, `xref`, `trailer`, ...)
    Keyword(&'a [u8]),
}

/// Parse one or more whitespace bytes.
fn whitespace(input: &[u8]) -> IResult<&[u8], ()> {
    value((), take_while1(is_whitespace))(input)
}

/// Parse a comment (% to end of line).
fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip all whitespace and comments.
pub fn skip_ws(input: &[u8]) -> IResult<&[u8], ()> {
    let mut remaining = input;

    loop {
        if let Ok((rest, _)) = whitespace(remaining) {
            remaining = rest;
            continue;
        }
        if let Ok((rest, _)) = comment(remaining) {
            remaining = rest;
            continue;
        }
        break;
    }

    Ok((remaining, ()))
}

fn number_error(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
}

/// Parse an integer or real number.
///
/// The presence of `.` makes the number real. Integers too large for `i64`
/// degrade to reals.
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let start = input;
    let (input, sign) = opt(alt((char('+'), char('-'))))(input)?;
    let (input, int_part) = take_while(|c: u8| c.is_ascii_digit())(input)?;
    let (input, frac_part) = opt(preceded(char('.'), take_while(|c: u8| c.is_ascii_digit())))(input)?;

    let frac_digits = frac_part.map(|f| f.len()).unwrap_or(0);
    if int_part.is_empty() && frac_digits == 0 {
        return Err(number_error(start));
    }

    let text = std::str::from_utf8(&start[..start.len() - input.len()]).map_err(|_| number_error(start))?;
    // A leading '+' is not accepted by Rust's parsers.
    let text = if sign == Some('+') { &text[1..] } else { text };

    if frac_part.is_some() {
        let text = text.strip_suffix('.').unwrap_or(text);
        let num: f64 = text.parse().map_err(|_| number_error(start))?;
        Ok((input, Token::Real(num as f32)))
    } else {
        match text.parse::<i64>() {
            Ok(num) => Ok((input, Token::Integer(num))),
            Err(_) => {
                let num: f64 = text.parse().map_err(|_| number_error(start))?;
                Ok((input, Token::Real(num as f32)))
            },
        }
    }
}

/// Parse a literal string enclosed in parentheses.
///
/// Balanced nested parentheses are allowed; escapes are skipped over but
/// left for [`crate::parser::decode_literal_string_escapes`].
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (remaining, _) = char('(')(input)?;
    let mut depth = 1;
    let mut pos = 0;

    while depth > 0 && pos < remaining.len() {
        match remaining[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    if depth != 0 || pos > remaining.len() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    Ok((&remaining[pos..], Token::LiteralString(&remaining[..pos - 1])))
}

/// Parse a hexadecimal string enclosed in angle brackets.
fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }
    let (rest, _) = char('<')(input)?;
    let (rest, digits) = take_till(|c| c == b'>')(rest)?;
    let (rest, _) = char('>')(rest)?;
    Ok((rest, Token::HexString(digits)))
}

/// Decode `#XX` escape sequences in a raw name.
///
/// Bytes map one-to-one onto chars (Latin-1), so non-UTF-8 names survive.
///
/// ```
/// # use pdf_engine::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes(b"A#20B#23C"), "A B#C");
/// assert_eq!(decode_name_escapes(b"Type"), "Type");
/// assert_eq!(decode_name_escapes(b"A#"), "A#");
/// ```
pub fn decode_name_escapes(name: &[u8]) -> String {
    let mut result = String::with_capacity(name.len());
    let mut i = 0;

    while i < name.len() {
        let byte = name[i];
        if byte == b'#' && i + 2 < name.len() {
            let hex = &name[i + 1..i + 3];
            if let Some(decoded) = std::str::from_utf8(hex).ok().and_then(|h| u8::from_str_radix(h, 16).ok()) {
                result.push(decoded as char);
                i += 3;
                continue;
            }
        }
        result.push(byte as char);
        i += 1;
    }

    result
}

/// Parse a name starting with /.
fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(char('/'), map(take_while(is_regular), |bytes| Token::Name(decode_name_escapes(bytes))))(input)
}

/// Parse the two-byte and single-byte structural delimiters.
fn parse_delimiter(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
    ))(input)
}

/// Parse a keyword: a maximal run of regular bytes.
fn parse_word(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, word) = take_while1(is_regular)(input)?;
    let token = match word {
        b"true" => Token::True,
        b"false" => Token::False,
        b"null" => Token::Null,
        b"obj" => Token::ObjStart,
        b"endobj" => Token::ObjEnd,
        b"stream" => Token::StreamStart,
        b"endstream" => Token::StreamEnd,
        b"R" => Token::R,
        other => Token::Keyword(other),
    };
    Ok((rest, token))
}

/// Parse a single PDF token after skipping whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;

    alt((parse_name, parse_number_token, parse_literal_string, parse_delimiter, parse_hex_string, parse_word))(input)
}

/// A number is only a number if a regular byte does not follow it (`1a` is a keyword).
fn parse_number_token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, tok) = parse_number(input)?;
    match rest.first() {
        Some(&b) if char_class(b) == CharClass::Regular => {
            Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)))
        },
        _ => Ok((rest, tok)),
    }
}

/// Parse tokens until the input is exhausted or no token can be read.
pub fn tokens(input: &[u8]) -> IResult<&[u8], Vec<Token<'_>>> {
    many0(token)(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Character classes
    // ========================================================================

    #[test]
    fn test_char_classes() {
        for b in [0x00u8, 0x09, 0x0A, 0x0C, 0x0D, 0x20, 0x80, 0xFF] {
            assert_eq!(char_class(b), CharClass::Whitespace, "byte {:#x}", b);
        }
        for b in b"0123456789+-.".iter() {
            assert_eq!(char_class(*b), CharClass::Numeric);
        }
        for b in b"%()/<>[]{}".iter() {
            assert_eq!(char_class(*b), CharClass::Delimiter);
        }
        for b in b"aZ*'\"#_".iter() {
            assert_eq!(char_class(*b), CharClass::Regular);
        }
    }

    // ========================================================================
    // Numbers
    // ========================================================================

    #[test]
    fn test_parse_integers() {
        assert_eq!(token(b"42"), Ok((&b""[..], Token::Integer(42))));
        assert_eq!(token(b"-123"), Ok((&b""[..], Token::Integer(-123))));
        assert_eq!(token(b"+17"), Ok((&b""[..], Token::Integer(17))));
    }

    #[test]
    fn test_parse_reals() {
        assert_eq!(token(b"-2.5"), Ok((&b""[..], Token::Real(-2.5))));
        assert_eq!(token(b".5"), Ok((&b""[..], Token::Real(0.5))));
        assert_eq!(token(b"4."), Ok((&b""[..], Token::Real(4.0))));
        assert_eq!(token(b"-.25"), Ok((&b""[..], Token::Real(-0.25))));
    }

    #[test]
    fn test_huge_integer_degrades_to_real() {
        let (_, tok) = token(b"99999999999999999999").unwrap();
        assert!(matches!(tok, Token::Real(_)));
    }

    // ========================================================================
    // Strings and names
    // ========================================================================

    #[test]
    fn test_literal_string_with_nesting() {
        assert_eq!(token(b"(a (b) c)rest"), Ok((&b"rest"[..], Token::LiteralString(b"a (b) c"))));
    }

    #[test]
    fn test_literal_string_escaped_paren() {
        assert_eq!(token(br"(a\)b)"), Ok((&b""[..], Token::LiteralString(br"a\)b"))));
    }

    #[test]
    fn test_unbalanced_literal_string_fails() {
        assert!(token(b"(abc").is_err());
    }

    #[test]
    fn test_hex_string() {
        assert_eq!(token(b"<48 65>"), Ok((&b""[..], Token::HexString(b"48 65"))));
    }

    #[test]
    fn test_name_with_escape() {
        assert_eq!(token(b"/A#20B"), Ok((&b""[..], Token::Name("A B".to_string()))));
        assert_eq!(token(b"/Type/Page"), Ok((&b"/Page"[..], Token::Name("Type".to_string()))));
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(token(b"/ x"), Ok((&b" x"[..], Token::Name(String::new()))));
    }

    // ========================================================================
    // Keywords and delimiters
    // ========================================================================

    #[test]
    fn test_keywords() {
        assert_eq!(token(b"true"), Ok((&b""[..], Token::True)));
        assert_eq!(token(b"null"), Ok((&b""[..], Token::Null)));
        assert_eq!(token(b"endstream"), Ok((&b""[..], Token::StreamEnd)));
        assert_eq!(token(b"R"), Ok((&b""[..], Token::R)));
    }

    #[test]
    fn test_operator_not_split_into_r() {
        assert_eq!(token(b"RG"), Ok((&b""[..], Token::Keyword(b"RG"))));
        assert_eq!(token(b"f*"), Ok((&b""[..], Token::Keyword(b"f*"))));
        assert_eq!(token(b"'"), Ok((&b""[..], Token::Keyword(b"'"))));
    }

    #[test]
    fn test_dict_delimiters() {
        let (_, toks) = tokens(b"<< /K [1 2] >>").unwrap();
        assert_eq!(
            toks,
            vec![
                Token::DictStart,
                Token::Name("K".to_string()),
                Token::ArrayStart,
                Token::Integer(1),
                Token::Integer(2),
                Token::ArrayEnd,
                Token::DictEnd,
            ]
        );
    }

    #[test]
    fn test_comments_and_extended_whitespace_skipped() {
        let input = b"% comment\n\x80\xff 7";
        assert_eq!(token(input), Ok((&b""[..], Token::Integer(7))));
    }

    #[test]
    fn test_reference_sequence() {
        let (_, toks) = tokens(b"10 0 R").unwrap();
        assert_eq!(toks, vec![Token::Integer(10), Token::Integer(0), Token::R]);
    }
}
