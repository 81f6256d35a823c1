use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_till, take_while1},
    character::complete::{char, digit0, digit1, multispace1},
    combinator::{opt, recognize, value},
    error::ErrorKind,
    multi::many0,
};

use crate::ast::{NumberType, Value, nil};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Characters that end a symbol
const DELIMITERS: &str = "()'\";";

fn fail<T>(input: &str, kind: ErrorKind) -> IResult<&str, T> {
    Err(nom::Err::Failure(nom::error::Error::new(input, kind)))
}

/// Convert nom parsing errors to user-friendly messages
fn parse_error_to_error(input: &str, error: nom::Err<nom::error::Error<&str>>) -> Error {
    let (code, remaining) = match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => (e.code, e.input),
        nom::Err::Incomplete(_) => (ErrorKind::Eof, ""),
    };
    let (kind, message) = match code {
        ErrorKind::TooLarge => (
            ParseErrorKind::TooDeeplyNested,
            format!("expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
        ),
        ErrorKind::Eof => (
            ParseErrorKind::Incomplete,
            "unexpected end of input".into(),
        ),
        ErrorKind::Escaped => (ParseErrorKind::Incomplete, "expected close quote".into()),
        ErrorKind::Char => (ParseErrorKind::InvalidSyntax, "unexpected close paren".into()),
        ErrorKind::Space => (
            ParseErrorKind::InvalidSyntax,
            "expected space or close paren".into(),
        ),
        ErrorKind::Verify => (ParseErrorKind::InvalidSyntax, "invalid dotted pair".into()),
        ErrorKind::Tag => (
            ParseErrorKind::InvalidSyntax,
            "expected expression after quote".into(),
        ),
        _ => (ParseErrorKind::InvalidSyntax, "invalid syntax".into()),
    };
    let offset = input.len().saturating_sub(remaining.len());
    let position = input[..offset].chars().count();
    Error::ParseError(ParseError::with_context(kind, message, input, position))
}

/// Skip whitespace and `;` comments
fn atmosphere(input: &str) -> IResult<&str, ()> {
    let comment = recognize((char(';'), take_till(|c: char| c == '\n')));
    value((), many0(alt((multispace1, comment)))).parse(input)
}

/// An element must be followed by whitespace, a comment, a close paren or
/// the end of input
fn separator(input: &str) -> IResult<&str, ()> {
    match input.chars().next() {
        None | Some(')') | Some(';') => Ok((input, ())),
        Some(c) if c.is_whitespace() => Ok((input, ())),
        Some(_) => fail(input, ErrorKind::Space),
    }
}

/// Parse a number: an optional minus sign, digits, and an optional
/// fractional part (`1.` is allowed)
fn parse_number(input: &str) -> IResult<&str, Value> {
    let (remaining, number_str) =
        recognize((opt(char('-')), digit1, opt((char('.'), digit0)))).parse(input)?;

    match number_str.parse::<NumberType>() {
        Ok(n) => Ok((remaining, Value::Number(n))),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Digit,
        ))),
    }
}

/// Parse a symbol: any run of characters that are not whitespace or
/// delimiters. `#t` and `#f` are symbols bound in the global environment.
fn parse_symbol(input: &str) -> IResult<&str, Value> {
    let (remaining, name) =
        take_while1(|c: char| !c.is_whitespace() && !DELIMITERS.contains(c)).parse(input)?;
    Ok((remaining, Value::symbol(name)))
}

/// Parse a string literal. `\n` and `\t` are control characters; any other
/// escaped character stands for itself.
fn parse_string(input: &str) -> IResult<&str, Value> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut text = String::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => return Ok((char_iter.as_str(), Value::from(text))),
            Some('\\') => match char_iter.next() {
                Some('n') => text.push('\n'),
                Some('t') => text.push('\t'),
                Some(ch) => text.push(ch),
                None => return fail(remaining, ErrorKind::Escaped),
            },
            Some(ch) => text.push(ch),
            None => return fail(remaining, ErrorKind::Escaped),
        }
        remaining = char_iter.as_str();
    }
}

/// Parse quoted expression ('expr -> (quote expr))
fn parse_quote(input: &str, depth: usize) -> IResult<&str, Value> {
    let (input, _) = char('\'').parse(input)?;
    if input.starts_with(char::is_whitespace) {
        return fail(input, ErrorKind::Tag);
    }
    let (input, datum) = parse_datum(input, depth + 1)?;
    Ok((input, Value::list(vec![Value::symbol("quote"), datum])))
}

fn is_dot(value: &Value) -> bool {
    matches!(value, Value::Symbol(s) if s.as_str() == ".")
}

/// Parse a list, possibly dotted: `(a b)`, `(a . b)`, `(a b . c)`
fn parse_list(input: &str, depth: usize) -> IResult<&str, Value> {
    let (mut input, _) = char('(').parse(input)?;
    let mut elements = Vec::new();
    let mut dotted = false;
    let mut tail = None;

    loop {
        (input, _) = atmosphere(input)?;
        if let Some(rest) = input.strip_prefix(')') {
            if dotted && tail.is_none() {
                return fail(input, ErrorKind::Verify);
            }
            let list = elements
                .into_iter()
                .rev()
                .fold(tail.unwrap_or_else(nil), |cdr, car| {
                    Value::Pair(crate::ast::Pair::new(car, cdr))
                });
            return Ok((rest, list));
        }
        if tail.is_some() {
            return fail(input, ErrorKind::Verify);
        }

        let start = input;
        let (rest, element) = parse_datum(input, depth + 1)?;
        let (rest, _) = separator(rest)?;
        if is_dot(&element) {
            if dotted || elements.is_empty() {
                return fail(start, ErrorKind::Verify);
            }
            dotted = true;
        } else if dotted {
            tail = Some(element);
        } else {
            elements.push(element);
        }
        input = rest;
    }
}

/// Parse a single datum starting exactly at `input`
fn parse_datum(input: &str, depth: usize) -> IResult<&str, Value> {
    if depth >= MAX_PARSE_DEPTH {
        return fail(input, ErrorKind::TooLarge);
    }
    match input.chars().next() {
        None => fail(input, ErrorKind::Eof),
        Some('(') => parse_list(input, depth),
        Some(')') => fail(input, ErrorKind::Char),
        Some('"') => parse_string(input),
        Some('\'') => parse_quote(input, depth),
        Some(_) => alt((parse_number, parse_symbol)).parse(input),
    }
}

/// Parse every top-level expression in `input`.
pub fn parse_program(input: &str) -> Result<Vec<Value>, Error> {
    let mut forms = Vec::new();
    let mut rest = input;
    loop {
        let (after, _) = atmosphere(rest).map_err(|e| parse_error_to_error(input, e))?;
        if after.is_empty() {
            return Ok(forms);
        }
        let (after, form) = parse_datum(after, 0)
            .and_then(|(after, form)| Ok((separator(after)?.0, form)))
            .map_err(|e| parse_error_to_error(input, e))?;
        forms.push(form);
        rest = after;
    }
}

/// Parse exactly one expression from input.
pub fn parse_scheme(input: &str) -> Result<Value, Error> {
    let (rest, _) = atmosphere(input).map_err(|e| parse_error_to_error(input, e))?;
    let (rest, form) = parse_datum(rest, 0).map_err(|e| parse_error_to_error(input, e))?;
    let (rest, _) = atmosphere(rest).map_err(|e| parse_error_to_error(input, e))?;
    if rest.is_empty() {
        Ok(form)
    } else {
        let offset = input.len() - rest.len();
        Err(Error::ParseError(ParseError::with_context(
            ParseErrorKind::InvalidSyntax,
            format!("unexpected input after expression: '{rest}'"),
            input,
            input[..offset].chars().count(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Pair, sym, val};

    /// Test result variants for parsing tests
    #[derive(Debug)]
    enum ParseTestResult {
        Success(Value),
        /// Parsing should fail with this kind and a message containing this text
        SpecificError(ParseErrorKind, &'static str),
    }
    use ParseTestResult::*;

    fn success<T: Into<Value>>(value: T) -> ParseTestResult {
        Success(value.into())
    }

    fn quoted(value: Value) -> Value {
        Value::list(vec![sym("quote"), value])
    }

    fn dotted(values: Vec<Value>, tail: Value) -> Value {
        values
            .into_iter()
            .rev()
            .fold(tail, |cdr, car| Value::Pair(Pair::new(car, cdr)))
    }

    fn run_parse_tests(test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.into_iter().enumerate() {
            let test_id = format!("Parse test #{} {input:?}", i + 1);
            let result = parse_scheme(input);

            match (result, expected) {
                (Ok(actual), Success(expected_val)) => {
                    assert_eq!(actual, expected_val, "{test_id}: value mismatch");

                    // display -> parse -> display is stable
                    let displayed = format!("{actual}");
                    let reparsed = parse_scheme(&displayed).unwrap_or_else(|e| {
                        panic!("{test_id}: round-trip parse failed for '{displayed}': {e}")
                    });
                    assert_eq!(displayed, format!("{reparsed}"), "{test_id}: round trip");
                }
                (Err(Error::ParseError(e)), SpecificError(kind, fragment)) => {
                    assert_eq!(e.kind, kind, "{test_id}: kind mismatch ({})", e.message);
                    assert!(
                        e.message.contains(fragment),
                        "{test_id}: message `{}' should contain `{fragment}'",
                        e.message
                    );
                }
                (result, expected) => {
                    panic!("{test_id}: expected {expected:?}, got {result:?}")
                }
            }
        }
    }

    #[test]
    fn test_atoms() {
        run_parse_tests(vec![
            ("42", success(42)),
            ("-7", success(-7)),
            ("3.25", success(3.25)),
            ("1.", success(1)),
            ("-0.5", success(-0.5)),
            ("foo", success(sym("foo"))),
            ("-", success(sym("-"))),
            ("call/cc", success(sym("call/cc"))),
            ("set!", success(sym("set!"))),
            ("<=", success(sym("<="))),
            ("#t", success(sym("#t"))),
            ("#f", success(sym("#f"))),
            ("\"hello\"", success("hello")),
            ("\"\"", success("")),
            ("\"a\\\"b\"", success("a\"b")),
            ("\"a\\\\b\"", success("a\\b")),
            ("\"line\\nbreak\\t\"", success("line\nbreak\t")),
            ("\"\\q\"", success("q")),
            ("  42  ", success(42)),
            ("; leading comment\n42", success(42)),
        ]);
    }

    #[test]
    fn test_lists() {
        run_parse_tests(vec![
            ("()", success(nil())),
            ("( )", success(nil())),
            ("(1 2 3)", success([1, 2, 3])),
            ("(+ 1 (* 2 3))", success(vec![sym("+"), val(1), val([sym("*"), val(2), val(3)])])),
            ("(a\n  b)", success(vec![sym("a"), sym("b")])),
            ("(a ; comment\n b)", success(vec![sym("a"), sym("b")])),
            ("(\"s\" x)", success(vec![val("s"), sym("x")])),
            ("(a . b)", success(dotted(vec![sym("a")], sym("b")))),
            ("(a b . c)", success(dotted(vec![sym("a"), sym("b")], sym("c")))),
            ("(a . (b))", success(vec![sym("a"), sym("b")])),
            ("'x", success(quoted(sym("x")))),
            ("'(1 2)", success(quoted(val([1, 2])))),
            ("''x", success(quoted(quoted(sym("x"))))),
            ("'()", success(quoted(nil()))),
            ("(quote x)", success(quoted(sym("x")))),
        ]);
    }

    #[test]
    fn test_parse_errors() {
        use ParseErrorKind::*;
        run_parse_tests(vec![
            ("(+ 1 2", SpecificError(Incomplete, "end of input")),
            ("(", SpecificError(Incomplete, "end of input")),
            ("((a)", SpecificError(Incomplete, "end of input")),
            ("\"open", SpecificError(Incomplete, "close quote")),
            ("\"trailing\\", SpecificError(Incomplete, "close quote")),
            ("'", SpecificError(Incomplete, "end of input")),
            (")", SpecificError(InvalidSyntax, "unexpected close paren")),
            ("')", SpecificError(InvalidSyntax, "unexpected close paren")),
            ("' x", SpecificError(InvalidSyntax, "after quote")),
            ("(1a)", SpecificError(InvalidSyntax, "expected space or close paren")),
            ("(\"a\"b)", SpecificError(InvalidSyntax, "expected space or close paren")),
            ("((a)(b))", SpecificError(InvalidSyntax, "expected space or close paren")),
            ("(. a)", SpecificError(InvalidSyntax, "invalid dotted pair")),
            ("(a .)", SpecificError(InvalidSyntax, "invalid dotted pair")),
            ("(a . b c)", SpecificError(InvalidSyntax, "invalid dotted pair")),
            ("(a . . b)", SpecificError(InvalidSyntax, "invalid dotted pair")),
            ("1 2", SpecificError(InvalidSyntax, "unexpected input after expression")),
            ("", SpecificError(Incomplete, "")),
        ]);
    }

    #[test]
    fn test_nesting_limit() {
        let ok = format!("{}x{}", "(".repeat(MAX_PARSE_DEPTH - 1), ")".repeat(MAX_PARSE_DEPTH - 1));
        assert!(parse_scheme(&ok).is_ok());

        let deep = format!("{}x{}", "(".repeat(MAX_PARSE_DEPTH), ")".repeat(MAX_PARSE_DEPTH));
        match parse_scheme(&deep) {
            Err(Error::ParseError(e)) => assert_eq!(e.kind, ParseErrorKind::TooDeeplyNested),
            other => panic!("expected nesting error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_program() {
        let program = parse_program(
            "; library\n(define x 1)\n\n(define (f y) (+ x y)) ; trailing\n(f 2)\n",
        )
        .unwrap_or_else(|e| panic!("program failed to parse: {e}"));
        assert_eq!(program.len(), 3);
        assert_eq!(program[2], val([sym("f"), val(2)]));

        assert_eq!(parse_program("  ; only a comment"), Ok(vec![]));
        assert_eq!(parse_program("1 \"a\" b"), Ok(vec![val(1), val("a"), sym("b")]));
        assert!(parse_program("(a) )").is_err());
        assert!(parse_program("1x").is_err());
    }

    #[test]
    fn test_error_context_points_at_problem() {
        match parse_scheme("(define x (1a))") {
            Err(Error::ParseError(e)) => {
                assert_eq!(e.kind, ParseErrorKind::InvalidSyntax);
                assert_eq!(e.context.as_deref(), Some("(define x (1a))"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
