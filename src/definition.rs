//! Definition file parsing.
//!
//! Option groups, settings and scheduled tasks are described by small PHP
//! files that assign an associative array:
//!
//! ```php
//! <?php
//! $option = array(
//!     'title'        => 'Enable the demo',
//!     'displayorder' => 10,
//!     'datatype'     => 'boolean',
//!     'advanced'     => true,
//! );
//! ```
//!
//! The files are never executed. This module reads the literal subset used by
//! those files: array assignments (`array(...)` and `[...]`), indexed
//! assignments (`$group['title'] = '...';`), quoted strings, numbers,
//! booleans, `null`, and string concatenation with `.`. Every key from every
//! statement is merged into one ordered [`Definition`].

use std::path::Path;

use encoding_rs::Encoding;

use crate::{
    charset,
    error::{Error, Result},
};

/// A literal value from a definition file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Str(String),

    /// Numeric literal, kept as written
    Number(String),

    Bool(bool),
    Null,
}

impl Value {
    /// Render the value the way PHP casts it to a string.
    ///
    /// Returns `None` for `null`.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Str(s) | Self::Number(s) => Some(s.clone()),
            Self::Bool(true) => Some("1".to_string()),
            Self::Bool(false) => Some(String::new()),
            Self::Null => None,
        }
    }

    /// PHP truthiness: `false`, `0`, `""`, `"0"` and `null` are false.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Null => false,
            Self::Str(s) => !(s.is_empty() || s == "0"),
            Self::Number(n) => n.parse::<f64>().map(|n| n != 0.0).unwrap_or(true),
        }
    }
}

/// Error raised while reading a definition file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Ordered key/value pairs read from a definition file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Definition {
    entries: Vec<(String, Value)>,
}

impl Definition {
    /// Parse definition source text.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] with the offending line if the text is not
    /// in the supported literal subset.
    pub fn parse(source: &str) -> std::result::Result<Self, ParseError> {
        let tokens = tokenize(source)?;
        Parser::new(tokens).parse()
    }

    /// Read and parse the definition file at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - The definition file
    /// * `encoding` - The project encoding the file is written in
    ///
    /// # Returns
    ///
    /// Every key assigned by the file, in first-assignment order.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the file cannot be read
    /// - [`Error::Decode`] if the file is not valid in `encoding`
    /// - [`Error::Definition`] if it cannot be parsed
    pub fn read(path: &Path, encoding: &'static Encoding) -> Result<Self> {
        let source = charset::read_text(path, encoding)?;

        Self::parse(&source).map_err(|e| Error::Definition {
            path: path.to_path_buf(),
            line: e.line,
            message: e.message,
        })
    }

    fn insert(&mut self, key: String, value: Value) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// The value for `key`, treating `null` as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .filter(|v| **v != Value::Null)
    }

    /// The value for `key` rendered as text.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).and_then(Value::to_text)
    }

    #[must_use]
    pub fn text_or(&self, key: &str, default: &str) -> String {
        self.text(key).unwrap_or_else(|| default.to_string())
    }

    /// The value for `key` as an integer; unparsable values yield `default`.
    #[must_use]
    pub fn int_or(&self, key: &str, default: i64) -> i64 {
        self.text(key)
            .and_then(|text| text.trim().parse().ok())
            .unwrap_or(default)
    }

    #[must_use]
    pub fn flag_or(&self, key: &str, default: bool) -> bool {
        self.get(key).map_or(default, Value::is_truthy)
    }

    /// Whether `key` is assigned a non-null value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    #[cfg(test)]
    fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Variable(String),
    Str(String),
    Number(String),
    Ident(String),
    Punct(&'static str),
}

fn starts_with(chars: &[char], at: usize, pattern: &str) -> bool {
    let mut i = at;
    for expected in pattern.chars() {
        if chars.get(i) != Some(&expected) {
            return false;
        }
        i += 1;
    }
    true
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[allow(clippy::too_many_lines)]
fn tokenize(source: &str) -> std::result::Result<Vec<(Token, usize)>, ParseError> {
    let chars: Vec<char> = source.trim_start_matches('\u{feff}').chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '<' if starts_with(&chars, i, "<?php") => i += 5,
            '<' if starts_with(&chars, i, "<?") => i += 2,
            '?' if starts_with(&chars, i, "?>") => break,
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let start_line = line;
                i += 2;
                loop {
                    if i >= chars.len() {
                        return Err(ParseError::new(start_line, "unterminated comment"));
                    }
                    if starts_with(&chars, i, "*/") {
                        i += 2;
                        break;
                    }
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    i += 1;
                }
            }
            '$' => {
                let start = i + 1;
                i = start;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                if i == start {
                    return Err(ParseError::new(line, "expected variable name after `$`"));
                }
                tokens.push((Token::Variable(chars[start..i].iter().collect()), line));
            }
            '\'' | '"' => {
                let start_line = line;
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    let Some(&ch) = chars.get(i) else {
                        return Err(ParseError::new(start_line, "unterminated string"));
                    };
                    if ch == quote {
                        i += 1;
                        break;
                    }
                    if ch == '\n' {
                        line += 1;
                    }
                    if ch == '\\' {
                        let escaped = chars.get(i + 1).copied();
                        let replacement = match (quote, escaped) {
                            ('\'', Some(e @ ('\'' | '\\'))) => Some(e),
                            ('"', Some(e @ ('"' | '\\' | '$'))) => Some(e),
                            ('"', Some('n')) => Some('\n'),
                            ('"', Some('t')) => Some('\t'),
                            ('"', Some('r')) => Some('\r'),
                            _ => None,
                        };
                        if let Some(r) = replacement {
                            text.push(r);
                            i += 2;
                            continue;
                        }
                    }
                    text.push(ch);
                    i += 1;
                }
                tokens.push((Token::Str(text), start_line));
            }
            '-' | '+' | '0'..='9' => {
                let start = i;
                if c == '-' || c == '+' {
                    i += 1;
                    if !chars.get(i).is_some_and(char::is_ascii_digit) {
                        return Err(ParseError::new(line, format!("unexpected `{c}`")));
                    }
                }
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                if chars.get(i) == Some(&'.') && chars.get(i + 1).is_some_and(char::is_ascii_digit)
                {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let literal: String = chars[start..i].iter().collect();
                tokens.push((Token::Number(literal.trim_start_matches('+').to_string()), line));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                tokens.push((Token::Ident(chars[start..i].iter().collect()), line));
            }
            '=' if chars.get(i + 1) == Some(&'>') => {
                tokens.push((Token::Punct("=>"), line));
                i += 2;
            }
            '=' | '(' | ')' | '[' | ']' | ',' | ';' | '.' => {
                let punct = match c {
                    '=' => "=",
                    '(' => "(",
                    ')' => ")",
                    '[' => "[",
                    ']' => "]",
                    ',' => ",",
                    ';' => ";",
                    _ => ".",
                };
                tokens.push((Token::Punct(punct), line));
                i += 1;
            }
            other => {
                return Err(ParseError::new(
                    line,
                    format!("unexpected character `{other}`"),
                ));
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<(Token, usize)>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |(_, line)| *line)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Some(Token::Punct(p)) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> std::result::Result<(), ParseError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(ParseError::new(self.line(), format!("expected `{punct}`")))
        }
    }

    fn parse(mut self) -> std::result::Result<Definition, ParseError> {
        let mut definition = Definition::default();

        while self.peek().is_some() {
            let line = self.line();
            let Some(Token::Variable(_)) = self.advance() else {
                return Err(ParseError::new(line, "expected a variable assignment"));
            };

            if self.eat("[") {
                let key = self.parse_key()?;
                self.expect("]")?;
                self.expect("=")?;
                let value = self.parse_value()?;
                definition.insert(key, value);
            } else {
                self.expect("=")?;
                for (key, value) in self.parse_array()? {
                    definition.insert(key, value);
                }
            }

            self.expect(";")?;
        }

        Ok(definition)
    }

    fn parse_key(&mut self) -> std::result::Result<String, ParseError> {
        let line = self.line();
        match self.advance() {
            Some(Token::Str(s) | Token::Number(s)) => Ok(s),
            _ => Err(ParseError::new(line, "expected a string or numeric key")),
        }
    }

    fn parse_array(&mut self) -> std::result::Result<Vec<(String, Value)>, ParseError> {
        let close = match self.peek() {
            Some(Token::Ident(name)) if name.eq_ignore_ascii_case("array") => {
                self.pos += 1;
                self.expect("(")?;
                ")"
            }
            Some(Token::Punct("[")) => {
                self.pos += 1;
                "]"
            }
            _ => return Err(ParseError::new(self.line(), "expected an array")),
        };

        let mut entries = Vec::new();
        loop {
            if self.eat(close) {
                break;
            }

            let key = self.parse_key()?;
            self.expect("=>")?;
            let value = self.parse_value()?;
            entries.push((key, value));

            if !self.eat(",") {
                self.expect(close)?;
                break;
            }
        }

        Ok(entries)
    }

    fn parse_value(&mut self) -> std::result::Result<Value, ParseError> {
        let mut value = self.parse_scalar()?;

        while self.eat(".") {
            let next = self.parse_scalar()?;
            let mut text = value.to_text().unwrap_or_default();
            text.push_str(&next.to_text().unwrap_or_default());
            value = Value::Str(text);
        }

        Ok(value)
    }

    fn parse_scalar(&mut self) -> std::result::Result<Value, ParseError> {
        let line = self.line();
        match self.advance() {
            Some(Token::Str(s)) => Ok(Value::Str(s)),
            Some(Token::Number(n)) => Ok(Value::Number(n)),
            Some(Token::Ident(name)) => match name.to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "null" => Ok(Value::Null),
                "array" => Err(ParseError::new(line, "nested arrays are not supported")),
                _ => Err(ParseError::new(line, format!("unsupported constant `{name}`"))),
            },
            Some(Token::Punct("[")) => {
                Err(ParseError::new(line, "nested arrays are not supported"))
            }
            _ => Err(ParseError::new(line, "expected a value")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_array_assignment() {
        let source = r"<?php
$option = array(
    'title'        => 'Enable the demo',
    'displayorder' => 10,
    'advanced'     => true,
);
";
        let def = Definition::parse(source).unwrap();

        assert_eq!(def.text("title"), Some("Enable the demo".to_string()));
        assert_eq!(def.int_or("displayorder", 0), 10);
        assert!(def.flag_or("advanced", false));
        assert_eq!(
            def.keys().collect::<Vec<_>>(),
            vec!["title", "displayorder", "advanced"]
        );
    }

    #[test]
    fn test_parse_short_array_and_indexed_assignments() {
        let source = "<?php\n$group = ['title' => 'Demo'];\n$group['displayorder'] = 50;\n$group['title'] = 'Renamed';\n";
        let def = Definition::parse(source).unwrap();

        assert_eq!(def.text("title"), Some("Renamed".to_string()));
        assert_eq!(def.int_or("displayorder", 0), 50);
        assert_eq!(def.keys().count(), 2);
    }

    #[test]
    fn test_string_escapes() {
        let source = r#"$o = array('a' => 'it\'s \n', "b" => "tab\there \"q\" \$x");"#;
        let def = Definition::parse(source).unwrap();

        assert_eq!(def.text("a"), Some("it's \\n".to_string()));
        assert_eq!(def.text("b"), Some("tab\there \"q\" $x".to_string()));
    }

    #[test]
    fn test_concatenation_and_comments() {
        let source = r"<?php
// leading comment
# shell comment
/* block
   comment */
$o = array(
    'code' => 'return ' . 5 . ';',
);
?>
trailing text is ignored
";
        let def = Definition::parse(source).unwrap();
        assert_eq!(def.text("code"), Some("return 5;".to_string()));
    }

    #[test]
    fn test_null_counts_as_absent() {
        let def = Definition::parse("$o = array('blacklist' => null, 'x' => false);").unwrap();

        assert!(!def.contains("blacklist"));
        assert!(def.contains("x"));
        assert_eq!(def.text("x"), Some(String::new()));
        assert_eq!(def.text_or("blacklist", "fallback"), "fallback");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Str("0".to_string()).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(Value::Str("yes".to_string()).is_truthy());
        assert!(!Value::Number("0".to_string()).is_truthy());
        assert!(Value::Number("-1".to_string()).is_truthy());
        assert!(!Value::Null.is_truthy());
    }

    #[test]
    fn test_negative_and_float_numbers() {
        let def = Definition::parse("$t = array('weekday' => -1, 'ratio' => 1.5);").unwrap();

        assert_eq!(def.int_or("weekday", 0), -1);
        assert_eq!(def.text("ratio"), Some("1.5".to_string()));
        assert_eq!(def.int_or("ratio", 7), 7);
    }

    #[test]
    fn test_empty_file_is_empty_definition() {
        let def = Definition::parse("<?php\n").unwrap();
        assert_eq!(def.keys().count(), 0);
    }

    #[test]
    fn test_read_decodes_project_encoding() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("purge.php");
        std::fs::write(&path, b"<?php\n$task = array('title' => 'Nettoy\xe9');\n").unwrap();

        let latin1 = crate::charset::for_label("ISO-8859-1").unwrap();
        let def = Definition::read(&path, latin1).unwrap();
        assert_eq!(def.text("title"), Some("Nettoyé".to_string()));

        let err = Definition::read(&path, encoding_rs::UTF_8).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_read_reports_path_and_line() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.php");
        std::fs::write(&path, "<?php\n$task = array(\n'title' => 'x'\n").unwrap();

        let err = Definition::read(&path, encoding_rs::UTF_8).unwrap_err();
        match err {
            Error::Definition { path: at, line, .. } => {
                assert_eq!(at, path);
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_semicolon_reports_line() {
        let err = Definition::parse("<?php\n$o = array('a' => 1)\n").unwrap_err();

        assert_eq!(err.line, 2);
        assert!(err.message.contains("`;`"));
    }

    #[test]
    fn test_nested_arrays_are_rejected() {
        let err = Definition::parse("$o = array('a' => array('b' => 1));").unwrap_err();
        assert!(err.message.contains("nested"));
    }

    #[test]
    fn test_unterminated_string_reports_start_line() {
        let err = Definition::parse("\n\n$o = array('a' => 'open\n);").unwrap_err();

        assert_eq!(err.line, 3);
        assert_eq!(err.message, "unterminated string");
    }

    #[test]
    fn test_statement_must_start_with_variable() {
        let err = Definition::parse("echo 'hi';").unwrap_err();
        assert_eq!(err.message, "expected a variable assignment");
    }
}
