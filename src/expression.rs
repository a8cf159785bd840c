//! Splitting interpolated text into literal and expression pieces.
//!
//! `ABC昵称{{ userInfo.A }}你好啊！{{ userInfo.B }}卧槽` becomes the stored
//! text `ABC昵称{0}你好啊！{1}卧槽` plus the parameters
//! `[userInfo.A, userInfo.B]`.

use crate::detect::TextDetector;
use crate::error::{AutokeyError, Result};

pub const OPEN: &str = "{{";
pub const CLOSE: &str = "}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    /// Text between the delimiters, untrimmed
    Expression(&'a str),
}

/// Literal skeleton with positional placeholders and the expressions they stand for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub skeleton: String,
    pub params: Vec<String>,
}

impl Template {
    /// `function('key', [p0, p1])`, or `function('key')` without parameters
    pub fn call(&self, function: &str, key: &str) -> String {
        if self.params.is_empty() {
            return format!("{}('{}')", function, key);
        }
        format!("{}('{}', [{}])", function, key, self.params.join(", "))
    }
}

pub fn has_interpolation(text: &str) -> bool {
    text.contains(OPEN) && text.contains(CLOSE)
}

/// Split `text` at every `{{ … }}` pair, left to right.
/// An unmatched opening delimiter stays part of the trailing literal.
pub fn split_segments(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    while cursor < text.len() {
        let Some(open) = text[cursor..].find(OPEN).map(|i| cursor + i) else {
            break;
        };
        let inner = open + OPEN.len();
        let Some(close) = text[inner..].find(CLOSE).map(|i| inner + i) else {
            break;
        };
        segments.push(Segment::Literal(&text[cursor..open]));
        segments.push(Segment::Expression(&text[open + OPEN.len()..close]));
        cursor = close + CLOSE.len();
    }
    if cursor < text.len() {
        segments.push(Segment::Literal(&text[cursor..]));
    }
    segments
}

/// Turn interpolated text into a `Template`.
///
/// Fails with `ExpressionConflict` when an expression itself contains
/// target-script text; such nodes must be left untouched.
pub fn decompose(text: &str, detector: &TextDetector) -> Result<Template> {
    let mut skeleton = String::with_capacity(text.len());
    let mut params = Vec::new();
    for segment in split_segments(text) {
        match segment {
            Segment::Literal(literal) => skeleton.push_str(literal),
            Segment::Expression(expression) => {
                if detector.has_script(expression) {
                    return Err(AutokeyError::ExpressionConflict {
                        expression: expression.trim().to_string(),
                    });
                }
                skeleton.push_str(&format!("{{{}}}", params.len()));
                params.push(expression.trim().to_string());
            }
        }
    }
    Ok(Template { skeleton, params })
}
