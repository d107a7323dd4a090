use crate::error::Location;
use crate::options::Radix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstantId(pub usize);

#[derive(Debug, Clone)]
pub enum ConstantKind {
    Numeric(i64),
    Str(String),
}

/// spec §3 CONSTANT record. A CONSTANT statement can declare a
/// comma-separated list (see `model::constant::parse_constant_list`);
/// each list element becomes one of these.
#[derive(Debug, Clone)]
pub struct Constant {
    pub id: ConstantId,
    pub name: String,
    pub prefix: Option<String>,
    pub tag: String,
    pub type_name: Option<String>,
    pub radix: Radix,
    pub kind: ConstantKind,
    /// Number of bytes this constant represents — used when emitting
    /// MASK constants, which are typed at their container's size.
    pub size: i64,
    pub comment: Option<String>,
    pub loc: Location,
}

/// Split a CONSTANT identifier list on commas and newlines, honoring
/// embedded `/* ... */` comments and stripping a trailing `{ ... }`
/// comment, per spec §4.4 "Constant list parsing".
///
/// `{ ... }` is only recognized as a comment when it trails the whole
/// list (mirrors the legacy parser, which treats a brace group as a
/// late-attached comment rather than part of any single element).
pub fn split_constant_list(raw: &str) -> (Vec<String>, Option<String>) {
    let (body, trailing_comment) = match raw.rfind('{') {
        Some(start) if raw.trim_end().ends_with('}') => {
            let comment = raw[start + 1..raw.trim_end().len() - 1].trim().to_string();
            (&raw[..start], Some(comment))
        }
        _ => (raw, None),
    };

    let mut elements = Vec::new();
    let mut current = String::new();
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                while let Some(c2) = chars.next() {
                    if c2 == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        break;
                    }
                }
            }
            ',' | '\n' => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    elements.push(trimmed.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        elements.push(trimmed.to_string());
    }

    (elements, trailing_comment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_commas_and_newlines() {
        let (elements, comment) = split_constant_list("A, B\nC");
        assert_eq!(elements, vec!["A", "B", "C"]);
        assert!(comment.is_none());
    }

    #[test]
    fn strips_embedded_block_comments() {
        let (elements, _) = split_constant_list("A /* first */, B");
        assert_eq!(elements, vec!["A", "B"]);
    }

    #[test]
    fn strips_trailing_brace_comment() {
        let (elements, comment) = split_constant_list("A, B, C { the trio }");
        assert_eq!(elements, vec!["A", "B", "C"]);
        assert_eq!(comment.as_deref(), Some("the trio"));
    }
}
