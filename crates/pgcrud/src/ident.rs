//! SQL identifier validation.
//!
//! Table and field names arrive in request payloads and are spliced into SQL
//! text, so every one of them goes through [`Ident::parse`] first.
//!
//! - Unquoted parts are validated against: `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted parts allow any characters except NUL and escape `"` as `""`
//! - Dotted notation (`schema.table`) is accepted

use crate::error::{CrudError, CrudResult};
use std::fmt;

/// A part of a SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    Unquoted(String),
    Quoted(String),
}

/// A validated SQL identifier (table, column or schema-qualified name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub parts: Vec<IdentPart>,
}

fn invalid(name: &str, reason: &str) -> CrudError {
    CrudError::InvalidIdentifier(format!("{name:?}: {reason}"))
}

impl Ident {
    pub fn parse(s: &str) -> CrudResult<Self> {
        if s.is_empty() {
            return Err(invalid(s, "identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(invalid(s, "identifier cannot contain NUL character"));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') if chars.peek().is_none() => {
                        return Err(invalid(s, "trailing '.'"));
                    }
                    Some('.') => {}
                    Some(c) => {
                        return Err(invalid(s, &format!("unexpected character '{c}'")));
                    }
                    None => break,
                }
            }

            if chars.peek() == Some(&'"') {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            name.push('"');
                        }
                        Some('"') => break,
                        Some(c) => name.push(c),
                        None => return Err(invalid(s, "unclosed quoted identifier")),
                    }
                }
                if name.is_empty() {
                    return Err(invalid(s, "empty quoted identifier"));
                }
                parts.push(IdentPart::Quoted(name));
                continue;
            }

            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                name.push(c);
                chars.next();
            }
            if !is_plain_ident(&name) {
                return Err(invalid(s, "expected [A-Za-z_][A-Za-z0-9_$]*"));
            }
            parts.push(IdentPart::Unquoted(name));
        }

        Ok(Self { parts })
    }

    /// SQL text for this identifier.
    pub fn to_sql(&self) -> String {
        self.to_string()
    }
}

fn is_plain_ident(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match part {
                IdentPart::Unquoted(name) => f.write_str(name)?,
                IdentPart::Quoted(name) => write!(f, "\"{}\"", name.replace('"', "\"\""))?,
            }
        }
        Ok(())
    }
}

/// Validate `name` and return its SQL text.
pub fn sql_ident(name: &str) -> CrudResult<String> {
    Ident::parse(name).map(|i| i.to_sql())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_dotted_names() {
        assert_eq!(sql_ident("users").unwrap(), "users");
        assert_eq!(sql_ident("public.users").unwrap(), "public.users");
        assert_eq!(sql_ident("created_by").unwrap(), "created_by");
    }

    #[test]
    fn keeps_quoted_parts() {
        let id = Ident::parse(r#"public."User""Table""#).unwrap();
        assert_eq!(id.parts.len(), 2);
        assert_eq!(id.to_sql(), r#"public."User""Table""#);
    }

    #[test]
    fn rejects_injection_attempts() {
        assert!(sql_ident("id; DROP TABLE users").is_err());
        assert!(sql_ident("1abc").is_err());
        assert!(sql_ident("users.").is_err());
        assert!(sql_ident("").is_err());
        assert!(sql_ident("\"open").is_err());
    }
}
