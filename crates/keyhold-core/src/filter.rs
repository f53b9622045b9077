//! Directory search-filter grammar
//!
//! A strict RFC 4515 reader used to reject malformed user and group filters
//! before any directory connection is attempted. Assertion values are kept
//! in their escaped wire form.

use thiserror::Error;

/// Deepest allowed nesting of `&`, `|` and `!`
pub const MAX_DEPTH: usize = 64;

/// Parsed search filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Equality {
        attr: String,
        value: String,
    },
    Approx {
        attr: String,
        value: String,
    },
    GreaterOrEqual {
        attr: String,
        value: String,
    },
    LessOrEqual {
        attr: String,
        value: String,
    },
    Present {
        attr: String,
    },
    Substring {
        attr: String,
        initial: Option<String>,
        any: Vec<String>,
        last: Option<String>,
    },
    Extensible {
        attr: Option<String>,
        dn_attributes: bool,
        rule: Option<String>,
        value: String,
    },
}

impl Filter {
    /// Number of leaf assertions in the filter
    pub fn assertion_count(&self) -> usize {
        match self {
            Filter::And(items) | Filter::Or(items) => {
                items.iter().map(Filter::assertion_count).sum()
            }
            Filter::Not(inner) => inner.assertion_count(),
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {position}")]
pub struct FilterError {
    pub position: usize,
    pub message: String,
}

impl FilterError {
    fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Parse a search filter
pub fn parse(input: &str) -> Result<Filter, FilterError> {
    if input.is_empty() {
        return Err(FilterError::new(0, "filter is empty"));
    }

    let mut parser = Parser {
        src: input,
        bytes: input.as_bytes(),
        pos: 0,
        depth: 0,
    };

    let filter = parser.filter()?;
    if parser.pos != parser.bytes.len() {
        return Err(FilterError::new(parser.pos, "unexpected input after filter"));
    }

    Ok(filter)
}

/// Check a filter without keeping the parse tree
pub fn validate(input: &str) -> Result<(), FilterError> {
    parse(input).map(|_| ())
}

/// Whether `name` is a well-formed attribute description
pub fn is_attribute_name(name: &str) -> bool {
    let mut parser = Parser {
        src: name,
        bytes: name.as_bytes(),
        pos: 0,
        depth: 0,
    };
    parser.attribute_description().is_ok() && parser.pos == name.len()
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<(), FilterError> {
        match self.peek() {
            Some(b) if b == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(FilterError::new(
                self.pos,
                format!("expected '{}'", byte as char),
            )),
            None => Err(FilterError::new(
                self.pos,
                format!("unexpected end of filter, expected '{}'", byte as char),
            )),
        }
    }

    fn filter(&mut self) -> Result<Filter, FilterError> {
        self.expect(b'(')?;

        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FilterError::new(self.pos, "filter is nested too deeply"));
        }

        let filter = match self.peek() {
            Some(b'&') => {
                self.pos += 1;
                Filter::And(self.filter_list()?)
            }
            Some(b'|') => {
                self.pos += 1;
                Filter::Or(self.filter_list()?)
            }
            Some(b'!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.filter()?))
            }
            Some(_) => self.item()?,
            None => return Err(FilterError::new(self.pos, "unexpected end of filter")),
        };

        self.expect(b')')?;
        self.depth -= 1;

        Ok(filter)
    }

    fn filter_list(&mut self) -> Result<Vec<Filter>, FilterError> {
        let mut filters = Vec::new();
        while self.peek() == Some(b'(') {
            filters.push(self.filter()?);
        }

        if filters.is_empty() {
            return Err(FilterError::new(
                self.pos,
                "expected at least one nested filter",
            ));
        }

        Ok(filters)
    }

    fn item(&mut self) -> Result<Filter, FilterError> {
        if self.peek() == Some(b':') {
            return self.extensible(None);
        }

        let attr = self.attribute_description()?;

        match self.peek() {
            Some(b'=') => {
                self.pos += 1;
                self.equality_or_substring(attr)
            }
            Some(b'~') => {
                self.pos += 1;
                self.expect(b'=')?;
                let value = self.value(false)?;
                Ok(Filter::Approx { attr, value })
            }
            Some(b'>') => {
                self.pos += 1;
                self.expect(b'=')?;
                let value = self.value(false)?;
                Ok(Filter::GreaterOrEqual { attr, value })
            }
            Some(b'<') => {
                self.pos += 1;
                self.expect(b'=')?;
                let value = self.value(false)?;
                Ok(Filter::LessOrEqual { attr, value })
            }
            Some(b':') => self.extensible(Some(attr)),
            _ => Err(FilterError::new(
                self.pos,
                "expected a comparison operator after attribute",
            )),
        }
    }

    fn equality_or_substring(&mut self, attr: String) -> Result<Filter, FilterError> {
        let start = self.pos;
        let raw = self.value(true)?;

        if !raw.contains('*') {
            return Ok(Filter::Equality { attr, value: raw });
        }
        if raw == "*" {
            return Ok(Filter::Present { attr });
        }

        let parts: Vec<&str> = raw.split('*').collect();
        let last_index = parts.len() - 1;

        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() && i != 0 && i != last_index {
                return Err(FilterError::new(
                    start,
                    "empty substring between '*' wildcards",
                ));
            }
        }

        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

        Ok(Filter::Substring {
            attr,
            initial: non_empty(parts[0]),
            any: parts[1..last_index].iter().map(|s| s.to_string()).collect(),
            last: non_empty(parts[last_index]),
        })
    }

    fn extensible(&mut self, attr: Option<String>) -> Result<Filter, FilterError> {
        let mut dn_attributes = false;
        let mut rule = None;

        loop {
            self.expect(b':')?;

            if self.peek() == Some(b'=') {
                self.pos += 1;
                break;
            }

            if !dn_attributes && rule.is_none() && self.at_dn_marker() {
                self.pos += 2;
                dn_attributes = true;
                continue;
            }

            if rule.is_none() {
                rule = Some(self.oid()?);
                continue;
            }

            return Err(FilterError::new(self.pos, "malformed extensible match"));
        }

        if attr.is_none() && rule.is_none() {
            return Err(FilterError::new(
                self.pos,
                "extensible match without an attribute needs a matching rule",
            ));
        }

        let value = self.value(false)?;

        Ok(Filter::Extensible {
            attr,
            dn_attributes,
            rule,
            value,
        })
    }

    fn at_dn_marker(&self) -> bool {
        let rest = &self.bytes[self.pos..];
        rest.len() >= 3 && rest[..2].eq_ignore_ascii_case(b"dn") && rest[2] == b':'
    }

    fn attribute_description(&mut self) -> Result<String, FilterError> {
        let start = self.pos;
        self.oid()?;

        while self.peek() == Some(b';') {
            self.pos += 1;
            let option_start = self.pos;
            while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'-') {
                self.pos += 1;
            }
            if self.pos == option_start {
                return Err(FilterError::new(self.pos, "empty attribute option"));
            }
        }

        Ok(self.src[start..self.pos].to_string())
    }

    /// keystring or numeric OID
    fn oid(&mut self) -> Result<String, FilterError> {
        let start = self.pos;

        match self.peek() {
            Some(b) if b.is_ascii_alphabetic() => {
                while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'-') {
                    self.pos += 1;
                }
            }
            Some(b) if b.is_ascii_digit() => loop {
                let number_start = self.pos;
                while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                    self.pos += 1;
                }
                if self.pos == number_start {
                    return Err(FilterError::new(self.pos, "malformed numeric OID"));
                }
                if self.peek() == Some(b'.') {
                    self.pos += 1;
                } else {
                    break;
                }
            },
            Some(_) => {
                return Err(FilterError::new(self.pos, "expected an attribute name"));
            }
            None => {
                return Err(FilterError::new(self.pos, "unexpected end of filter"));
            }
        }

        Ok(self.src[start..self.pos].to_string())
    }

    /// Reads an assertion value up to the closing parenthesis
    fn value(&mut self, allow_wildcard: bool) -> Result<String, FilterError> {
        let start = self.pos;

        while let Some(b) = self.peek() {
            match b {
                b')' => break,
                b'(' => {
                    return Err(FilterError::new(self.pos, "unescaped '(' in value"));
                }
                0 => return Err(FilterError::new(self.pos, "NUL byte in value")),
                b'*' if !allow_wildcard => {
                    return Err(FilterError::new(self.pos, "unexpected '*' in value"));
                }
                b'\\' => {
                    let hex = self.bytes.get(self.pos + 1..self.pos + 3);
                    match hex {
                        Some(pair) if pair.iter().all(u8::is_ascii_hexdigit) => self.pos += 3,
                        _ => {
                            return Err(FilterError::new(
                                self.pos,
                                "'\\' must be followed by two hex digits",
                            ));
                        }
                    }
                }
                _ => self.pos += 1,
            }
        }

        Ok(self.src[start..self.pos].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_console_sample_filters() {
        let users = parse("(|(objectClass=person)(objectClass=user)(objectClass=inetOrgPerson))")
            .unwrap();
        assert_eq!(users.assertion_count(), 3);

        let groups = parse("(&(objectClass=group)(|(cn=ship_crew)(cn=admin_staff)))").unwrap();
        match groups {
            Filter::And(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[1], Filter::Or(_)));
            }
            other => panic!("unexpected filter: {:?}", other),
        }
    }

    #[test]
    fn test_accepts_rfc_examples() {
        for filter in [
            "(cn=Babs Jensen)",
            "(!(cn=Tim Howes))",
            "(&(objectClass=Person)(|(sn=Jensen)(cn=Babs J*)))",
            "(o=univ*of*mich*)",
            "(seeAlso=)",
            "(cn:caseExactMatch:=Fred Flintstone)",
            "(cn:=Betty Rubble)",
            "(sn:dn:2.4.6.8.10:=Barney Rubble)",
            "(o:dn:=Ace Industry)",
            "(:1.2.3:=Wilma Flintstone)",
            "(:DN:2.4.6.8.10:=Dino)",
            "(o=Parens R Us \\28for all your parenthetical needs\\29)",
            "(cn=*\\2A*)",
            "(filename=C:\\5cMyFile)",
            "(userAccountControl:1.2.840.113556.1.4.803:=2)",
            "(memberOf=cn=admins,ou=groups,dc=example,dc=com)",
            "(cn;lang-en=Babs)",
            "(2.5.4.3=Babs)",
            "(createTimestamp>=20240101000000Z)",
            "(uidNumber<=1000)",
            "(sn~=Jenson)",
        ] {
            assert!(parse(filter).is_ok(), "should accept {}", filter);
        }
    }

    #[test]
    fn test_presence_and_substrings() {
        assert_eq!(
            parse("(mail=*)").unwrap(),
            Filter::Present {
                attr: "mail".to_string()
            }
        );

        assert_eq!(
            parse("(cn=a*b*c)").unwrap(),
            Filter::Substring {
                attr: "cn".to_string(),
                initial: Some("a".to_string()),
                any: vec!["b".to_string()],
                last: Some("c".to_string()),
            }
        );

        assert_eq!(
            parse("(cn=*son)").unwrap(),
            Filter::Substring {
                attr: "cn".to_string(),
                initial: None,
                any: vec![],
                last: Some("son".to_string()),
            }
        );
    }

    #[test]
    fn test_rejects_malformed_filters() {
        for filter in [
            "",
            "objectClass=person",
            " (cn=x)",
            "(cn=x",
            "(cn=x))",
            "(cn=x)(sn=y)",
            "(&)",
            "(|)",
            "(!)",
            "((cn=x))",
            "(cn=a(b)",
            "(cn=\\zz)",
            "(cn=\\2)",
            "(cn=a**b)",
            "(=x)",
            "(cn>x)",
            "(1cn=x)",
            "(cn~=a*)",
            "(cn;=x)",
            "(:=x)",
            "(cn:rule:extra:=x)",
            "(|(objectClass=person)(objectClass=user)",
        ] {
            assert!(parse(filter).is_err(), "should reject {:?}", filter);
        }
    }

    #[test]
    fn test_error_reports_offset() {
        let err = parse("(cn=x").unwrap_err();
        assert_eq!(err.position, 5);

        let err = parse("(&(cn=x)(sn=\\q1))").unwrap_err();
        assert_eq!(err.position, 12);
        assert!(err.to_string().contains("hex digits"));
    }

    #[test]
    fn test_attribute_names() {
        assert!(is_attribute_name("uid"));
        assert!(is_attribute_name("userPrincipalName"));
        assert!(is_attribute_name("x-custom-attr"));
        assert!(is_attribute_name("cn;lang-de"));
        assert!(is_attribute_name("2.5.4.3"));
        assert!(!is_attribute_name(""));
        assert!(!is_attribute_name("given name"));
        assert!(!is_attribute_name("mail="));
        assert!(!is_attribute_name("_uid"));
    }

    #[test]
    fn test_nesting_limit() {
        let ok = format!("{}(cn=x){}", "(!".repeat(MAX_DEPTH - 1), ")".repeat(MAX_DEPTH - 1));
        assert!(validate(&ok).is_ok());

        let too_deep = format!("{}(cn=x){}", "(!".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert!(validate(&too_deep).is_err());
    }
}
