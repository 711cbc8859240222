//! One-dimensional array literals in the host's text form: `{a,"b c",NULL}`.

fn needs_quotes(item: &str) -> bool {
    item.is_empty()
        || item.eq_ignore_ascii_case("NULL")
        || item
            .chars()
            .any(|c| matches!(c, '{' | '}' | ',' | '"' | '\\') || c.is_whitespace())
}

pub fn format_array_literal<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut out = String::from("{");
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        match item {
            None => out.push_str("NULL"),
            Some(s) if needs_quotes(s) => {
                out.push('"');
                for c in s.chars() {
                    if c == '"' || c == '\\' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push('"');
            }
            Some(s) => out.push_str(s),
        }
    }
    out.push('}');
    out
}

/// Returns `None` for malformed input. Unquoted `NULL` is SQL NULL.
pub fn parse_array_literal(text: &str) -> Option<Vec<Option<String>>> {
    let inner = text.trim().strip_prefix('{')?.strip_suffix('}')?;
    let mut items = Vec::new();
    if inner.trim().is_empty() {
        return Some(items);
    }

    let mut chars = inner.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        if chars.peek() == Some(&'"') {
            chars.next();
            let mut value = String::new();
            loop {
                match chars.next()? {
                    '\\' => value.push(chars.next()?),
                    '"' => break,
                    c => value.push(c),
                }
            }
            items.push(Some(value));
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
        } else {
            let mut value = String::new();
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                if matches!(c, '"' | '{' | '}') {
                    return None;
                }
                value.push(c);
                chars.next();
            }
            let value = value.trim();
            if value.is_empty() {
                return None;
            }
            if value.eq_ignore_ascii_case("NULL") {
                items.push(None);
            } else {
                items.push(Some(value.to_string()));
            }
        }

        match chars.next() {
            Some(',') => continue,
            None => break,
            Some(_) => return None,
        }
    }

    Some(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_quotes_special_items() {
        let literal = format_array_literal(vec![
            Some("plain"),
            Some("with space"),
            None,
            Some("say \"hi\""),
            Some(""),
        ]);
        assert_eq!(literal, r#"{plain,"with space",NULL,"say \"hi\"",""}"#);
    }

    #[test]
    fn test_parse_array_literal() {
        let items = parse_array_literal(r#"{1, "two, three" ,NULL,"NULL"}"#).unwrap();
        assert_eq!(
            items,
            vec![
                Some("1".to_string()),
                Some("two, three".to_string()),
                None,
                Some("NULL".to_string()),
            ]
        );
        assert_eq!(parse_array_literal("{}").unwrap(), Vec::<Option<String>>::new());
        assert!(parse_array_literal("1,2").is_none());
        assert!(parse_array_literal("{1,,2}").is_none());
        assert!(parse_array_literal(r#"{"open}"#).is_none());
    }
}
