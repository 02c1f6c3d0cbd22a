use std::borrow::Cow;

/// Escape a filter literal.
///
/// Literal values appearing in an LDAP filter can contain any character,
/// but some characters (parentheses, asterisk, backslash, NUL) must be
/// escaped in the filter's string representation. This function does the
/// escaping.
///
/// The argument, `lit`, can be owned or borrowed. The function doesn't
/// allocate the return value unless there's need to escape the input.
pub fn ldap_escape<'a, S: Into<Cow<'a, str>>>(lit: S) -> Cow<'a, str> {
    #[inline]
    fn needs_escape(c: u8) -> bool {
        c == b'\\' || c == b'*' || c == b'(' || c == b')' || c == 0
    }

    #[inline]
    fn xdigit(c: u8) -> u8 {
        c + if c < 10 { b'0' } else { b'a' - 10 }
    }

    let lit = lit.into();
    let mut output = None;
    for (i, &c) in lit.as_bytes().iter().enumerate() {
        if needs_escape(c) {
            if output.is_none() {
                output = Some(Vec::with_capacity(lit.len() + 12)); // guess: up to 4 escaped chars
                output.as_mut().unwrap().extend(lit[..i].as_bytes());
            }
            let output = output.as_mut().unwrap();
            output.push(b'\\');
            output.push(xdigit(c >> 4));
            output.push(xdigit(c & 0xF));
        } else if let Some(ref mut output) = output {
            output.push(c);
        }
    }
    if let Some(output) = output {
        // unchecked conversion is safe here: we receive a valid
        // UTF-8 value, by definition, and only replace single ASCII
        // bytes with ASCII byte sequences
        Cow::Owned(unsafe { String::from_utf8_unchecked(output) })
    } else {
        lit.into()
    }
}

/// Escape a string for use as an RDN value per RFC 4514.
///
/// Leading/trailing spaces, a leading `#`, and the characters
/// `" + , ; < > \` anywhere in the value must be escaped.
pub fn dn_escape<'a, S: Into<Cow<'a, str>>>(dn: S) -> Cow<'a, str> {
    #[inline]
    fn needs_escape(c: u8) -> bool {
        matches!(c, b'"' | b'+' | b',' | b';' | b'<' | b'>' | b'\\')
    }

    let dn = dn.into();
    let bytes = dn.as_bytes();
    let mut output: Option<Vec<u8>> = None;

    for (i, &c) in bytes.iter().enumerate() {
        let escape = needs_escape(c)
            || (c == b' ' && (i == 0 || i == bytes.len() - 1))
            || (c == b'#' && i == 0);
        if escape {
            let out = output.get_or_insert_with(|| {
                let mut v = Vec::with_capacity(dn.len() + 4);
                v.extend(&bytes[..i]);
                v
            });
            out.push(b'\\');
            out.push(c);
        } else if let Some(ref mut out) = output {
            out.push(c);
        }
    }

    match output {
        Some(out) => Cow::Owned(unsafe { String::from_utf8_unchecked(out) }),
        None => dn,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn escapes_special_filter_characters() {
        assert_eq!(ldap_escape("a(b)c*d\\e"), "a\\28b\\29c\\2ad\\5ce");
    }

    #[test]
    fn leaves_plain_literal_unescaped() {
        assert_eq!(ldap_escape("plain"), "plain");
    }

    #[test]
    fn escapes_leading_and_trailing_space() {
        assert_eq!(dn_escape(" cn=foo "), "\\ cn=foo\\ ");
    }

    #[test]
    fn escapes_leading_hash() {
        assert_eq!(dn_escape("#foo"), "\\#foo");
    }
}
