//! RFC 4515 filter-string parser: turns a textual filter into the
//! `Filter` wire `Tag` a SearchRequest carries. The filter-string
//! grammar is parsed far enough to build that tree and no further --
//! there's no exposed AST beyond the `Tag` itself.

use lber::common::TagClass;
use lber::structures::{Boolean, ExplicitTag, OctetString, Sequence, Tag};

use nom::branch::alt;
use nom::bytes::complete::{tag as ntag, take_while, take_while1};
use nom::character::complete::{char, digit1};
use nom::character::{is_alphabetic, is_alphanumeric, is_hex_digit};
use nom::combinator::{map, map_res, opt, recognize, verify};
use nom::multi::{fold_many0, many0};
use nom::number::complete::be_u8;
use nom::sequence::{delimited, preceded, tuple};
use nom::IResult;

/// Parse a filter string (e.g. `(&(objectClass=person)(cn=bob*))`) into
/// its wire `Tag`. The caller always gets either a fully consumed
/// parse or an error; no partial results.
pub fn parse(input: &str) -> Result<Tag, ()> {
    match filtexpr(input.as_bytes()) {
        Ok((rest, t)) if rest.is_empty() => Ok(t),
        _ => Err(()),
    }
}

const AND_FILT: u64 = 0;
const OR_FILT: u64 = 1;
const NOT_FILT: u64 = 2;

const EQ_MATCH: u64 = 3;
const SUBSTR_MATCH: u64 = 4;
const GTE_MATCH: u64 = 5;
const LTE_MATCH: u64 = 6;
const PRES_MATCH: u64 = 7;
const APPROX_MATCH: u64 = 8;
const EXT_MATCH: u64 = 9;

const SUB_INITIAL: u64 = 0;
const SUB_ANY: u64 = 1;
const SUB_FINAL: u64 = 2;

fn filtexpr(i: &[u8]) -> IResult<&[u8], Tag> {
    alt((filter, item))(i)
}

fn filter(i: &[u8]) -> IResult<&[u8], Tag> {
    delimited(char('('), filtercomp, char(')'))(i)
}

fn filtercomp(i: &[u8]) -> IResult<&[u8], Tag> {
    alt((and, or, not, item))(i)
}

fn filterlist(i: &[u8]) -> IResult<&[u8], Vec<Tag>> {
    many0(filter)(i)
}

fn and(i: &[u8]) -> IResult<&[u8], Tag> {
    map(preceded(char('&'), filterlist), |tagv: Vec<Tag>| {
        Tag::Sequence(Sequence {
            class: TagClass::Context,
            id: AND_FILT,
            inner: tagv,
        })
    })(i)
}

fn or(i: &[u8]) -> IResult<&[u8], Tag> {
    map(preceded(char('|'), filterlist), |tagv: Vec<Tag>| {
        Tag::Sequence(Sequence {
            class: TagClass::Context,
            id: OR_FILT,
            inner: tagv,
        })
    })(i)
}

fn not(i: &[u8]) -> IResult<&[u8], Tag> {
    map(preceded(char('!'), filter), |tag: Tag| {
        Tag::ExplicitTag(ExplicitTag {
            class: TagClass::Context,
            id: NOT_FILT,
            inner: Box::new(tag),
        })
    })(i)
}

fn item(i: &[u8]) -> IResult<&[u8], Tag> {
    alt((eq, non_eq, extensible))(i)
}

pub(crate) enum Unescaper {
    WantFirst,
    WantSecond(u8),
    Value(u8),
    Error,
}

fn hex_val(c: u8) -> u8 {
    c - if c <= b'9' { b'0' } else { (c & 0x20) + b'A' - 10 }
}

impl Unescaper {
    pub(crate) fn feed(&self, c: u8) -> Unescaper {
        match *self {
            Unescaper::Error => Unescaper::Error,
            Unescaper::WantFirst => {
                if is_hex_digit(c) {
                    Unescaper::WantSecond(hex_val(c))
                } else {
                    Unescaper::Error
                }
            }
            Unescaper::WantSecond(partial) => {
                if is_hex_digit(c) {
                    Unescaper::Value((partial << 4) + hex_val(c))
                } else {
                    Unescaper::Error
                }
            }
            Unescaper::Value(_v) => {
                if c != b'\\' {
                    Unescaper::Value(c)
                } else {
                    Unescaper::WantFirst
                }
            }
        }
    }
}

// Any byte in the assertion value may be represented by \NN, where N is
// a hex digit. Some characters must be represented this way:
// parentheses, asterisk and backslash itself.
fn unescaped(i: &[u8]) -> IResult<&[u8], Vec<u8>> {
    map_res(
        fold_many0(
            verify(be_u8, |c: &u8| is_value_char(*c)),
            || (Unescaper::Value(0), Vec::new()),
            |(mut u, mut vec): (Unescaper, Vec<u8>), c: u8| {
                u = u.feed(c);
                if let Unescaper::Value(c) = u {
                    vec.push(c);
                }
                (u, vec)
            },
        ),
        |(u, vec): (Unescaper, Vec<u8>)| -> Result<Vec<u8>, ()> {
            if let Unescaper::Value(_) = u {
                Ok(vec)
            } else {
                Err(())
            }
        },
    )(i)
}

fn non_eq(i: &[u8]) -> IResult<&[u8], Tag> {
    map(
        tuple((
            attributedescription,
            alt((ntag(">="), ntag("<="), ntag("~="))),
            unescaped,
        )),
        |(attr, filterop, value): (&[u8], &[u8], Vec<u8>)| {
            Tag::Sequence(Sequence {
                class: TagClass::Context,
                id: filtertag(filterop),
                inner: vec![
                    Tag::OctetString(OctetString {
                        inner: attr.to_vec(),
                        ..Default::default()
                    }),
                    Tag::OctetString(OctetString {
                        inner: value,
                        ..Default::default()
                    }),
                ],
            })
        },
    )(i)
}

fn filtertag(filterop: &[u8]) -> u64 {
    match filterop {
        b">=" => GTE_MATCH,
        b"<=" => LTE_MATCH,
        b"~=" => APPROX_MATCH,
        _ => unreachable!(),
    }
}

fn eq(i: &[u8]) -> IResult<&[u8], Tag> {
    let (i, attr) = attributedescription(i)?;
    let (i, _) = char('=')(i)?;
    let (i, initial) = unescaped(i)?;
    let (i, mid_final) = map_res(
        many0(preceded(ntag("*"), unescaped)),
        |v: Vec<Vec<u8>>| -> Result<Vec<Vec<u8>>, ()> {
            // An empty element may exist only at the very end; otherwise
            // we have two adjacent asterisks.
            if v.iter()
                .enumerate()
                .any(|(n, ve)| ve.is_empty() && n + 1 != v.len())
            {
                Err(())
            } else {
                Ok(v)
            }
        },
    )(i)?;

    let tag = if mid_final.is_empty() {
        // Simple equality, no asterisks in the assertion value.
        Tag::Sequence(Sequence {
            class: TagClass::Context,
            id: EQ_MATCH,
            inner: vec![
                Tag::OctetString(OctetString {
                    inner: attr.to_vec(),
                    ..Default::default()
                }),
                Tag::OctetString(OctetString {
                    inner: initial,
                    ..Default::default()
                }),
            ],
        })
    } else if initial.is_empty() && mid_final.len() == 1 && mid_final[0].is_empty() {
        // Presence: a single bare asterisk in the assertion value.
        Tag::OctetString(OctetString {
            class: TagClass::Context,
            id: PRES_MATCH,
            inner: attr.to_vec(),
        })
    } else {
        let mut inner = vec![];
        if !initial.is_empty() {
            inner.push(Tag::OctetString(OctetString {
                class: TagClass::Context,
                id: SUB_INITIAL,
                inner: initial,
            }));
        }
        let n = mid_final.len();
        for (idx, sub_elem) in mid_final.into_iter().enumerate() {
            if sub_elem.is_empty() {
                break;
            }
            inner.push(Tag::OctetString(OctetString {
                class: TagClass::Context,
                id: if idx + 1 != n { SUB_ANY } else { SUB_FINAL },
                inner: sub_elem,
            }));
        }
        Tag::Sequence(Sequence {
            class: TagClass::Context,
            id: SUBSTR_MATCH,
            inner: vec![
                Tag::OctetString(OctetString {
                    inner: attr.to_vec(),
                    ..Default::default()
                }),
                Tag::Sequence(Sequence {
                    inner,
                    ..Default::default()
                }),
            ],
        })
    };
    Ok((i, tag))
}

fn is_value_char(c: u8) -> bool {
    c != 0 && c != b'(' && c != b')' && c != b'*'
}

fn extensible(i: &[u8]) -> IResult<&[u8], Tag> {
    alt((attr_dn_mrule, dn_mrule))(i)
}

fn attr_dn_mrule(i: &[u8]) -> IResult<&[u8], Tag> {
    map(
        tuple((
            attributedescription,
            opt(ntag(":dn")),
            opt(preceded(char(':'), attributetype)),
            ntag(":="),
            unescaped,
        )),
        |(attr, dn, mrule, _, value)| extensible_tag(mrule, Some(attr), value, dn.is_some()),
    )(i)
}

fn dn_mrule(i: &[u8]) -> IResult<&[u8], Tag> {
    map(
        tuple((
            opt(ntag(":dn")),
            preceded(char(':'), attributetype),
            ntag(":="),
            unescaped,
        )),
        |(dn, mrule, _, value)| extensible_tag(Some(mrule), None, value, dn.is_some()),
    )(i)
}

fn extensible_tag(mrule: Option<&[u8]>, attr: Option<&[u8]>, value: Vec<u8>, dn: bool) -> Tag {
    let mut inner = vec![];
    if let Some(mrule) = mrule {
        inner.push(Tag::OctetString(OctetString {
            class: TagClass::Context,
            id: 1,
            inner: mrule.to_vec(),
        }));
    }
    if let Some(attr) = attr {
        inner.push(Tag::OctetString(OctetString {
            class: TagClass::Context,
            id: 2,
            inner: attr.to_vec(),
        }));
    }
    inner.push(Tag::OctetString(OctetString {
        class: TagClass::Context,
        id: 3,
        inner: value,
    }));
    if dn {
        inner.push(Tag::Boolean(Boolean {
            class: TagClass::Context,
            id: 4,
            inner: dn,
        }));
    }
    Tag::Sequence(Sequence {
        class: TagClass::Context,
        id: EXT_MATCH,
        inner,
    })
}

fn attributedescription(i: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(tuple((
        attributetype,
        many0(preceded(char(';'), take_while1(is_alnum_hyphen))),
    )))(i)
}

fn attributetype(i: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((numericoid, descr))(i)
}

fn numericoid(i: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(tuple((number, many0(preceded(char('.'), number)))))(i)
}

// A number may be zero, but must not have superfluous leading zeroes.
fn number(i: &[u8]) -> IResult<&[u8], &[u8]> {
    verify(digit1, |d: &[u8]| d.len() == 1 || d[0] != b'0')(i)
}

fn descr(i: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(tuple((
        verify(be_u8, |c: &u8| is_alphabetic(*c)),
        take_while(is_alnum_hyphen),
    )))(i)
}

fn is_alnum_hyphen(c: u8) -> bool {
    is_alphanumeric(c) || c == b'-'
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_simple_equality() {
        let tag = parse("(cn=bob)").unwrap();
        match tag {
            Tag::Sequence(s) => assert_eq!(s.id, EQ_MATCH),
            _ => panic!("expected a Sequence"),
        }
    }

    #[test]
    fn parses_presence() {
        let tag = parse("(objectClass=*)").unwrap();
        match tag {
            Tag::OctetString(o) => assert_eq!(o.id, PRES_MATCH),
            _ => panic!("expected an OctetString"),
        }
    }

    #[test]
    fn parses_and_of_two_terms() {
        let tag = parse("(&(cn=bob)(sn=smith))").unwrap();
        match tag {
            Tag::Sequence(s) => {
                assert_eq!(s.id, AND_FILT);
                assert_eq!(s.inner.len(), 2);
            }
            _ => panic!("expected a Sequence"),
        }
    }

    #[test]
    fn parses_substring_with_escape() {
        let tag = parse(r"(cn=bob\2a*smith)").unwrap();
        match tag {
            Tag::Sequence(s) => assert_eq!(s.id, SUBSTR_MATCH),
            _ => panic!("expected a Sequence"),
        }
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse("(cn=bob))").is_err());
    }

    #[test]
    fn rejects_unbalanced_substring() {
        assert!(parse(r"(cn=**)").is_err());
    }
}
