//! Value model - IRIs, blank nodes and literals
//!
//! Values are immutable and equal by content. A literal always carries a
//! lexical form plus exactly one annotation: a language tag or a datatype IRI.
//! Plain literals are normalized to `xsd:string` and language tags to lowercase,
//! so structurally equal inputs intern to the same surrogate id.
//!
//! ## Byte encoding
//!
//! The dictionary persists values with a compact tagged encoding:
//!
//! | Tag | Layout |
//! |-----|--------|
//! | `0x01` IRI | `[tag][utf8 iri]` |
//! | `0x02` blank node | `[tag][utf8 label]` |
//! | `0x03` typed literal | `[tag][lexical len u32 BE][lexical][datatype iri]` |
//! | `0x04` language literal | `[tag][lexical len u32 BE][lexical][language tag]` |

use crate::error::{Error, Result};
use quadstore_vocab::{rdf, xsd};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

const TAG_IRI: u8 = 0x01;
const TAG_BLANK: u8 = 0x02;
const TAG_TYPED: u8 = 0x03;
const TAG_LANG: u8 = 0x04;

/// The single annotation a literal carries
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LiteralAnnotation {
    /// Datatype IRI
    Datatype(Arc<str>),
    /// Language tag (lowercase); the datatype is implicitly `rdf:langString`
    Language(Arc<str>),
}

/// An RDF literal
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    lexical: Arc<str>,
    annotation: LiteralAnnotation,
}

impl Literal {
    /// Literal with an explicit datatype
    pub fn typed(lexical: impl AsRef<str>, datatype: impl AsRef<str>) -> Self {
        Self {
            lexical: Arc::from(lexical.as_ref()),
            annotation: LiteralAnnotation::Datatype(Arc::from(datatype.as_ref())),
        }
    }

    /// Plain string literal (`xsd:string`)
    pub fn string(lexical: impl AsRef<str>) -> Self {
        Self::typed(lexical, xsd::STRING)
    }

    /// Language-tagged literal; the tag is normalized to lowercase
    pub fn lang(lexical: impl AsRef<str>, tag: impl AsRef<str>) -> Self {
        Self {
            lexical: Arc::from(lexical.as_ref()),
            annotation: LiteralAnnotation::Language(Arc::from(
                tag.as_ref().to_ascii_lowercase().as_str(),
            )),
        }
    }

    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    pub fn annotation(&self) -> &LiteralAnnotation {
        &self.annotation
    }

    /// Datatype IRI; `rdf:langString` for language-tagged literals
    pub fn datatype(&self) -> &str {
        match &self.annotation {
            LiteralAnnotation::Datatype(dt) => dt,
            LiteralAnnotation::Language(_) => rdf::LANG_STRING,
        }
    }

    pub fn language(&self) -> Option<&str> {
        match &self.annotation {
            LiteralAnnotation::Language(tag) => Some(tag),
            LiteralAnnotation::Datatype(_) => None,
        }
    }

    /// True for `xsd:string` and language-tagged literals
    pub fn is_string_like(&self) -> bool {
        match &self.annotation {
            LiteralAnnotation::Language(_) => true,
            LiteralAnnotation::Datatype(dt) => dt.as_ref() == xsd::STRING,
        }
    }

    pub fn is_numeric(&self) -> bool {
        xsd::is_numeric(self.datatype())
    }
}

/// A node or literal in a statement
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    Iri(Arc<str>),
    BlankNode(Arc<str>),
    Literal(Literal),
}

impl Value {
    pub fn iri(iri: impl AsRef<str>) -> Self {
        Value::Iri(Arc::from(iri.as_ref()))
    }

    pub fn blank(label: impl AsRef<str>) -> Self {
        Value::BlankNode(Arc::from(label.as_ref()))
    }

    /// Plain string literal
    pub fn string(lexical: impl AsRef<str>) -> Self {
        Value::Literal(Literal::string(lexical))
    }

    pub fn typed(lexical: impl AsRef<str>, datatype: impl AsRef<str>) -> Self {
        Value::Literal(Literal::typed(lexical, datatype))
    }

    pub fn lang(lexical: impl AsRef<str>, tag: impl AsRef<str>) -> Self {
        Value::Literal(Literal::lang(lexical, tag))
    }

    pub fn integer(v: i64) -> Self {
        Value::typed(v.to_string(), xsd::INTEGER)
    }

    pub fn double(v: f64) -> Self {
        Value::typed(v.to_string(), xsd::DOUBLE)
    }

    pub fn boolean(v: bool) -> Self {
        Value::typed(if v { "true" } else { "false" }, xsd::BOOLEAN)
    }

    pub fn is_iri(&self) -> bool {
        matches!(self, Value::Iri(_))
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Value::BlankNode(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Value::Literal(_))
    }

    /// IRIs and blank nodes
    pub fn is_resource(&self) -> bool {
        !self.is_literal()
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Value::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Value::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// String form used by `STR()`: the IRI, blank label, or lexical form
    pub fn as_str(&self) -> &str {
        match self {
            Value::Iri(iri) => iri,
            Value::BlankNode(label) => label,
            Value::Literal(lit) => lit.lexical(),
        }
    }

    /// Encode for dictionary storage
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Value::Iri(iri) => tagged(TAG_IRI, iri.as_bytes()),
            Value::BlankNode(label) => tagged(TAG_BLANK, label.as_bytes()),
            Value::Literal(lit) => {
                let (tag, tail) = match &lit.annotation {
                    LiteralAnnotation::Datatype(dt) => (TAG_TYPED, dt.as_bytes()),
                    LiteralAnnotation::Language(lang) => (TAG_LANG, lang.as_bytes()),
                };
                let lexical = lit.lexical.as_bytes();
                let mut out = Vec::with_capacity(1 + 4 + lexical.len() + tail.len());
                out.push(tag);
                out.extend_from_slice(&(lexical.len() as u32).to_be_bytes());
                out.extend_from_slice(lexical);
                out.extend_from_slice(tail);
                out
            }
        }
    }

    /// Decode bytes written by [`Value::encode`]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (&tag, body) = bytes
            .split_first()
            .ok_or_else(|| Error::corrupt("empty value encoding"))?;
        match tag {
            TAG_IRI => Ok(Value::Iri(Arc::from(utf8(body)?))),
            TAG_BLANK => Ok(Value::BlankNode(Arc::from(utf8(body)?))),
            TAG_TYPED | TAG_LANG => {
                if body.len() < 4 {
                    return Err(Error::corrupt("truncated literal encoding"));
                }
                let len = u32::from_be_bytes([body[0], body[1], body[2], body[3]]) as usize;
                let rest = &body[4..];
                if rest.len() < len {
                    return Err(Error::corrupt("literal lexical form overruns encoding"));
                }
                let lexical: Arc<str> = Arc::from(utf8(&rest[..len])?);
                let tail: Arc<str> = Arc::from(utf8(&rest[len..])?);
                let annotation = if tag == TAG_TYPED {
                    LiteralAnnotation::Datatype(tail)
                } else {
                    LiteralAnnotation::Language(tail)
                };
                Ok(Value::Literal(Literal {
                    lexical,
                    annotation,
                }))
            }
            other => Err(Error::corrupt(format!("unknown value tag 0x{:02x}", other))),
        }
    }
}

fn tagged(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(tag);
    out.extend_from_slice(body);
    out
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| Error::corrupt(format!("invalid utf-8: {}", e)))
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.lexical.escape_default())?;
        match &self.annotation {
            LiteralAnnotation::Language(tag) => write!(f, "@{}", tag),
            LiteralAnnotation::Datatype(dt) if dt.as_ref() == xsd::STRING => Ok(()),
            LiteralAnnotation::Datatype(dt) => write!(f, "^^<{}>", dt),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Iri(iri) => write!(f, "<{}>", iri),
            Value::BlankNode(label) => write!(f, "_:{}", label),
            Value::Literal(lit) => write!(f, "{}", lit),
        }
    }
}

impl From<Literal> for Value {
    fn from(lit: Literal) -> Self {
        Value::Literal(lit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_annotation_is_exclusive() {
        let typed = Literal::typed("42", xsd::INTEGER);
        assert_eq!(typed.datatype(), xsd::INTEGER);
        assert_eq!(typed.language(), None);

        let tagged = Literal::lang("chat", "FR");
        assert_eq!(tagged.language(), Some("fr"));
        assert_eq!(tagged.datatype(), rdf::LANG_STRING);
    }

    #[test]
    fn test_normalization_gives_structural_equality() {
        assert_eq!(Value::lang("hi", "EN"), Value::lang("hi", "en"));
        assert_eq!(Value::string("x"), Value::typed("x", xsd::STRING));
        assert_ne!(Value::iri("x"), Value::blank("x"));
        assert_ne!(Value::iri("x"), Value::string("x"));
    }

    #[test]
    fn test_encode_decode() {
        let values = [
            Value::iri("http://example.org/a"),
            Value::blank("b0"),
            Value::string(""),
            Value::integer(-7),
            Value::lang("bonjour", "fr"),
            Value::typed("caf\u{e9}", "http://example.org/dt"),
        ];
        for v in &values {
            assert_eq!(&Value::decode(&v.encode()).unwrap(), v);
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Value::decode(&[]).is_err());
        assert!(Value::decode(&[0x7f, 1, 2]).is_err());
        assert!(Value::decode(&[TAG_TYPED, 0, 0, 0, 9, b'a']).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::iri("http://x").to_string(), "<http://x>");
        assert_eq!(Value::string("a").to_string(), "\"a\"");
        assert_eq!(Value::lang("a", "en").to_string(), "\"a\"@en");
        assert_eq!(
            Value::integer(1).to_string(),
            format!("\"1\"^^<{}>", xsd::INTEGER)
        );
    }
}
