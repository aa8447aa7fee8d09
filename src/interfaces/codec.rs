//! Codecs
//!
//! A codec turns bytes into a host-side [`Decoded`] tree and back. Codecs
//! never see interpreter cells; the `encode` and `decode` natives convert
//! between [`Decoded`] and values. Each codec is registered for the datatype
//! it decodes to, and a decode yielding anything else is a failure.

use crate::memory::value::Kind;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Host-side shape of decoded data
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Text(String),
    Binary(Vec<u8>),
    Integer(i64),
    Decimal(f64),
    Block(Vec<Decoded>),
}

impl Decoded {
    /// Datatype the tree becomes once converted to a value
    pub fn kind(&self) -> Kind {
        match self {
            Decoded::Text(_) => Kind::Text,
            Decoded::Binary(_) => Kind::Binary,
            Decoded::Integer(_) => Kind::Integer,
            Decoded::Decimal(_) => Kind::Decimal,
            Decoded::Block(_) => Kind::Block,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("malformed input: {0}")]
    Malformed(String),
    #[error("cannot encode {0}")]
    Unsupported(&'static str),
}

pub trait Codec {
    /// Name the codec is registered and looked up under
    fn name(&self) -> &str;

    fn decode(&self, bytes: &[u8]) -> Result<Decoded, CodecError>;

    fn encode(&self, value: &Decoded) -> Result<Vec<u8>, CodecError>;
}

/// UTF-8 text
#[derive(Debug, Default, Clone, Copy)]
pub struct TextCodec;

impl Codec for TextCodec {
    fn name(&self) -> &str {
        "text"
    }

    fn decode(&self, bytes: &[u8]) -> Result<Decoded, CodecError> {
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(Decoded::Text(text.to_string())),
            Err(err) => Err(CodecError::Malformed(format!("invalid UTF-8 at byte {}", err.valid_up_to()))),
        }
    }

    fn encode(&self, value: &Decoded) -> Result<Vec<u8>, CodecError> {
        match value {
            Decoded::Text(text) => Ok(text.as_bytes().to_vec()),
            Decoded::Binary(bytes) => Ok(bytes.clone()),
            Decoded::Integer(n) => Ok(n.to_string().into_bytes()),
            Decoded::Decimal(d) => Ok(d.to_string().into_bytes()),
            Decoded::Block(_) => Err(CodecError::Unsupported("block")),
        }
    }
}

struct Registered {
    kind: Kind,
    codec: Box<dyn Codec>,
}

/// Codecs by name, plus the file extensions that select them
pub struct CodecRegistry {
    codecs: FxHashMap<String, Registered>,
    extensions: FxHashMap<String, String>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        CodecRegistry {
            codecs: FxHashMap::default(),
            extensions: FxHashMap::default(),
        }
    }

    /// Registry with the built-in text codec
    pub fn with_builtins() -> Self {
        let mut registry = CodecRegistry::new();
        registry.register(Kind::Text, &[".txt", ".text"], Box::new(TextCodec));
        registry
    }

    /// Register a codec decoding to `kind` under its name; a later codec
    /// with the same name replaces the earlier one
    pub fn register(&mut self, kind: Kind, extensions: &[&str], codec: Box<dyn Codec>) {
        let name = codec.name().to_lowercase();
        for ext in extensions {
            self.extensions.insert(ext.to_lowercase(), name.clone());
        }
        log::debug!("registered codec {} for {:?}", name, kind);
        self.codecs.insert(name, Registered { kind, codec });
    }

    pub fn get(&self, name: &str) -> Option<&dyn Codec> {
        self.codecs.get(&name.to_lowercase()).map(|entry| entry.codec.as_ref())
    }

    /// Datatype the named codec decodes to
    pub fn kind(&self, name: &str) -> Option<Kind> {
        self.codecs.get(&name.to_lowercase()).map(|entry| entry.kind)
    }

    /// Decode with the named codec, rejecting trees of the wrong datatype.
    /// `None` when no codec has that name.
    pub fn decode(&self, name: &str, bytes: &[u8]) -> Option<Result<Decoded, CodecError>> {
        let entry = self.codecs.get(&name.to_lowercase())?;
        Some(entry.codec.decode(bytes).and_then(|decoded| {
            if decoded.kind() == entry.kind {
                Ok(decoded)
            } else {
                Err(CodecError::Malformed(format!(
                    "decoded {:?} where {:?} was registered",
                    decoded.kind(),
                    entry.kind
                )))
            }
        }))
    }

    /// Name of the codec registered for the extension of `path`
    pub fn for_path(&self, path: &str) -> Option<&str> {
        let dot = path.rfind('.')?;
        let name = self.extensions.get(&path[dot..].to_lowercase())?;
        self.codecs.contains_key(name).then_some(name.as_str())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_codec() {
        let codec = TextCodec;
        assert_eq!(codec.decode(b"hi").unwrap(), Decoded::Text("hi".into()));
        assert!(codec.decode(&[0xff, 0xfe]).is_err());
        assert_eq!(codec.encode(&Decoded::Integer(42)).unwrap(), b"42");
        assert_eq!(codec.encode(&Decoded::Block(vec![])), Err(CodecError::Unsupported("block")));
    }

    #[test]
    fn test_lookup_by_name_and_extension() {
        let registry = CodecRegistry::with_builtins();
        assert!(registry.get("TEXT").is_some());
        assert_eq!(registry.for_path("notes.TXT"), Some("text"));
        assert!(registry.for_path("image.png").is_none());
        assert_eq!(registry.names(), vec!["text"]);
        assert_eq!(registry.kind("text"), Some(Kind::Text));
    }

    /// Decodes every input as the integer 1
    struct One;

    impl Codec for One {
        fn name(&self) -> &str {
            "one"
        }

        fn decode(&self, _: &[u8]) -> Result<Decoded, CodecError> {
            Ok(Decoded::Integer(1))
        }

        fn encode(&self, _: &Decoded) -> Result<Vec<u8>, CodecError> {
            Ok(vec![1])
        }
    }

    #[test]
    fn test_decode_checks_registered_kind() {
        let mut registry = CodecRegistry::new();
        registry.register(Kind::Integer, &[], Box::new(One));
        assert_eq!(registry.decode("one", b"x"), Some(Ok(Decoded::Integer(1))));

        registry.register(Kind::Text, &[], Box::new(One));
        assert!(matches!(registry.decode("one", b"x"), Some(Err(CodecError::Malformed(_)))));
        assert!(registry.decode("missing", b"x").is_none());
    }
}
