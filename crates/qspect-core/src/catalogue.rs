//! # Layout Descriptor Catalogue
//!
//! The name → decoder registry.
//!
//! The catalogue is an explicitly constructed, immutable value passed into
//! every decode entry point — never a module-level singleton — so the core
//! stays testable without a live host. Hosts rebuild it fresh per session;
//! there is nothing to persist.
//!
//! Matching is first exact-name, then template pattern (the declared name
//! truncated before its first `<`). Exactly one entry may match a given
//! name; an ambiguous registration is a construction-time defect and trips a
//! debug assertion, not a runtime error. An unmatched name is the expected,
//! recoverable [`DecodeError::UnknownType`] outcome — the host falls back to
//! its own generic rendering.

use std::collections::HashMap;

use tracing::trace;

use crate::decoders::datetime::{QDateDecoder, QDateTimeDecoder, QTimeDecoder, QTimeZoneDecoder};
use crate::decoders::hash::{QHashDecoder, QMultiHashDecoder, QSetDecoder};
use crate::decoders::list::QListDecoder;
use crate::decoders::map::QMapDecoder;
use crate::decoders::model::QPersistentModelIndexDecoder;
use crate::decoders::text::{QByteArrayDecoder, QCharDecoder, QStringDecoder, StringViewDecoder, ViewEncoding};
use crate::decoders::url::QUrlDecoder;
use crate::decoders::variant::QVariantDecoder;
use crate::decoders::{DecodeContext, Decoder};
use crate::error::{DecodeError, DecodeResult};
use crate::memory::{MemoryAccess, TypedRef};
use crate::render::Rendered;

/// How a catalogue entry matches a declared type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchRule
{
    /// The declared name must equal this exactly
    Exact(String),
    /// The declared name, truncated before its first `<`, must equal this
    /// (`QHash` matches `QHash<int,QString>`)
    Template(String),
}

struct Entry
{
    label: String,
    decoder: Box<dyn Decoder>,
}

/// Immutable registry mapping declared type names to decoders.
pub struct Catalogue
{
    entries: Vec<Entry>,
    exact: HashMap<String, usize>,
    templates: HashMap<String, usize>,
}

impl Catalogue
{
    /// An empty catalogue. Mostly useful in tests; hosts want
    /// [`Catalogue::qt6`].
    pub fn new() -> Self
    {
        Self {
            entries: Vec::new(),
            exact: HashMap::new(),
            templates: HashMap::new(),
        }
    }

    /// Register a decoder under a human label and a match rule.
    ///
    /// Registration order does not affect matching; rules must be mutually
    /// exclusive by construction, and a duplicate rule trips a debug
    /// assertion.
    pub fn register(&mut self, label: impl Into<String>, rule: MatchRule, decoder: Box<dyn Decoder>)
    {
        let index = self.entries.len();
        self.entries.push(Entry {
            label: label.into(),
            decoder,
        });
        let previous = match rule {
            MatchRule::Exact(name) => self.exact.insert(name, index),
            MatchRule::Template(prefix) => self.templates.insert(prefix, index),
        };
        debug_assert!(previous.is_none(), "ambiguous catalogue registration");
    }

    /// The full Qt6 catalogue.
    pub fn qt6() -> Self
    {
        let mut catalogue = Self::new();
        catalogue.register("QByteArray", MatchRule::Exact("QByteArray".into()), Box::new(QByteArrayDecoder));
        catalogue.register("QChar", MatchRule::Exact("QChar".into()), Box::new(QCharDecoder));
        catalogue.register(
            "QLatin1String",
            MatchRule::Exact("QLatin1String".into()),
            Box::new(StringViewDecoder::new(ViewEncoding::Latin1)),
        );
        catalogue.register("QString", MatchRule::Exact("QString".into()), Box::new(QStringDecoder));
        catalogue.register(
            "QStringView",
            MatchRule::Exact("QStringView".into()),
            Box::new(StringViewDecoder::new(ViewEncoding::Utf16)),
        );
        catalogue.register(
            "QUtf8StringView",
            MatchRule::Exact("QUtf8StringView".into()),
            Box::new(StringViewDecoder::new(ViewEncoding::Utf8)),
        );
        catalogue.register("QList<>", MatchRule::Template("QList".into()), Box::new(QListDecoder));
        catalogue.register("QHash<>", MatchRule::Template("QHash".into()), Box::new(QHashDecoder));
        catalogue.register(
            "QMultiHash<>",
            MatchRule::Template("QMultiHash".into()),
            Box::new(QMultiHashDecoder),
        );
        catalogue.register("QSet<>", MatchRule::Template("QSet".into()), Box::new(QSetDecoder));
        catalogue.register("QMap<>", MatchRule::Template("QMap".into()), Box::new(QMapDecoder));
        catalogue.register("QDate", MatchRule::Exact("QDate".into()), Box::new(QDateDecoder));
        catalogue.register("QTime", MatchRule::Exact("QTime".into()), Box::new(QTimeDecoder));
        catalogue.register("QDateTime", MatchRule::Exact("QDateTime".into()), Box::new(QDateTimeDecoder));
        catalogue.register("QTimeZone", MatchRule::Exact("QTimeZone".into()), Box::new(QTimeZoneDecoder));
        catalogue.register("QUrl", MatchRule::Exact("QUrl".into()), Box::new(QUrlDecoder));
        catalogue.register("QVariant", MatchRule::Exact("QVariant".into()), Box::new(QVariantDecoder));
        catalogue.register(
            "QPersistentModelIndex",
            MatchRule::Exact("QPersistentModelIndex".into()),
            Box::new(QPersistentModelIndexDecoder),
        );
        catalogue
    }

    /// Resolve a declared type name to its decoder.
    pub fn resolve(&self, name: &str) -> Option<&dyn Decoder>
    {
        if let Some(&index) = self.exact.get(name) {
            return Some(self.entries[index].decoder.as_ref());
        }
        let base = match name.find('<') {
            Some(pos) => &name[..pos],
            None => name,
        };
        self.templates.get(base).map(|&index| self.entries[index].decoder.as_ref())
    }

    /// Decode one typed reference.
    ///
    /// ## Errors
    ///
    /// Only [`DecodeError::UnknownType`]; everything downstream degrades to
    /// a placeholder display string instead of erroring.
    pub fn decode<'m>(&'m self, mem: &'m dyn MemoryAccess, value: &TypedRef) -> DecodeResult<Rendered<'m>>
    {
        let decoder = self
            .resolve(&value.ty.name)
            .ok_or_else(|| DecodeError::UnknownType(value.ty.name.clone()))?;
        trace!(ty = %value.ty.name, addr = format_args!("{:#x}", value.addr), "decode");
        let ctx = DecodeContext {
            mem,
            catalogue: self,
        };
        Ok(decoder.decode(ctx, value))
    }

    /// Human labels of all registered entries, in registration order.
    pub fn labels(&self) -> impl Iterator<Item = &str>
    {
        self.entries.iter().map(|entry| entry.label.as_str())
    }
}

impl Default for Catalogue
{
    fn default() -> Self
    {
        Self::qt6()
    }
}
