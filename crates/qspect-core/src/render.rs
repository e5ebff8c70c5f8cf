//! # Rendered Output
//!
//! What a decode call hands back to the inspection host.
//!
//! Every decode produces a display string. Container decoders additionally
//! produce a child count and a lazy sequence of labelled child references;
//! the host pulls children one at a time and re-dispatches each through the
//! catalogue. A pulled-apart sequence holds a live cursor into the frozen
//! memory image and is restartable only by decoding again from scratch.

use crate::memory::TypedRef;

/// Hint for how the host should present a decoded value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayHint
{
    /// The display string is the value itself (strings, URLs); hosts
    /// typically quote it and suppress structural noise.
    String,
    /// The value is structural; the display string is a summary and the
    /// children carry the content.
    Structured,
}

/// One labelled child of a decoded container
///
/// The label is `"[i]"` for sequential containers and a bare stringified
/// running index for associative ones. The child itself is a typed reference
/// the host feeds back into the catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child
{
    /// Host-facing label for this child
    pub label: String,
    /// Reference to the child value in inspected memory
    pub value: TypedRef,
}

impl Child
{
    /// Create a child with the given label.
    pub fn new(label: impl Into<String>, value: TypedRef) -> Self
    {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Result of decoding one value
///
/// The lifetime ties any lazy child cursor to the memory facade it reads
/// from; the host must finish (or drop) the sequence before the facade goes
/// away.
pub struct Rendered<'m>
{
    /// Display string; always present, even for failed decodes (which
    /// surface an explicit placeholder token instead)
    pub display: String,
    /// Optional presentation hint
    pub hint: Option<DisplayHint>,
    /// Number of children the sequence will yield, when known up front
    pub num_children: Option<usize>,
    /// Lazy child sequence; `None` for leaf values
    pub children: Option<Box<dyn Iterator<Item = Child> + 'm>>,
}

impl<'m> Rendered<'m>
{
    /// A leaf value with no children and no hint.
    pub fn display(display: impl Into<String>) -> Self
    {
        Self {
            display: display.into(),
            hint: None,
            num_children: None,
            children: None,
        }
    }

    /// A string-like leaf value.
    pub fn text(display: impl Into<String>) -> Self
    {
        Self {
            display: display.into(),
            hint: Some(DisplayHint::String),
            num_children: None,
            children: None,
        }
    }

    /// A structured value with a lazy child sequence.
    pub fn with_children(
        display: impl Into<String>,
        num_children: usize,
        children: Box<dyn Iterator<Item = Child> + 'm>,
    ) -> Self
    {
        Self {
            display: display.into(),
            hint: Some(DisplayHint::Structured),
            num_children: Some(num_children),
            children: Some(children),
        }
    }

    /// Collect the child sequence eagerly.
    ///
    /// Convenience for hosts (and tests) that do not stream children.
    pub fn collect_children(self) -> Vec<Child>
    {
        match self.children {
            Some(children) => children.collect(),
            None => Vec::new(),
        }
    }
}

impl std::fmt::Debug for Rendered<'_>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("Rendered")
            .field("display", &self.display)
            .field("hint", &self.hint)
            .field("num_children", &self.num_children)
            .field("children", &self.children.is_some())
            .finish()
    }
}
