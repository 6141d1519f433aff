//! `EventName`: a hierarchical name made of opaque byte components.

use notisync_bytes::{EncodeResult, Reader, Result, Writer};

/// A hierarchical name: an ordered sequence of opaque byte components.
///
/// Comparable by component-wise equality; [`EventName::has_prefix`] gives component-wise
/// prefix matching (the unit used by every filter rule in this codebase).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventName {
    components: Vec<Vec<u8>>,
}

impl EventName {
    /// Build a name from its components.
    pub fn from_components(components: Vec<Vec<u8>>) -> Self {
        EventName { components }
    }

    /// Parse a `/`-separated name, e.g. `/s/e/a/1`. Empty segments (a leading slash, or `//`)
    /// are dropped, matching how the examples in this codebase's test scenarios are written.
    pub fn parse(s: &str) -> Self {
        let components = s
            .split('/')
            .filter(|seg| !seg.is_empty())
            .map(|seg| seg.as_bytes().to_vec())
            .collect();
        EventName { components }
    }

    /// This name's components.
    pub fn components(&self) -> &[Vec<u8>] {
        &self.components
    }

    /// True iff `prefix` is a component-wise prefix of `self`.
    pub fn has_prefix(&self, prefix: &EventName) -> bool {
        prefix.components.len() <= self.components.len()
            && self
                .components
                .iter()
                .zip(prefix.components.iter())
                .all(|(a, b)| a == b)
    }

    /// Append one opaque component, returning the extended name.
    pub fn append(&self, component: Vec<u8>) -> Self {
        let mut components = self.components.clone();
        components.push(component);
        EventName { components }
    }

    /// Encode this name onto `w` as a `u8`-length-prefixed sequence of `u16`-length-prefixed
    /// components.
    pub fn write_onto<W: Writer + ?Sized>(&self, w: &mut W) -> EncodeResult<()> {
        let mut outer = w.write_nested_u8len();
        for comp in &self.components {
            let mut inner = outer.write_nested_u16len();
            inner.write_all(comp);
            inner.finish()?;
        }
        outer.finish()
    }

    /// Decode a name previously written with [`EventName::write_onto`].
    pub fn take_from(r: &mut Reader<'_>) -> Result<Self> {
        r.read_nested_u8len(|r| {
            let mut components = Vec::new();
            while r.remaining() > 0 {
                let comp = r.read_nested_u16len(|r| Ok(r.take_rest().to_vec()))?;
                components.push(comp);
            }
            Ok(EventName { components })
        })
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for comp in &self.components {
            write!(f, "/{}", String::from_utf8_lossy(comp))?;
        }
        if self.components.is_empty() {
            write!(f, "/")?;
        }
        Ok(())
    }
}
