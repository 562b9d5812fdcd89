//! Domain names.
//!
//! The server core never looks at names in their wire format. It only
//! needs to compare, suffix-match and re-root them, so [`Name`] keeps the
//! normalized presentation format: lower case, absolute, with a trailing
//! dot. The root name is `"."`.

use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

//------------ Constants -----------------------------------------------------

/// The maximum length of a single label in octets.
const MAX_LABEL_LEN: usize = 63;

/// The maximum length of a name in presentation format.
const MAX_NAME_LEN: usize = 254;

//------------ Name ----------------------------------------------------------

/// A normalized, absolute domain name.
///
/// Cloning a name is cheap, the underlying text is reference counted.
#[derive(Clone, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name(Bytes);

impl Name {
    /// Returns the root name.
    pub fn root() -> Self {
        Name(Bytes::from_static(b"."))
    }

    /// Creates a name from its presentation format.
    ///
    /// A missing trailing dot is added and upper case ASCII letters are
    /// folded to lower case.
    pub fn new(s: &str) -> Result<Self, NameError> {
        if s.is_empty() {
            return Err(NameError::Empty);
        }
        if s == "." {
            return Ok(Self::root());
        }
        let trimmed = s.strip_suffix('.').unwrap_or(s);
        let mut out = String::with_capacity(trimmed.len() + 1);
        for label in trimmed.split('.') {
            check_label(label)?;
            out.push_str(&label.to_ascii_lowercase());
            out.push('.');
        }
        if out.len() > MAX_NAME_LEN {
            return Err(NameError::LongName);
        }
        Ok(Name(Bytes::from(out)))
    }

    /// Returns whether this is the root name.
    pub fn is_root(&self) -> bool {
        self.0.as_ref() == b"."
    }

    /// Returns the presentation format of the name including the final dot.
    pub fn as_str(&self) -> &str {
        // The content is only ever created from a `str` in `new()` or
        // `prepend()`.
        core::str::from_utf8(self.0.as_ref()).unwrap_or(".")
    }

    /// Returns an iterator over the non-root labels, leftmost first.
    pub fn labels(&self) -> impl DoubleEndedIterator<Item = &str> + '_ {
        let s = self.as_str();
        let s = if self.is_root() { "" } else { &s[..s.len() - 1] };
        s.split('.').filter(|label| !label.is_empty())
    }

    /// Returns the number of non-root labels.
    pub fn label_count(&self) -> usize {
        self.labels().count()
    }

    /// Returns whether `base` is a suffix of this name on a label boundary.
    ///
    /// Every name ends with the root and with itself.
    pub fn ends_with(&self, base: &Name) -> bool {
        if base.is_root() {
            return true;
        }
        let s = self.as_str();
        let b = base.as_str();
        if s.len() == b.len() {
            return s == b;
        }
        s.len() > b.len()
            && s.ends_with(b)
            && s.as_bytes()[s.len() - b.len() - 1] == b'.'
    }

    /// Returns the labels of this name that are in front of `base`.
    ///
    /// Returns `None` if `base` isn't a suffix of this name.
    pub fn relative_to(&self, base: &Name) -> Option<Vec<&str>> {
        if !self.ends_with(base) {
            return None;
        }
        let keep = self.label_count() - base.label_count();
        Some(self.labels().take(keep).collect())
    }

    /// Returns a new name with `label` added in front of this name.
    pub fn prepend(&self, label: &str) -> Result<Self, NameError> {
        check_label(label)?;
        let mut out = String::with_capacity(label.len() + 1 + self.0.len());
        out.push_str(&label.to_ascii_lowercase());
        if !self.is_root() {
            out.push('.');
            out.push_str(self.as_str());
        } else {
            out.push('.');
        }
        if out.len() > MAX_NAME_LEN {
            return Err(NameError::LongName);
        }
        Ok(Name(Bytes::from(out)))
    }

    /// Returns a new name with all `labels` added in front of this name.
    ///
    /// The labels are given in presentation order, i.e., the first label
    /// ends up leftmost.
    pub fn prepend_all<'a>(
        &self,
        labels: impl DoubleEndedIterator<Item = &'a str>,
    ) -> Result<Self, NameError> {
        let mut res = self.clone();
        for label in labels.rev() {
            res = res.prepend(label)?;
        }
        Ok(res)
    }

    /// Replaces the suffix `from` of this name with `to`.
    ///
    /// Returns `None` if `from` isn't a suffix of this name.
    pub fn reroot(&self, from: &Name, to: &Name) -> Option<Self> {
        let rel = self.relative_to(from)?;
        to.prepend_all(rel.into_iter()).ok()
    }

    /// Returns the name with the leftmost label removed.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let s = self.as_str();
        match s.find('.') {
            Some(pos) if pos + 1 < s.len() => {
                Some(Name(self.0.slice(pos + 1..)))
            }
            _ => Some(Self::root()),
        }
    }
}

fn check_label(label: &str) -> Result<(), NameError> {
    if label.is_empty() {
        return Err(NameError::EmptyLabel);
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(NameError::LongLabel);
    }
    if !label.is_ascii() || label.contains(char::is_whitespace) {
        return Err(NameError::IllegalCharacter);
    }
    Ok(())
}

//--- FromStr, TryFrom, From

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Name::new(s)
    }
}

impl TryFrom<String> for Name {
    type Error = NameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Name::new(&s)
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.as_str().into()
    }
}

//--- PartialOrd and Ord

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    /// Orders names by comparing labels right to left.
    fn cmp(&self, other: &Self) -> Ordering {
        self.labels().rev().cmp(other.labels().rev())
    }
}

//--- Display and Debug

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Name({})", self.as_str())
    }
}

//============ Error Types ===================================================

//------------ NameError -----------------------------------------------------

/// A name could not be created from a string.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NameError {
    /// The string was empty.
    Empty,

    /// The name contained an empty label.
    EmptyLabel,

    /// A label was longer than 63 octets.
    LongLabel,

    /// The name was longer than 255 octets.
    LongName,

    /// A label contained non-ASCII or white space characters.
    IllegalCharacter,
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NameError::Empty => f.write_str("empty name"),
            NameError::EmptyLabel => f.write_str("empty label"),
            NameError::LongLabel => f.write_str("label too long"),
            NameError::LongName => f.write_str("name too long"),
            NameError::IllegalCharacter => {
                f.write_str("illegal character in label")
            }
        }
    }
}

impl std::error::Error for NameError {}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    fn n(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    #[test]
    fn normalizes() {
        assert_eq!(n("Example.TEST").as_str(), "example.test.");
        assert_eq!(n("example.test."), n("example.test"));
        assert!(n(".").is_root());
        assert_eq!(Name::new(""), Err(NameError::Empty));
        assert_eq!(Name::new("a..b"), Err(NameError::EmptyLabel));
        assert_eq!(
            Name::new(&"x".repeat(64)),
            Err(NameError::LongLabel)
        );
    }

    #[test]
    fn suffix_matching() {
        let zone = n("cluster.local");
        assert!(n("svc1.testns.svc.cluster.local").ends_with(&zone));
        assert!(zone.ends_with(&zone));
        assert!(zone.ends_with(&Name::root()));
        assert!(!n("xcluster.local").ends_with(&zone));
        assert!(!n("local").ends_with(&zone));
    }

    #[test]
    fn labels_and_relative() {
        let name = n("_http._tcp.svc1.cluster.local");
        assert_eq!(name.label_count(), 5);
        assert_eq!(
            name.relative_to(&n("cluster.local")).unwrap(),
            vec!["_http", "_tcp", "svc1"]
        );
        assert_eq!(Name::root().label_count(), 0);
        assert_eq!(n("a.b").parent().unwrap(), n("b"));
        assert_eq!(n("b").parent().unwrap(), Name::root());
        assert_eq!(Name::root().parent(), None);
    }

    #[test]
    fn reroot() {
        let name = n("hdls1.testns.svc.cluster.local");
        assert_eq!(
            name.reroot(&n("cluster.local"), &n("clusterset.local")),
            Some(n("hdls1.testns.svc.clusterset.local"))
        );
        assert_eq!(name.reroot(&n("example.test"), &n("x.test")), None);
    }

    #[test]
    fn prepend() {
        let base = n("svc.cluster.local");
        assert_eq!(
            base.prepend_all(["svc1", "testns"].into_iter()).unwrap(),
            n("svc1.testns.svc.cluster.local")
        );
        assert_eq!(Name::root().prepend("com").unwrap(), n("com"));
    }

    #[test]
    fn ordering_is_right_to_left() {
        let mut names = vec![n("b.example"), n("a.other"), n("example")];
        names.sort();
        assert_eq!(names, vec![n("example"), n("b.example"), n("a.other")]);
    }
}
