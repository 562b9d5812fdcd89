//! The known set of origins.

use core::fmt;
use std::collections::HashMap;

use crate::base::Name;

//------------ OriginTree ----------------------------------------------------

/// A hierarchy of origins supporting longest-suffix lookups.
///
/// Each origin carries a value of type `T`. Iteration happens in insertion
/// order.
#[derive(Clone, Debug)]
pub struct OriginTree<T> {
    root: OriginNode,
    entries: Vec<(Name, T)>,
}

impl<T> Default for OriginTree<T> {
    fn default() -> Self {
        OriginTree {
            root: OriginNode::default(),
            entries: Vec::new(),
        }
    }
}

impl<T> OriginTree<T> {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a new origin.
    pub fn insert(
        &mut self,
        apex: Name,
        value: T,
    ) -> Result<(), OriginTreeError> {
        let index = self.entries.len();
        self.root.insert(apex.labels().rev(), index).map_err(|_| {
            OriginTreeError::OriginExists(apex.clone())
        })?;
        self.entries.push((apex, value));
        Ok(())
    }

    /// Returns the value of the origin with exactly this apex.
    pub fn get(&self, apex: &Name) -> Option<&T> {
        let index = self.root.get(apex.labels().rev())?;
        self.entries.get(index).map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, apex: &Name) -> Option<&mut T> {
        let index = self.root.get(apex.labels().rev())?;
        self.entries.get_mut(index).map(|(_, value)| value)
    }

    /// Returns the closest enclosing origin of `qname`.
    pub fn find(&self, qname: &Name) -> Option<(&Name, &T)> {
        let index = self.root.find(qname.labels().rev())?;
        self.entries.get(index).map(|(apex, value)| (apex, value))
    }

    pub fn contains(&self, apex: &Name) -> bool {
        self.get(apex).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &T)> + '_ {
        self.entries.iter().map(|(apex, value)| (apex, value))
    }

    pub fn apexes(&self) -> impl Iterator<Item = &Name> + '_ {
        self.entries.iter().map(|(apex, _)| apex)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//------------ OriginNode ----------------------------------------------------

#[derive(Clone, Debug, Default)]
struct OriginNode {
    index: Option<usize>,
    children: HashMap<String, OriginNode>,
}

impl OriginNode {
    fn get<'l>(
        &self,
        mut apex: impl Iterator<Item = &'l str>,
    ) -> Option<usize> {
        match apex.next() {
            Some(label) => self.children.get(label)?.get(apex),
            None => self.index,
        }
    }

    fn find<'l>(
        &self,
        mut qname: impl Iterator<Item = &'l str>,
    ) -> Option<usize> {
        if let Some(label) = qname.next() {
            if let Some(node) = self.children.get(label) {
                if let Some(index) = node.find(qname) {
                    return Some(index);
                }
            }
        }
        self.index
    }

    fn insert<'l>(
        &mut self,
        mut apex: impl Iterator<Item = &'l str>,
        index: usize,
    ) -> Result<(), ()> {
        if let Some(label) = apex.next() {
            self.children
                .entry(label.into())
                .or_default()
                .insert(apex, index)
        } else if self.index.is_some() {
            Err(())
        } else {
            self.index = Some(index);
            Ok(())
        }
    }
}

//============ Error Types ===================================================

//------------ OriginTreeError -----------------------------------------------

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OriginTreeError {
    OriginExists(Name),
}

impl fmt::Display for OriginTreeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OriginTreeError::OriginExists(apex) => {
                write!(f, "origin {apex} already exists")
            }
        }
    }
}

impl std::error::Error for OriginTreeError {}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    fn n(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    #[test]
    fn longest_suffix_wins() {
        let mut tree = OriginTree::new();
        tree.insert(Name::root(), "root").unwrap();
        tree.insert(n("local"), "local").unwrap();
        tree.insert(n("cluster.local"), "cluster").unwrap();

        let find = |s| tree.find(&n(s)).map(|(_, v)| *v);
        assert_eq!(find("svc1.testns.svc.cluster.local"), Some("cluster"));
        assert_eq!(find("cluster.local"), Some("cluster"));
        assert_eq!(find("other.local"), Some("local"));
        assert_eq!(find("example.test"), Some("root"));
        assert_eq!(tree.get(&n("testns.cluster.local")), None);
    }

    #[test]
    fn duplicate_origin_is_rejected() {
        let mut tree = OriginTree::new();
        tree.insert(n("example.test"), 1).unwrap();
        assert_eq!(
            tree.insert(n("EXAMPLE.test."), 2),
            Err(OriginTreeError::OriginExists(n("example.test")))
        );
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn iterates_in_insertion_order() {
        let mut tree = OriginTree::new();
        tree.insert(n("b.test"), ()).unwrap();
        tree.insert(n("a.test"), ()).unwrap();
        let apexes: Vec<_> = tree.apexes().cloned().collect();
        assert_eq!(apexes, vec![n("b.test"), n("a.test")]);
    }
}
