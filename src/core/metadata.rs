//! Metadata tree of an acquisition.
//!
//! Entries live in an arena and refer to each other by [`EntryId`]. The root
//! holds the C3D groups, each group holds its parameters, and a parameter
//! carries a [`TypedValue`]. Names compare case-insensitively.

use super::value::TypedValue;
use crate::util::{Error, Result};
use std::fmt;

/// Stable handle to an entry of a [`MetaData`] tree.
///
/// A handle to a removed entry never resolves again, even after its arena
/// slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntryId {
    index: usize,
    generation: u32,
}

/// Arena slot; the generation is bumped each time the slot is freed.
#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    entry: Option<MetaDataEntry>,
}

/// One node of the tree.
#[derive(Clone, Debug, PartialEq)]
pub struct MetaDataEntry {
    name: String,
    description: String,
    info: Option<TypedValue>,
    unlocked: bool,
    parent: Option<EntryId>,
    children: Vec<EntryId>,
}

impl MetaDataEntry {
    fn new(name: &str, parent: Option<EntryId>) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            info: None,
            unlocked: true,
            parent,
            children: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Returns true if the entry owns a value.
    #[inline]
    pub fn has_info(&self) -> bool {
        self.info.is_some()
    }

    #[inline]
    pub fn info(&self) -> Option<&TypedValue> {
        self.info.as_ref()
    }

    pub fn info_mut(&mut self) -> Option<&mut TypedValue> {
        self.info.as_mut()
    }

    pub fn set_info(&mut self, info: Option<TypedValue>) {
        self.info = info;
    }

    /// Locked entries are written with a negative name length.
    #[inline]
    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn set_unlocked(&mut self, unlocked: bool) {
        self.unlocked = unlocked;
    }

    #[inline]
    pub fn parent(&self) -> Option<EntryId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[EntryId] {
        &self.children
    }
}

/// Arena-backed metadata tree.
///
/// Equality is structural: two trees are equal when their entries match in
/// order, regardless of how the arena slots were allocated.
#[derive(Clone, Debug)]
pub struct MetaData {
    nodes: Vec<Slot>,
    free: Vec<usize>,
}

impl Default for MetaData {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaData {
    /// Name of the root entry.
    pub const ROOT_NAME: &'static str = "ROOT";

    /// Create a tree holding only the root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Slot {
                generation: 0,
                entry: Some(MetaDataEntry::new(Self::ROOT_NAME, None)),
            }],
            free: Vec::new(),
        }
    }

    #[inline]
    pub fn root(&self) -> EntryId {
        EntryId {
            index: 0,
            generation: 0,
        }
    }

    /// Entry by id, `None` once it has been removed.
    pub fn get(&self, id: EntryId) -> Option<&MetaDataEntry> {
        self.nodes
            .get(id.index)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.entry.as_ref())
    }

    /// Mutable entry by id. Structure (parent, children) is not editable here.
    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut MetaDataEntry> {
        self.nodes
            .get_mut(id.index)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.entry.as_mut())
    }

    /// Children of an entry, empty for a removed entry.
    pub fn children(&self, id: EntryId) -> &[EntryId] {
        self.get(id).map(MetaDataEntry::children).unwrap_or(&[])
    }

    /// Look up a direct child by name.
    pub fn find_child(&self, parent: EntryId, name: &str) -> Option<EntryId> {
        self.children(parent).iter().copied().find(|&c| {
            self.get(c)
                .map(|e| e.name.eq_ignore_ascii_case(name))
                .unwrap_or(false)
        })
    }

    /// Like [`find_child`](Self::find_child) but reports a missing child as an error.
    pub fn get_child(&self, parent: EntryId, name: &str) -> Result<EntryId> {
        self.find_child(parent, name)
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))
    }

    /// Return the named child, creating it at the end if absent.
    pub fn child_or_insert(&mut self, parent: EntryId, name: &str) -> Result<EntryId> {
        if let Some(id) = self.find_child(parent, name) {
            return Ok(id);
        }
        if self.get(parent).is_none() {
            return Err(Error::other(format!("parent of '{}' was removed", name)));
        }
        let entry = MetaDataEntry::new(name, Some(parent));
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.nodes[index];
                slot.entry = Some(entry);
                EntryId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.nodes.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                EntryId {
                    index: self.nodes.len() - 1,
                    generation: 0,
                }
            }
        };
        if let Some(p) = self.get_mut(parent) {
            p.children.push(id);
        }
        Ok(id)
    }

    /// Rename an entry, keeping sibling names unique.
    pub fn rename(&mut self, id: EntryId, name: &str) -> Result<()> {
        let parent = self.get(id).and_then(MetaDataEntry::parent);
        if let Some(p) = parent {
            if let Some(other) = self.find_child(p, name) {
                if other != id {
                    return Err(Error::other(format!("duplicate entry name '{}'", name)));
                }
            }
        }
        match self.get_mut(id) {
            Some(e) => {
                e.name = name.to_string();
                Ok(())
            }
            None => Err(Error::EntryNotFound(name.to_string())),
        }
    }

    /// Detach and destroy a child with all its descendants.
    pub fn remove_child(&mut self, parent: EntryId, name: &str) -> bool {
        let Some(id) = self.find_child(parent, name) else {
            return false;
        };
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|&c| c != id);
        }
        self.destroy(id);
        true
    }

    /// Remove every child of an entry.
    pub fn clear_children(&mut self, parent: EntryId) {
        let children = match self.get_mut(parent) {
            Some(p) => std::mem::take(&mut p.children),
            None => return,
        };
        for c in children {
            self.destroy(c);
        }
    }

    fn destroy(&mut self, id: EntryId) {
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let Some(slot) = self.nodes.get_mut(cur.index) else { continue };
            if slot.generation != cur.generation {
                continue;
            }
            if let Some(node) = slot.entry.take() {
                stack.extend(node.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(cur.index);
            }
        }
    }

    /// Top-level groups.
    pub fn groups(&self) -> &[EntryId] {
        self.children(self.root())
    }

    /// Find `GROUP:PARAMETER` (or just `GROUP`).
    pub fn find(&self, path: &str) -> Option<EntryId> {
        let mut cur = self.root();
        for part in path.split(':') {
            cur = self.find_child(cur, part)?;
        }
        Some(cur)
    }

    /// Value of `GROUP:PARAMETER`, if both exist and the parameter has a value.
    pub fn value(&self, group: &str, parameter: &str) -> Option<&TypedValue> {
        let g = self.find_child(self.root(), group)?;
        let p = self.find_child(g, parameter)?;
        self.get(p)?.info()
    }

    pub fn value_mut(&mut self, group: &str, parameter: &str) -> Option<&mut TypedValue> {
        let g = self.find_child(self.root(), group)?;
        let p = self.find_child(g, parameter)?;
        self.get_mut(p)?.info_mut()
    }

    /// Create or replace `GROUP:PARAMETER`, creating the group when needed.
    pub fn set_value(&mut self, group: &str, parameter: &str, value: TypedValue) -> Result<EntryId> {
        let root = self.root();
        let g = self.child_or_insert(root, group)?;
        let p = self.child_or_insert(g, parameter)?;
        if let Some(e) = self.get_mut(p) {
            e.info = Some(value);
        }
        Ok(p)
    }

    /// Remove `GROUP:PARAMETER`. Returns true if it existed.
    pub fn remove(&mut self, group: &str, parameter: &str) -> bool {
        match self.find_child(self.root(), group) {
            Some(g) => self.remove_child(g, parameter),
            None => false,
        }
    }

    /// Number of live entries, root included.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|s| s.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.groups().is_empty()
    }

    /// Full `GROUP:PARAMETER` path of an entry.
    pub fn path(&self, id: EntryId) -> String {
        let mut parts = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            match self.get(c) {
                Some(e) if e.parent.is_some() => {
                    parts.push(e.name.as_str());
                    cur = e.parent;
                }
                _ => break,
            }
        }
        parts.reverse();
        parts.join(":")
    }
}

impl MetaData {
    fn subtree_eq(&self, a: EntryId, other: &MetaData, b: EntryId) -> bool {
        match (self.get(a), other.get(b)) {
            (Some(x), Some(y)) => {
                x.name == y.name
                    && x.description == y.description
                    && x.info == y.info
                    && x.unlocked == y.unlocked
                    && x.children.len() == y.children.len()
                    && x.children
                        .iter()
                        .zip(&y.children)
                        .all(|(&ca, &cb)| self.subtree_eq(ca, other, cb))
            }
            (None, None) => true,
            _ => false,
        }
    }
}

impl PartialEq for MetaData {
    fn eq(&self, other: &Self) -> bool {
        self.subtree_eq(self.root(), other, other.root())
    }
}

impl fmt::Display for MetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &g in self.groups() {
            let Some(group) = self.get(g) else { continue };
            writeln!(f, "{}", group.name)?;
            for &p in group.children() {
                let Some(param) = self.get(p) else { continue };
                match param.info() {
                    Some(v) => writeln!(f, "  {} = {}", param.name, v)?,
                    None => writeln!(f, "  {}", param.name)?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_find() -> Result<()> {
        let mut md = MetaData::new();
        let root = md.root();
        let point = md.child_or_insert(root, "POINT")?;
        let used = md.child_or_insert(point, "USED")?;
        md.get_mut(used).unwrap().set_info(Some(TypedValue::from(5i16)));

        assert_eq!(md.find_child(root, "point"), Some(point));
        assert_eq!(md.child_or_insert(root, "Point")?, point);
        assert_eq!(md.groups().len(), 1);
        assert!(md.get(used).unwrap().has_info());
        assert_eq!(md.value("POINT", "USED").and_then(|v| v.i16_at(0)), Some(5));
        assert_eq!(md.find("POINT:USED"), Some(used));
        assert_eq!(md.path(used), "POINT:USED");
        assert_eq!(md.get(used).unwrap().parent(), Some(point));
        Ok(())
    }

    #[test]
    fn test_missing_child() {
        let md = MetaData::new();
        assert!(md.find_child(md.root(), "ANALOG").is_none());
        assert!(matches!(md.get_child(md.root(), "ANALOG"), Err(Error::EntryNotFound(_))));
    }

    #[test]
    fn test_remove_subtree() -> Result<()> {
        let mut md = MetaData::new();
        let used = md.set_value("POINT", "USED", TypedValue::from(1i16))?;
        md.set_value("POINT", "RATE", TypedValue::from(50.0f32))?;
        md.set_value("ANALOG", "USED", TypedValue::from(0i16))?;
        assert_eq!(md.len(), 6);

        assert!(md.remove_child(md.root(), "point"));
        assert!(md.get(used).is_none());
        assert_eq!(md.len(), 3);
        assert!(md.value("POINT", "RATE").is_none());

        // Freed slots are reused
        let g = md.child_or_insert(md.root(), "EVENT")?;
        assert!(md.get(g).is_some());
        assert_eq!(md.len(), 4);
        Ok(())
    }

    #[test]
    fn test_removed_id_stays_dead() -> Result<()> {
        let mut md = MetaData::new();
        let root = md.root();
        let old = md.set_value("POINT", "USED", TypedValue::from(1i16))?;
        let point = md.find("POINT").unwrap();

        assert!(md.remove_child(point, "USED"));
        let new = md.set_value("POINT", "RATE", TypedValue::from(50.0f32))?;
        assert_ne!(old, new);
        assert!(md.get(old).is_none());
        assert!(md.get_mut(old).is_none());
        assert_eq!(md.value("POINT", "RATE").and_then(|v| v.f32_at(0)), Some(50.0));

        // whole subtrees too, across several reuse cycles
        md.clear_children(root);
        for name in ["A", "B", "C"] {
            md.child_or_insert(root, name)?;
        }
        assert!(md.get(point).is_none());
        assert!(md.get(new).is_none());
        assert!(md.children(point).is_empty());
        assert_eq!(md.len(), 4);
        Ok(())
    }

    #[test]
    fn test_clear_children() -> Result<()> {
        let mut md = MetaData::new();
        md.set_value("TRIAL", "ACTUAL_START_FIELD", TypedValue::from_vec(vec![1i16, 0]))?;
        let trial = md.find("TRIAL").unwrap();
        md.clear_children(trial);
        assert!(md.children(trial).is_empty());
        assert_eq!(md.len(), 2);
        Ok(())
    }

    #[test]
    fn test_rename_keeps_unique() -> Result<()> {
        let mut md = MetaData::new();
        let a = md.child_or_insert(md.root(), "A")?;
        md.child_or_insert(md.root(), "B")?;
        assert!(md.rename(a, "b").is_err());
        md.rename(a, "C")?;
        assert_eq!(md.get(a).unwrap().name(), "C");
        Ok(())
    }

    #[test]
    fn test_structural_equality() -> Result<()> {
        let mut a = MetaData::new();
        a.set_value("POINT", "USED", TypedValue::from(1i16))?;
        a.set_value("ANALOG", "USED", TypedValue::from(2i16))?;

        // Same tree built in a different slot order
        let mut b = MetaData::new();
        let root = b.root();
        let point = b.child_or_insert(root, "POINT")?;
        let analog = b.child_or_insert(root, "ANALOG")?;
        let pu = b.child_or_insert(point, "USED")?;
        let au = b.child_or_insert(analog, "USED")?;
        b.get_mut(pu).unwrap().set_info(Some(TypedValue::from(1i16)));
        b.get_mut(au).unwrap().set_info(Some(TypedValue::from(2i16)));
        assert_eq!(a, b);

        b.get_mut(au).unwrap().set_unlocked(false);
        assert_ne!(a, b);
        Ok(())
    }

    #[test]
    fn test_clone_is_deep() -> Result<()> {
        let mut md = MetaData::new();
        md.set_value("POINT", "SCALE", TypedValue::from(0.1f32))?;
        let mut copy = md.clone();
        copy.value_mut("POINT", "SCALE").unwrap().set_value(0, -1.0f32)?;
        assert_eq!(md.value("POINT", "SCALE").unwrap().f32_at(0), Some(0.1));
        Ok(())
    }
}
