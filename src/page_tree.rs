//! Page tree.
//!
//! Nodes live in an arena and are materialized on demand: a parent's `Kids`
//! array is read the first time the walk needs it, after which the parent's
//! cached count is the sum of its kids' counts. Unloaded parents are counted
//! by their `/Count` entry until the walk proves it wrong, at which point the
//! whole tree is loaded and every count recomputed.
//!
//! Structural edits update the affected parent's `Kids`, then walk up the
//! ancestors adjusting `/Count`; every touched dictionary is written back
//! through the object store.

use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::object::{Dictionary, DictionaryExt, Object, ObjectRef};
use crate::store::ObjectStore;
use std::collections::HashSet;

/// Index of a node in the arena.
pub type NodeId = usize;

/// Attributes a page inherits from its ancestors.
pub const INHERITABLE: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// Page or intermediate node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Leaf (`/Type /Page`)
    Page,
    /// Intermediate node (`/Type /Pages`)
    Parent {
        /// Kids, once loaded
        kids: Option<Vec<NodeId>>,
        /// Cached page count (valid once `kids` is loaded)
        count: usize,
    },
}

/// One node of the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PageNode {
    /// Object holding the node's dictionary
    pub reference: ObjectRef,
    /// Logical parent
    pub parent: Option<NodeId>,
    /// Node dictionary as last read or written
    pub dict: Dictionary,
    /// Leaf or intermediate
    pub kind: NodeKind,
}

/// Resolved view of a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Page object
    pub reference: ObjectRef,
    /// Page dictionary (not including inherited entries)
    pub dict: Dictionary,
    /// Effective `/MediaBox`, US Letter when absent
    pub media_box: Rect,
    /// Effective `/CropBox`, clipped to the media box
    pub crop_box: Rect,
    /// Effective `/Resources`
    pub resources: Dictionary,
    /// Effective `/Rotate`, normalized to 0, 90, 180 or 270
    pub rotate: i32,
}

/// Lazily materialized page tree.
#[derive(Debug, Clone)]
pub struct PageTree {
    nodes: Vec<PageNode>,
    root: NodeId,
    fully_loaded: bool,
}

impl PageTree {
    /// Start a tree at the `/Pages` root.
    pub fn load(store: &mut ObjectStore, root: ObjectRef) -> Result<Self> {
        let dict = store
            .resolve_dict(&Object::Reference(root))
            .ok_or(Error::UnresolvedReference(root))?;
        let count = dict.get_int("Count").unwrap_or(0).max(0) as usize;
        Ok(Self {
            nodes: vec![PageNode {
                reference: root,
                parent: None,
                dict,
                kind: NodeKind::Parent { kids: None, count },
            }],
            root: 0,
            fully_loaded: false,
        })
    }

    /// Root node reference.
    pub fn root_ref(&self) -> ObjectRef {
        self.nodes[self.root].reference
    }

    /// Node by id.
    pub fn node(&self, id: NodeId) -> &PageNode {
        &self.nodes[id]
    }

    /// Number of nodes materialized so far.
    pub fn materialized(&self) -> usize {
        self.nodes.len()
    }

    /// Number of pages.
    pub fn page_count(&mut self, store: &mut ObjectStore) -> usize {
        self.count(store, self.root)
    }

    fn count(&mut self, store: &mut ObjectStore, id: NodeId) -> usize {
        match &self.nodes[id].kind {
            NodeKind::Page => 1,
            NodeKind::Parent { kids: Some(_), count } => *count,
            NodeKind::Parent { kids: None, .. } => match self.nodes[id].dict.get_int("Count") {
                Some(c) if c >= 0 => c as usize,
                _ => {
                    self.ensure_kids(store, id);
                    self.cached_count(id)
                },
            },
        }
    }

    fn cached_count(&self, id: NodeId) -> usize {
        match &self.nodes[id].kind {
            NodeKind::Page => 1,
            NodeKind::Parent { count, .. } => *count,
        }
    }

    fn ancestors_refs(&self, id: NodeId) -> HashSet<ObjectRef> {
        let mut refs = HashSet::new();
        let mut cur = Some(id);
        while let Some(n) = cur {
            refs.insert(self.nodes[n].reference);
            cur = self.nodes[n].parent;
        }
        refs
    }

    /// Materialize the kids of `id` (once).
    fn ensure_kids(&mut self, store: &mut ObjectStore, id: NodeId) {
        if !matches!(self.nodes[id].kind, NodeKind::Parent { kids: None, .. }) {
            return;
        }

        let kid_refs: Vec<ObjectRef> = self.nodes[id]
            .dict
            .get("Kids")
            .map(|k| store.resolve(k))
            .and_then(|k| k.as_array().map(|a| a.iter().filter_map(Object::as_reference).collect()))
            .unwrap_or_default();
        let ancestors = self.ancestors_refs(id);
        let already: HashSet<ObjectRef> = self.nodes.iter().map(|n| n.reference).collect();

        let mut kids = Vec::with_capacity(kid_refs.len());
        for r in kid_refs {
            if ancestors.contains(&r) || already.contains(&r) {
                log::warn!("Page tree node {} lists {} twice or as its own ancestor; skipped", self.nodes[id].reference, r);
                continue;
            }
            let Some(dict) = store.resolve_dict(&Object::Reference(r)) else {
                log::debug!("Page tree kid {} is missing", r);
                continue;
            };
            let is_parent = match dict.get_name("Type") {
                Some("Pages") => true,
                Some("Page") => false,
                _ => dict.contains_key("Kids"),
            };
            let kind = if is_parent {
                NodeKind::Parent {
                    kids: None,
                    count: dict.get_int("Count").unwrap_or(0).max(0) as usize,
                }
            } else {
                NodeKind::Page
            };
            self.nodes.push(PageNode {
                reference: r,
                parent: Some(id),
                dict,
                kind,
            });
            kids.push(self.nodes.len() - 1);
        }

        let total = kids.iter().map(|&k| self.count(store, k)).sum();
        self.nodes[id].kind = NodeKind::Parent {
            kids: Some(kids),
            count: total,
        };
    }

    fn kids(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id].kind {
            NodeKind::Parent { kids: Some(kids), .. } => kids,
            _ => &[],
        }
    }

    /// Load every node and recompute every count bottom-up.
    fn load_all(&mut self, store: &mut ObjectStore) {
        let mut stack = vec![self.root];
        let mut order = Vec::new();
        while let Some(id) = stack.pop() {
            self.ensure_kids(store, id);
            order.push(id);
            stack.extend(self.kids(id).iter().copied());
        }
        for &id in order.iter().rev() {
            if let NodeKind::Parent { kids: Some(kids), .. } = &self.nodes[id].kind {
                let total = kids.iter().map(|&k| self.cached_count(k)).sum();
                if let NodeKind::Parent { count, .. } = &mut self.nodes[id].kind {
                    *count = total;
                }
            }
        }
        self.fully_loaded = true;
    }

    fn walk(&mut self, store: &mut ObjectStore, index: usize) -> Option<NodeId> {
        let mut node = self.root;
        let mut remaining = index;
        'descend: loop {
            self.ensure_kids(store, node);
            let kids = self.kids(node).to_vec();
            for kid in kids {
                let c = self.count(store, kid);
                if remaining < c {
                    if self.nodes[kid].kind == NodeKind::Page {
                        return Some(kid);
                    }
                    node = kid;
                    continue 'descend;
                }
                remaining -= c;
            }
            return None;
        }
    }

    /// Node of the page at `index`.
    pub fn page_node(&mut self, store: &mut ObjectStore, index: usize) -> Result<NodeId> {
        let total = self.page_count(store);
        if index < total {
            if let Some(id) = self.walk(store, index) {
                return Ok(id);
            }
        }
        if !self.fully_loaded {
            log::debug!("Page counts are stale; loading the whole page tree");
            self.load_all(store);
            if let Some(id) = self.walk(store, index) {
                return Ok(id);
            }
        }
        Err(Error::StructuralInvariantViolation(format!(
            "page index {} out of range ({} pages)",
            index,
            self.page_count(store)
        )))
    }

    /// Resolved view of the page at `index`.
    pub fn page(&mut self, store: &mut ObjectStore, index: usize) -> Result<Page> {
        let id = self.page_node(store, index)?;
        Ok(self.page_view(store, id))
    }

    /// References of all pages, in order.
    pub fn page_refs(&mut self, store: &mut ObjectStore) -> Vec<ObjectRef> {
        self.load_all(store);
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            match self.nodes[id].kind {
                NodeKind::Page => out.push(self.nodes[id].reference),
                NodeKind::Parent { .. } => stack.extend(self.kids(id).iter().rev().copied()),
            }
        }
        out
    }

    /// Inherited attribute: the nearest ancestor-or-self entry for `key`.
    pub fn inherited(&self, id: NodeId, key: &str) -> Option<&Object> {
        let mut cur = Some(id);
        while let Some(n) = cur {
            if let Some(v) = self.nodes[n].dict.get(key) {
                return Some(v);
            }
            cur = self.nodes[n].parent;
        }
        None
    }

    fn page_view(&self, store: &mut ObjectStore, id: NodeId) -> Page {
        let mut attr = |key: &str| self.inherited(id, key).map(|v| store.resolve(v));
        let media_box = attr("MediaBox").and_then(|v| Rect::from_object(&v)).unwrap_or(Rect::LETTER);
        let crop_box = attr("CropBox")
            .and_then(|v| Rect::from_object(&v))
            .and_then(|c| c.intersect(&media_box))
            .unwrap_or(media_box);
        let resources = match attr("Resources") {
            Some(Object::Dictionary(d)) => d,
            _ => Dictionary::new(),
        };
        let rotate = attr("Rotate").and_then(|v| v.as_integer()).unwrap_or(0);
        let rotate = (((rotate / 90) * 90) % 360 + 360) % 360;

        Page {
            reference: self.nodes[id].reference,
            dict: self.nodes[id].dict.clone(),
            media_box,
            crop_box,
            resources,
            rotate: rotate as i32,
        }
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    fn persist(&self, store: &mut ObjectStore, id: NodeId) -> Result<()> {
        let node = &self.nodes[id];
        store.set_object(node.reference, Object::Dictionary(node.dict.clone()))
    }

    /// Add `delta` pages to `id` and every ancestor, persisting each.
    fn propagate_count(&mut self, store: &mut ObjectStore, id: NodeId, delta: isize) -> Result<()> {
        let mut cur = Some(id);
        while let Some(n) = cur {
            if let NodeKind::Parent { count, .. } = &mut self.nodes[n].kind {
                *count = (*count as isize + delta).max(0) as usize;
                let c = *count;
                self.nodes[n].dict.insert("Count".into(), Object::from_i64(c as i64));
            }
            self.persist(store, n)?;
            cur = self.nodes[n].parent;
        }
        Ok(())
    }

    /// Insert a page dictionary so it becomes page `index`.
    ///
    /// `Type` and `Parent` are set on the dictionary; the page object is
    /// added to the store.
    pub fn insert_page(&mut self, store: &mut ObjectStore, index: usize, mut page: Dictionary) -> Result<ObjectRef> {
        let total = self.page_count(store);
        if index > total {
            return Err(Error::StructuralInvariantViolation(format!(
                "cannot insert at page {} of {}",
                index, total
            )));
        }

        // Parent and position among its kids
        let (parent, position) = if total == 0 {
            self.ensure_kids(store, self.root);
            (self.root, self.kids(self.root).len())
        } else if index == total {
            let last = self.page_node(store, total - 1)?;
            let parent = self.nodes[last].parent.unwrap_or(self.root);
            let pos = self.kids(parent).iter().position(|&k| k == last).map_or(0, |p| p + 1);
            (parent, pos)
        } else {
            let at = self.page_node(store, index)?;
            let parent = self.nodes[at].parent.unwrap_or(self.root);
            let pos = self.kids(parent).iter().position(|&k| k == at).unwrap_or(0);
            (parent, pos)
        };

        page.insert("Type".into(), Object::name("Page"));
        page.insert("Parent".into(), Object::Reference(self.nodes[parent].reference));
        let reference = store.add_object(Object::Dictionary(page.clone()));

        // Position in the Kids array: before the sibling currently at `position`
        let next_sibling = self.kids(parent).get(position).map(|&k| self.nodes[k].reference);
        let mut kids_array = match self.nodes[parent].dict.get("Kids").map(|k| store.resolve(k)) {
            Some(Object::Array(items)) => items,
            _ => Vec::new(),
        };
        let array_pos = next_sibling
            .and_then(|s| kids_array.iter().position(|o| o.as_reference() == Some(s)))
            .unwrap_or(kids_array.len());
        kids_array.insert(array_pos, Object::Reference(reference));
        self.nodes[parent].dict.insert("Kids".into(), Object::Array(kids_array));

        self.nodes.push(PageNode {
            reference,
            parent: Some(parent),
            dict: page,
            kind: NodeKind::Page,
        });
        let new_id = self.nodes.len() - 1;
        if let NodeKind::Parent { kids: Some(kids), .. } = &mut self.nodes[parent].kind {
            kids.insert(position, new_id);
        }

        self.propagate_count(store, parent, 1)?;
        log::debug!("Inserted page {} at index {}", reference, index);
        Ok(reference)
    }

    /// Remove page `index`, then delete the page object and every object
    /// reachable only through its contents and resources.
    ///
    /// Returns the number of objects deleted from the store.
    pub fn delete_page(&mut self, store: &mut ObjectStore, index: usize) -> Result<usize> {
        let id = self.page_node(store, index)?;
        let parent = self.nodes[id]
            .parent
            .ok_or_else(|| Error::StructuralInvariantViolation("page has no parent".into()))?;
        let reference = self.nodes[id].reference;

        if let NodeKind::Parent { kids: Some(kids), .. } = &mut self.nodes[parent].kind {
            kids.retain(|&k| k != id);
        }
        let kids_array = match self.nodes[parent].dict.get("Kids").map(|k| store.resolve(k)) {
            Some(Object::Array(items)) => items.into_iter().filter(|o| o.as_reference() != Some(reference)).collect(),
            _ => Vec::new(),
        };
        self.nodes[parent].dict.insert("Kids".into(), Object::Array(kids_array));
        self.nodes[id].parent = None;
        self.propagate_count(store, parent, -1)?;

        // Everything the page pointed at through its content and resources
        let page_dict = self.nodes[id].dict.clone();
        let mut candidates = HashSet::new();
        for key in ["Contents", "Resources"] {
            if let Some(v) = page_dict.get(key) {
                collect_references(store, v, &mut candidates);
            }
        }
        store.delete_object(reference)?;
        let mut deleted = 1;

        let mut reachable = HashSet::new();
        let roots: Vec<Object> = store.trailer().values().cloned().collect();
        for root in &roots {
            collect_references(store, root, &mut reachable);
        }

        let mut orphans: Vec<ObjectRef> = candidates.difference(&reachable).copied().collect();
        orphans.sort();
        for orphan in orphans {
            if store.delete_object(orphan).is_ok() {
                deleted += 1;
            }
        }
        log::info!("Deleted page {} and {} orphaned object(s)", reference, deleted - 1);
        Ok(deleted)
    }
}

/// Every reference reachable from `start`, following into resolved objects.
///
/// `Parent` entries are not followed, so walking a page does not climb into
/// the rest of the tree.
pub fn collect_references(store: &mut ObjectStore, start: &Object, seen: &mut HashSet<ObjectRef>) {
    let mut stack = vec![start.clone()];
    while let Some(obj) = stack.pop() {
        match obj {
            Object::Reference(r) => {
                if seen.insert(r) {
                    stack.push(store.get_object(r));
                }
            },
            Object::Array(items) => stack.extend(items),
            Object::Dictionary(dict) => {
                stack.extend(dict.into_iter().filter(|(k, _)| k != "Parent").map(|(_, v)| v));
            },
            Object::Stream(stream) => {
                stack.extend(stream.dict.into_iter().filter(|(k, _)| k != "Parent").map(|(_, v)| v));
            },
            _ => {},
        }
    }
}
