use std::collections::BTreeMap;

use crate::model::HttpMethod;

/// Segment kinds, ordered by match preference (lower wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SegmentKind {
    Literal = 0,
    Param = 1,
    Splat = 2,
}

impl SegmentKind {
    fn classify(segment: &str) -> (Self, Option<String>) {
        if let Some(name) = segment.strip_prefix(':') {
            let name = name.trim_end_matches('?');
            (Self::Param, Some(name.to_string()))
        } else if segment.starts_with('*') {
            (Self::Splat, None)
        } else {
            (Self::Literal, None)
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteTrieNode<V> {
    pub segment: String,
    pub kind: SegmentKind,
    /// Kept for display; matching ignores it.
    pub param_name: Option<String>,
    handlers: BTreeMap<String, V>,
    children: Vec<RouteTrieNode<V>>,
}

impl<V> RouteTrieNode<V> {
    fn new(segment: &str) -> Self {
        let (kind, param_name) = SegmentKind::classify(segment);
        Self {
            segment: segment.to_string(),
            kind,
            param_name,
            handlers: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    fn root() -> Self {
        Self::new("")
    }

    pub fn handlers(&self) -> &BTreeMap<String, V> {
        &self.handlers
    }

    pub fn children(&self) -> &[RouteTrieNode<V>] {
        &self.children
    }

    fn child_mut(&mut self, segment: &str) -> &mut RouteTrieNode<V> {
        let position = self.children.iter().position(|c| c.segment == segment);
        let index = match position {
            Some(i) => i,
            None => {
                self.children.push(RouteTrieNode::new(segment));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    fn sort_recursive(&mut self) {
        self.children
            .sort_by(|a, b| (a.kind, &a.segment).cmp(&(b.kind, &b.segment)));
        for child in &mut self.children {
            child.sort_recursive();
        }
    }

    /// Handlers this node contributes for `method`: exact first, else the wildcard.
    fn contribution(&self, method: &str) -> Option<&V> {
        self.handlers
            .get(method)
            .or_else(|| self.handlers.get(HttpMethod::WILDCARD_KEY))
    }
}

/// Mutable trie used while folding routes in.
#[derive(Debug, Clone)]
pub struct RouteTrieBuilder<V> {
    root: RouteTrieNode<V>,
}

impl<V> Default for RouteTrieBuilder<V> {
    fn default() -> Self {
        Self {
            root: RouteTrieNode::root(),
        }
    }
}

impl<V> RouteTrieBuilder<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `value` for `method` at the node addressed by `segments`.
    ///
    /// A splat segment absorbs the rest of the path. Re-inserting the same
    /// route and method replaces the previous value.
    ///
    /// # Panics
    ///
    /// Panics if `method` is empty.
    pub fn insert<S: AsRef<str>>(&mut self, segments: &[S], method: &str, value: V) {
        assert!(!method.is_empty(), "route trie insert requires a method key");

        let mut node = &mut self.root;
        for segment in segments {
            let segment = segment.as_ref();
            if segment.is_empty() {
                continue;
            }
            node = node.child_mut(segment);
            if node.kind == SegmentKind::Splat {
                break;
            }
        }
        node.handlers.insert(method.to_string(), value);
    }

    pub fn build(mut self) -> RouteTrie<V> {
        self.root.sort_recursive();
        RouteTrie { root: self.root }
    }
}

/// Immutable route trie.
#[derive(Debug, Clone)]
pub struct RouteTrie<V> {
    root: RouteTrieNode<V>,
}

impl<V> Default for RouteTrie<V> {
    fn default() -> Self {
        RouteTrieBuilder::new().build()
    }
}

impl<V: Clone> RouteTrie<V> {
    pub fn root(&self) -> &RouteTrieNode<V> {
        &self.root
    }

    /// Handlers along the best branch for `segments` and `method`.
    ///
    /// Branches are explored literal first, then param, then splat (a splat
    /// consumes every remaining segment). A branch may stop early when no child
    /// matches the next segment. The winner consumes the most segments; ties go
    /// to the lowest sequence of segment kinds, so literal beats param beats
    /// splat at the first point of difference. Every node on the winning branch,
    /// the root included, contributes its exact-method handler, or its wildcard
    /// handler when it has none.
    pub fn lookup<S: AsRef<str>>(&self, segments: &[S], method: &str) -> Vec<V> {
        let segments: Vec<&str> = segments
            .iter()
            .map(|s| s.as_ref())
            .filter(|s| !s.is_empty())
            .collect();
        best_branch(&self.root, &segments)
            .nodes
            .into_iter()
            .filter_map(|node| node.contribution(method))
            .cloned()
            .collect()
    }
}

struct Branch<'t, V> {
    consumed: usize,
    ranks: Vec<SegmentKind>,
    /// Nodes from the branch start down to where it stopped.
    nodes: Vec<&'t RouteTrieNode<V>>,
}

impl<V> Branch<'_, V> {
    fn beats(&self, other: &Self) -> bool {
        self.consumed > other.consumed
            || (self.consumed == other.consumed && self.ranks < other.ranks)
    }
}

fn best_branch<'t, V>(node: &'t RouteTrieNode<V>, segments: &[&str]) -> Branch<'t, V> {
    let mut best = Branch {
        consumed: 0,
        ranks: Vec::new(),
        nodes: Vec::new(),
    };

    if let Some((head, rest)) = segments.split_first() {
        for child in &node.children {
            let candidate = match child.kind {
                SegmentKind::Literal if child.segment != *head => continue,
                SegmentKind::Literal | SegmentKind::Param => {
                    let below = best_branch(child, rest);
                    let mut ranks = Vec::with_capacity(below.ranks.len() + 1);
                    ranks.push(child.kind);
                    ranks.extend(below.ranks);
                    Branch {
                        consumed: below.consumed + 1,
                        ranks,
                        nodes: below.nodes,
                    }
                }
                SegmentKind::Splat => Branch {
                    consumed: segments.len(),
                    ranks: vec![SegmentKind::Splat],
                    nodes: vec![child],
                },
            };
            if candidate.beats(&best) {
                best = candidate;
            }
        }
    }

    best.nodes.insert(0, node);
    best
}
