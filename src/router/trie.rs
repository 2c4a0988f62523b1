//! Segment trie backing the route table.
//!
//! Each node holds literal children keyed by segment text and at most one
//! dynamic child carrying its parameter name. Terminal entries keep
//! registration order so the first method-compatible one wins. Lookup is
//! O(path segments), not O(routes).

use std::collections::HashMap;

use http::Method;

use crate::error::RouteError;

/// One component of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(String),
    /// Binds the matched path segment under this parameter name.
    Dynamic(String),
}

/// Parses a `/`-separated pattern into segments. `:name` marks a dynamic
/// segment; empty segments and empty parameter names are rejected.
pub(crate) fn parse_pattern(pattern: &str) -> Result<Vec<Segment>, RouteError> {
    let trimmed = pattern.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                if name.is_empty() {
                    Err(RouteError::invalid_pattern(pattern, "empty parameter name"))
                } else {
                    Ok(Segment::Dynamic(name.to_string()))
                }
            } else if segment.is_empty() {
                Err(RouteError::invalid_pattern(pattern, "empty segment"))
            } else {
                Ok(Segment::Literal(segment.to_string()))
            }
        })
        .collect()
}

/// Splits a request path into its non-empty segments.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// A terminal registration at a node, kept in registration order.
pub(crate) struct TerminalEntry<T> {
    pub(crate) method: Method,
    pub(crate) value: T,
}

struct DynamicChild<T> {
    name: String,
    node: Node<T>,
}

pub(crate) struct Node<T> {
    literals: HashMap<String, Node<T>>,
    dynamic: Option<Box<DynamicChild<T>>>,
    terminals: Vec<TerminalEntry<T>>,
}

impl<T> Node<T> {
    pub(crate) fn new() -> Self {
        Self { literals: HashMap::new(), dynamic: None, terminals: Vec::new() }
    }

    /// Inserts a route. Duplicate (method, pattern) registrations are
    /// appended, never rejected; lookup picks the first.
    pub(crate) fn insert(&mut self, segments: &[Segment], method: Method, value: T) -> Result<(), RouteError> {
        match segments.split_first() {
            None => {
                self.terminals.push(TerminalEntry { method, value });
                Ok(())
            }
            Some((Segment::Literal(literal), rest)) => {
                self.literals.entry(literal.clone()).or_insert_with(Node::new).insert(rest, method, value)
            }
            Some((Segment::Dynamic(name), rest)) => {
                let child = self
                    .dynamic
                    .get_or_insert_with(|| Box::new(DynamicChild { name: name.clone(), node: Node::new() }));
                if child.name != *name {
                    return Err(RouteError::conflicting_param(child.name.clone(), name.clone()));
                }
                child.node.insert(rest, method, value)
            }
        }
    }

    /// Walks the path segment-by-segment. The literal child is preferred
    /// at every level; the dynamic child is only tried when the literal
    /// branch dead-ends, with its capture unwound on backtrack.
    pub(crate) fn find<'node>(
        &'node self,
        segments: &[&str],
        method: &Method,
        captures: &mut Vec<(String, String)>,
    ) -> Option<&'node T> {
        let (head, rest) = match segments.split_first() {
            None => {
                return self.terminals.iter().find(|entry| entry.method == *method).map(|entry| &entry.value);
            }
            Some(split) => split,
        };

        if let Some(child) = self.literals.get(*head) {
            if let Some(found) = child.find(rest, method, captures) {
                return Some(found);
            }
        }

        if let Some(dynamic) = &self.dynamic {
            captures.push((dynamic.name.clone(), (*head).to_string()));
            if let Some(found) = dynamic.node.find(rest, method, captures) {
                return Some(found);
            }
            captures.pop();
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_with(routes: &[(&str, Method, u32)]) -> Node<u32> {
        let mut node = Node::new();
        for (pattern, method, id) in routes {
            let segments = parse_pattern(pattern).unwrap();
            node.insert(&segments, method.clone(), *id).unwrap();
        }
        node
    }

    fn find(node: &Node<u32>, path: &str, method: Method) -> (Option<u32>, Vec<(String, String)>) {
        let mut captures = Vec::new();
        let found = node.find(&split_path(path), &method, &mut captures).copied();
        (found, captures)
    }

    #[test]
    fn literal_route_beats_dynamic_at_the_same_depth() {
        let node = node_with(&[
            ("/customers/:id/orders", Method::GET, 1),
            ("/customers/list", Method::GET, 2),
        ]);

        let (found, captures) = find(&node, "/customers/list", Method::GET);
        assert_eq!(found, Some(2));
        assert!(captures.is_empty());
    }

    #[test]
    fn dynamic_segment_binds_its_capture() {
        let node = node_with(&[("/customers/:id/orders", Method::GET, 1)]);

        let (found, captures) = find(&node, "/customers/23/orders", Method::GET);
        assert_eq!(found, Some(1));
        assert_eq!(captures, vec![("id".to_string(), "23".to_string())]);
    }

    #[test]
    fn backtracks_into_dynamic_child_when_literal_branch_dead_ends() {
        let node = node_with(&[
            ("/a/b", Method::GET, 1),
            ("/a/:x/c", Method::GET, 2),
        ]);

        // the literal "b" branch has no "/c" below it
        let (found, captures) = find(&node, "/a/b/c", Method::GET);
        assert_eq!(found, Some(2));
        assert_eq!(captures, vec![("x".to_string(), "b".to_string())]);
    }

    #[test]
    fn stale_captures_are_unwound_on_backtrack() {
        let node = node_with(&[
            ("/a/:x/c", Method::GET, 1),
            ("/a/:x", Method::GET, 2),
        ]);

        let (found, captures) = find(&node, "/a/b", Method::GET);
        assert_eq!(found, Some(2));
        assert_eq!(captures, vec![("x".to_string(), "b".to_string())]);
    }

    #[test]
    fn method_must_match_a_terminal_entry() {
        let node = node_with(&[("/things", Method::GET, 1)]);

        let (found, _) = find(&node, "/things", Method::POST);
        assert_eq!(found, None);
    }

    #[test]
    fn duplicate_registration_is_first_registered_wins() {
        let node = node_with(&[
            ("/dup", Method::GET, 1),
            ("/dup", Method::GET, 2),
        ]);

        let (found, _) = find(&node, "/dup", Method::GET);
        assert_eq!(found, Some(1));
    }

    #[test]
    fn root_pattern_matches_root_path() {
        let node = node_with(&[("/", Method::GET, 1)]);

        let (found, _) = find(&node, "/", Method::GET);
        assert_eq!(found, Some(1));
    }

    #[test]
    fn conflicting_dynamic_names_are_rejected() {
        let mut node: Node<u32> = Node::new();
        node.insert(&parse_pattern("/x/:id").unwrap(), Method::GET, 1).unwrap();
        let result = node.insert(&parse_pattern("/x/:name").unwrap(), Method::GET, 2);
        assert!(matches!(result, Err(RouteError::ConflictingParam { .. })));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        assert!(matches!(parse_pattern("/a//b"), Err(RouteError::InvalidPattern { .. })));
        assert!(matches!(parse_pattern("/a/:"), Err(RouteError::InvalidPattern { .. })));
    }
}
