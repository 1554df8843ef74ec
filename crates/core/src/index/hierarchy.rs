use super::ProjectIndex;
use crate::model::Method;
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashSet, VecDeque};
use tokio_util::sync::CancellationToken;

/// What the ancestor walk learns about one class identifier.
struct AncestorNode {
    parents: Vec<String>,
    /// Declares the searched signature in a way that can root a dispatch family.
    declares: bool,
}

impl ProjectIndex {
    /// Every transitive superclass and interface of `identifier`, nearest first.
    ///
    /// Ancestors that are not declared in the project (framework classes) are listed
    /// but not walked further. The queried identifier never appears in the result,
    /// even through a cycle.
    pub async fn find_superclass_chain(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Vec<String> {
        let mut chain = IndexSet::new();
        let mut queue = VecDeque::from([identifier.to_string()]);
        while let Some(current) = queue.pop_front() {
            if cancel.is_cancelled() {
                break;
            }
            for (_, class) in self.find_classes(&current, cancel).await {
                for parent in class.parents() {
                    let Some(parent) = parent.class_identifier() else {
                        continue;
                    };
                    if parent != identifier && chain.insert(parent.to_string()) {
                        queue.push_back(parent.to_string());
                    }
                }
            }
        }
        chain.into_iter().collect()
    }

    /// Every class that transitively extends or implements `identifier`.
    ///
    /// Candidates are found by searching file text for `.super <id>` and
    /// `.implements <id>` and then confirmed against the parsed class, so mentions in
    /// comments or strings do not count.
    pub async fn find_subclass_identifiers(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Vec<String> {
        self.wait_ready().await;
        let mut found = IndexSet::new();
        let mut frontier = vec![identifier.to_string()];

        while !frontier.is_empty() && !cancel.is_cancelled() {
            let needles: Vec<(String, String)> = frontier
                .iter()
                .map(|id| (format!(".super {id}"), format!(".implements {id}")))
                .collect();
            let mut next = Vec::new();

            for file in self.known_files() {
                if cancel.is_cancelled() {
                    break;
                }
                let Some(source) = self.source_of(&file).await else {
                    continue;
                };
                let text = source.text();
                let mentioned = needles
                    .iter()
                    .any(|(extends, implements)| text.contains(extends) || text.contains(implements));
                if !mentioned {
                    continue;
                }
                let Some(class) = self.class(&file).await else {
                    continue;
                };
                let is_child = frontier.iter().any(|id| class.extends_or_implements(id));
                let child = class.identifier();
                if is_child && child != identifier && found.insert(child.to_string()) {
                    next.push(child.to_string());
                }
            }
            frontier = next;
        }
        found.into_iter().collect()
    }

    /// The topmost classes in the ancestry of `identifier` (itself included) that
    /// declare a method with the same signature as `method`.
    ///
    /// Private declarations root the search only when `accept_private` is set.
    /// Constructors are not inherited, so they are only rooted at `identifier`. The
    /// result is empty when nothing in the ancestry declares the method.
    pub async fn find_root_defining_classes(
        &self,
        identifier: &str,
        method: &Method,
        accept_private: bool,
        cancel: &CancellationToken,
    ) -> Vec<String> {
        if method.is_constructor() {
            let declared = self
                .find_classes(identifier, cancel)
                .await
                .iter()
                .any(|(_, class)| class.declares_method(method));
            return if declared {
                vec![identifier.to_string()]
            } else {
                Vec::new()
            };
        }

        let mut nodes: IndexMap<String, AncestorNode> = IndexMap::new();
        let mut queue = VecDeque::from([identifier.to_string()]);
        while let Some(current) = queue.pop_front() {
            if nodes.contains_key(&current) || cancel.is_cancelled() {
                continue;
            }
            let mut node = AncestorNode {
                parents: Vec::new(),
                declares: false,
            };
            for (_, class) in self.find_classes(&current, cancel).await {
                node.declares |= class
                    .find_methods(method)
                    .iter()
                    .any(|m| accept_private || !m.is_private());
                for parent in class.parents().filter_map(|p| p.class_identifier()) {
                    if !node.parents.iter().any(|p| p == parent) {
                        node.parents.push(parent.to_string());
                        queue.push_back(parent.to_string());
                    }
                }
            }
            nodes.insert(current, node);
        }

        let mut roots = IndexSet::new();
        let mut visited = HashSet::new();
        collect_roots(identifier, &nodes, &mut visited, &mut roots);
        roots.into_iter().collect()
    }
}

/// Adds the topmost declaring classes above and including `current` to `roots` and
/// reports whether any were found on this path.
fn collect_roots(
    current: &str,
    nodes: &IndexMap<String, AncestorNode>,
    visited: &mut HashSet<String>,
    roots: &mut IndexSet<String>,
) -> bool {
    if !visited.insert(current.to_string()) {
        return roots.contains(current);
    }
    let Some(node) = nodes.get(current) else {
        return false;
    };
    let mut rooted_above = false;
    for parent in &node.parents {
        rooted_above |= collect_roots(parent, nodes, visited, roots);
    }
    if rooted_above {
        return true;
    }
    if node.declares {
        roots.insert(current.to_string());
        return true;
    }
    false
}
