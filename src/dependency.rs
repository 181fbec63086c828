//! Construction-order dependency graph
//!
//! Elements are emitted in document order unless a data dependency forces
//! an element forward: an element that is read during another element's
//! construction or assignments must be fully built first. The graph is
//! tiny (one node per element), so ordering scans the whole ready set each
//! round to keep the tie-break deterministic.

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// `edges[node]` lists the nodes that must be built before `node`.
    edges: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn new(node_count: usize) -> Self {
        Self {
            edges: vec![Vec::new(); node_count],
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Record that `node` reads `depends_on` and must be built after it.
    pub fn add_dependency(&mut self, node: usize, depends_on: usize) {
        if node == depends_on {
            // An element may reference itself through a binding on its own
            // property; construction still only needs one pass.
            return;
        }
        if !self.edges[node].contains(&depends_on) {
            self.edges[node].push(depends_on);
        }
    }

    pub fn dependencies(&self, node: usize) -> &[usize] {
        &self.edges[node]
    }

    /// Total construction order: every node after all of its dependencies,
    /// ties broken toward the smallest node index so document order is
    /// preserved wherever dependencies allow.
    ///
    /// On a cycle, returns the members of one cycle in dependency order,
    /// each exactly once.
    pub fn order(&self) -> Result<Vec<usize>, Vec<usize>> {
        let count = self.edges.len();
        let mut emitted = vec![false; count];
        let mut order = Vec::with_capacity(count);

        while order.len() < count {
            let next = (0..count).find(|&node| {
                !emitted[node] && self.edges[node].iter().all(|&dep| emitted[dep])
            });
            match next {
                Some(node) => {
                    emitted[node] = true;
                    order.push(node);
                }
                None => return Err(self.extract_cycle(&emitted)),
            }
        }

        Ok(order)
    }

    /// Walk unmet dependencies from the smallest stuck node until a node
    /// repeats, then cut the walk down to the loop itself.
    fn extract_cycle(&self, emitted: &[bool]) -> Vec<usize> {
        let start = (0..self.edges.len())
            .find(|&node| !emitted[node])
            .unwrap_or(0);

        let mut path = Vec::new();
        let mut current = start;

        loop {
            if let Some(position) = path.iter().position(|&n| n == current) {
                return path[position..].to_vec();
            }
            path.push(current);

            current = match self.edges[current].iter().find(|&&dep| !emitted[dep]) {
                Some(&dep) => dep,
                // Shouldn't happen when order() failed, but don't loop forever.
                None => return path,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_no_dependencies_keeps_document_order() {
        let graph = DependencyGraph::new(4);
        assert_eq!(graph.order().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_dependency_pulls_element_forward() {
        // Element 0 reads element 2, so 2 must be built first; element 1
        // stays in place.
        let mut graph = DependencyGraph::new(3);
        graph.add_dependency(0, 2);
        assert_eq!(graph.order().unwrap(), vec![1, 2, 0]);
    }

    #[test]
    fn test_chain_ordering() {
        let mut graph = DependencyGraph::new(3);
        graph.add_dependency(0, 1);
        graph.add_dependency(1, 2);
        assert_eq!(graph.order().unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn test_ties_break_toward_smaller_index() {
        let mut graph = DependencyGraph::new(4);
        graph.add_dependency(3, 1);
        // 0, 1, 2 are all ready; smallest first.
        assert_eq!(graph.order().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_cycle_reports_each_member_once() {
        let mut graph = DependencyGraph::new(4);
        graph.add_dependency(1, 2);
        graph.add_dependency(2, 3);
        graph.add_dependency(3, 1);

        let cycle = graph.order().unwrap_err();
        assert_eq!(cycle.len(), 3);
        let members: HashSet<_> = cycle.iter().copied().collect();
        assert_eq!(members, HashSet::from([1, 2, 3]));
    }

    #[test]
    fn test_self_dependency_is_ignored() {
        let mut graph = DependencyGraph::new(2);
        graph.add_dependency(0, 0);
        assert_eq!(graph.order().unwrap(), vec![0, 1]);
    }
}
