//! Eager cycle detection
//!
//! Edges are drawn only for eager imports: a lazy or factory import defers
//! construction of its target, so it cannot take part in a construction
//! order deadlock. Any strongly connected component of more than one part,
//! or a part eagerly importing itself, has no valid construction order.

/// Strongly connected components that form cycles, members in discovery
/// order. `edges[p]` lists the parts `p` eagerly depends on.
pub(crate) fn eager_cycles(edges: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut tarjan = Tarjan {
        edges,
        index: vec![None; edges.len()],
        lowlink: vec![0; edges.len()],
        on_stack: vec![false; edges.len()],
        stack: Vec::new(),
        next_index: 0,
        components: Vec::new(),
    };
    for node in 0..edges.len() {
        if tarjan.index[node].is_none() {
            tarjan.visit(node);
        }
    }

    tarjan
        .components
        .into_iter()
        .filter(|c| c.len() > 1 || edges[c[0]].contains(&c[0]))
        .map(|mut c| {
            c.sort_unstable();
            c
        })
        .collect()
}

struct Tarjan<'a> {
    edges: &'a [Vec<usize>],
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next_index: usize,
    components: Vec<Vec<usize>>,
}

impl Tarjan<'_> {
    /// Depth-first walk from `root` on an explicit stack of
    /// (node, next edge) frames, so chain length is not bounded by the
    /// thread's stack.
    fn visit(&mut self, root: usize) {
        let edges = self.edges;
        let mut frames: Vec<(usize, usize)> = Vec::new();
        self.open(root);
        frames.push((root, 0));

        while let Some(frame) = frames.last_mut() {
            let (node, next_edge) = *frame;
            if let Some(&next) = edges[node].get(next_edge) {
                frame.1 += 1;
                match self.index[next] {
                    None => {
                        self.open(next);
                        frames.push((next, 0));
                    }
                    Some(next_index) if self.on_stack[next] => {
                        self.lowlink[node] = self.lowlink[node].min(next_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                self.lowlink[parent] = self.lowlink[parent].min(self.lowlink[node]);
            }
            if Some(self.lowlink[node]) == self.index[node] {
                self.close(node);
            }
        }
    }

    fn open(&mut self, node: usize) {
        self.index[node] = Some(self.next_index);
        self.lowlink[node] = self.next_index;
        self.next_index += 1;
        self.stack.push(node);
        self.on_stack[node] = true;
    }

    fn close(&mut self, node: usize) {
        let mut component = Vec::new();
        while let Some(member) = self.stack.pop() {
            self.on_stack[member] = false;
            component.push(member);
            if member == node {
                break;
            }
        }
        self.components.push(component);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acyclic_graph() {
        let edges = vec![vec![1], vec![2], vec![]];
        assert!(eager_cycles(&edges).is_empty());
    }

    #[test]
    fn test_two_node_cycle() {
        let edges = vec![vec![1], vec![0], vec![0]];
        assert_eq!(eager_cycles(&edges), vec![vec![0, 1]]);
    }

    #[test]
    fn test_self_loop() {
        let edges = vec![vec![0], vec![]];
        assert_eq!(eager_cycles(&edges), vec![vec![0]]);
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        const LEN: usize = 300_000;
        let mut edges: Vec<Vec<usize>> = (0..LEN).map(|p| vec![p + 1]).collect();
        edges[LEN - 1] = vec![];
        assert!(eager_cycles(&edges).is_empty());

        edges[LEN - 1] = vec![0];
        let cycles = eager_cycles(&edges);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), LEN);
    }

    #[test]
    fn test_cycle_behind_a_tail() {
        // 0 -> 1 -> 2 -> 3 -> 1
        let edges = vec![vec![1], vec![2], vec![3], vec![1]];
        assert_eq!(eager_cycles(&edges), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn test_separate_cycles() {
        let edges = vec![vec![1], vec![0], vec![3], vec![4], vec![2]];
        let mut cycles = eager_cycles(&edges);
        cycles.sort();
        assert_eq!(cycles, vec![vec![0, 1], vec![2, 3, 4]]);
    }
}
