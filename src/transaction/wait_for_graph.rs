use std::collections::{HashMap, HashSet, VecDeque};

use super::TransactionID;

/// The waits-for graph of the lock manager. An edge `a -> b` means "a is
/// blocked waiting for a latch held by b". Pure identifier data, no
/// back-pointers.
#[derive(Debug)]
pub(crate) struct WaitForGraph {
    // key: transaction id, value: the transactions that the key transaction is waiting for
    graph: HashMap<TransactionID, HashSet<TransactionID>>,
}

impl WaitForGraph {
    pub(crate) fn new() -> Self {
        Self {
            graph: HashMap::new(),
        }
    }

    pub(crate) fn add_edge(&mut self, from: TransactionID, to: TransactionID) {
        if from == to {
            return;
        }

        self.graph.entry(from).or_insert_with(HashSet::new).insert(to);
    }

    pub(crate) fn add_edges(
        &mut self,
        from: TransactionID,
        tos: impl IntoIterator<Item = TransactionID>,
    ) {
        for to in tos {
            self.add_edge(from, to);
        }
    }

    /// Drop the out-edges of the given transaction. Used when a blocked
    /// request re-examines its blockers, so stale edges don't survive a
    /// wake-up.
    pub(crate) fn remove_waiter(&mut self, tid: TransactionID) {
        self.graph.remove(&tid);
    }

    /// Drop the transaction both as a waiter and as a target of every
    /// other waiter.
    pub(crate) fn remove_node(&mut self, tid: TransactionID) {
        self.graph.remove(&tid);

        self.graph.retain(|_, waits_on| {
            waits_on.remove(&tid);
            !waits_on.is_empty()
        });
    }

    /// Check if a cycle is reachable from the given transaction.
    ///
    /// Breadth-first traversal: the graph is bounded by the number of
    /// currently blocked transactions, and the only cycle that matters
    /// to an acquisition is one the requester itself is part of.
    pub(crate) fn has_cycle_from(&self, root: TransactionID) -> bool {
        let mut visited: HashSet<TransactionID> = HashSet::new();
        let mut frontier: VecDeque<TransactionID> = VecDeque::new();
        frontier.push_back(root);

        while let Some(n) = frontier.pop_front() {
            visited.insert(n);

            if let Some(neighbors) = self.graph.get(&n) {
                for &m in neighbors {
                    if visited.contains(&m) {
                        return true;
                    }
                    frontier.push_back(m);
                }
            }
        }

        false
    }
}
