//! Signature Builder (§4.2): for each cell type, produce a `WorkItemSignature`
//! describing how many scalars and tables the cell uses, independent of any
//! specific instance's numeric data. The Instantiator later applies instance
//! data against this abstract layout.

#![deny(missing_docs)]

use std::collections::HashMap;

use eden_model::CellType;
use eden_tables::TableFamily;

/// A symbolic scalar slot: an index into the signature's own scalar vectors,
/// to be mapped onto a real work item's slice by the Instantiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScalarSlot(pub u32);

/// A symbolic table declaration within one of the four families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableSlot(pub u32);

/// Appends to scalar constant/state vectors; used for per-cell state
/// (compartment voltages, the cell-level RNG seed) and for LEMS components
/// with exactly one instance per cell.
#[derive(Debug, Default)]
pub struct SingleInstanceAllocator {
    constants: Vec<&'static str>,
    state: Vec<&'static str>,
}

impl SingleInstanceAllocator {
    /// Allocate a new scalar constant slot, named for diagnostics.
    pub fn alloc_constant(&mut self, name: &'static str) -> ScalarSlot {
        let slot = ScalarSlot(self.constants.len() as u32);
        self.constants.push(name);
        slot
    }

    /// Allocate a new scalar state slot, named for diagnostics.
    pub fn alloc_state(&mut self, name: &'static str) -> ScalarSlot {
        let slot = ScalarSlot(self.state.len() as u32);
        self.state.push(name);
        slot
    }

    /// Number of scalar constants allocated so far.
    pub fn constant_count(&self) -> u32 {
        self.constants.len() as u32
    }

    /// Number of scalar state variables allocated so far.
    pub fn state_count(&self) -> u32 {
        self.state.len() as u32
    }
}

/// Appends to tables; used for per-synapse, per-input, per-ion-channel
/// distribution state — anything that can recur multiple times in one cell.
#[derive(Debug, Default)]
pub struct TableAllocator {
    families: HashMap<TableFamily, Vec<&'static str>>,
}

impl TableAllocator {
    /// Declare a new table within a family, named for diagnostics.
    pub fn alloc_table(&mut self, family: TableFamily, name: &'static str) -> TableSlot {
        let list = self.families.entry(family).or_default();
        let slot = TableSlot(list.len() as u32);
        list.push(name);
        slot
    }

    /// Number of tables declared in a family so far.
    pub fn table_count(&self, family: TableFamily) -> u32 {
        self.families.get(&family).map(|v| v.len() as u32).unwrap_or(0)
    }
}

/// Compartment grouping strategy for physical multi-compartment cells (§4.2).
#[derive(Debug, Clone, PartialEq)]
pub enum CompartmentStrategy {
    /// Fewer than ~10 compartments: emit inline code per compartment, no loop.
    Flat,
    /// Byte-identical generated bodies are grouped and driven by a loop over
    /// a per-group index table. `groups` maps a content hash to the list of
    /// compartment ids sharing that generated body.
    Grouped {
        /// Content-hash -> compartment ids sharing identical generated code.
        groups: Vec<(u64, Vec<u32>)>,
    },
}

/// Threshold below which the `FLAT` strategy is used, per §4.2.
pub const FLAT_COMPARTMENT_THRESHOLD: u32 = 10;

/// Choose a compartment grouping strategy for a cell type, deduplicating
/// compartments whose generated code would be byte-identical. `code_of` must
/// be a deterministic function from segment id to the text that would be
/// generated for it (so dedup can hash it), without actually emitting C.
pub fn choose_compartment_strategy(
    segment_count: u32,
    code_of: impl Fn(u32) -> String,
) -> CompartmentStrategy {
    if segment_count < FLAT_COMPARTMENT_THRESHOLD {
        return CompartmentStrategy::Flat;
    }
    let mut groups: Vec<(u64, Vec<u32>)> = Vec::new();
    for seg in 0..segment_count {
        let hash = fnv1a(code_of(seg).as_bytes());
        match groups.iter_mut().find(|(h, _)| *h == hash) {
            Some((_, members)) => members.push(seg),
            None => groups.push((hash, vec![seg])),
        }
    }
    CompartmentStrategy::Grouped { groups }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Backward-Euler elimination order: a DFS post-order over the compartment
/// adjacency tree, plus the parent list used by the tree-sweep solver
/// (§4.2, §4.3.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EliminationOrder {
    /// Compartments in post-order (children before their parent).
    pub order_list: Vec<u32>,
    /// Parent of each compartment; the root is its own parent.
    pub parent_list: Vec<u32>,
}

/// Compute the elimination order from a segment's parent array. `parent[i]`
/// is the parent segment of segment `i`; the root segment satisfies
/// `parent[root] == root`.
pub fn compute_elimination_order(parent: &[u32]) -> EliminationOrder {
    let n = parent.len();
    let mut children: Vec<Vec<u32>> = vec![Vec::new(); n];
    let mut root = 0u32;
    for (i, &p) in parent.iter().enumerate() {
        if p as usize == i {
            root = i as u32;
        } else {
            children[p as usize].push(i as u32);
        }
    }

    let mut order_list = Vec::with_capacity(n);
    let mut stack = vec![(root, false)];
    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            order_list.push(node);
            continue;
        }
        stack.push((node, true));
        for &child in &children[node as usize] {
            stack.push((child, false));
        }
    }

    EliminationOrder { order_list, parent_list: parent.to_vec() }
}

/// The abstract layout for one cell type, independent of any instance's data.
#[derive(Debug, Default)]
pub struct WorkItemSignature {
    /// Scalar constant/state allocator.
    pub scalars: SingleInstanceAllocator,
    /// Table allocator across all four families.
    pub tables: TableAllocator,
    /// Number of RNG draws this cell type's kernel performs per step (used to
    /// size any per-step RNG state the instantiator must seed).
    pub random_call_count: u32,
    /// Compartment grouping strategy, for physical multi-compartment cells
    /// (point neurons use `Flat` with a single compartment).
    pub compartment_strategy: Option<CompartmentStrategy>,
    /// Backward-Euler elimination order, for cells using the cable solver.
    pub elimination_order: Option<EliminationOrder>,
}

impl WorkItemSignature {
    /// Build a signature for a cell type: allocate the per-compartment voltage
    /// state, decide the compartment strategy, and (for multi-compartment
    /// cells) compute the elimination order.
    pub fn build(cell_type: &CellType) -> Self {
        let mut sig = WorkItemSignature::default();
        for seg in 0..cell_type.segment_count {
            let _ = sig.scalars.alloc_state(Box::leak(format!("v_seg{seg}").into_boxed_str()));
        }
        // One gate-state slot per (channel distribution, gate), in the same
        // order `CellType::gate_scalar_slot` replays, so the slot numbers the
        // Instantiator and the Kernel Emitter compute independently always
        // agree without exchanging an explicit table.
        for (c, ch) in cell_type.channel_distributions.iter().enumerate() {
            for g in 0..ch.gates.len() {
                let _ = sig.scalars.alloc_state(Box::leak(format!("gate_{c}_{g}").into_boxed_str()));
            }
        }
        if cell_type.segment_count > 1 {
            sig.elimination_order = Some(compute_elimination_order(&cell_type.segment_parent));
            sig.compartment_strategy = Some(choose_compartment_strategy(cell_type.segment_count, |_| {
                "v_next = v + dt".to_string()
            }));
        } else {
            sig.compartment_strategy = Some(CompartmentStrategy::Flat);
        }
        sig
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_instance_allocator_assigns_increasing_slots() {
        let mut a = SingleInstanceAllocator::default();
        let s0 = a.alloc_state("v");
        let s1 = a.alloc_state("ca_conc");
        assert_eq!(s0, ScalarSlot(0));
        assert_eq!(s1, ScalarSlot(1));
        assert_eq!(a.state_count(), 2);
    }

    #[test]
    fn table_allocator_tracks_families_independently() {
        let mut t = TableAllocator::default();
        t.alloc_table(TableFamily::ConstF32, "weight");
        t.alloc_table(TableFamily::ConstF32, "delay");
        t.alloc_table(TableFamily::StateI64, "trigger");
        assert_eq!(t.table_count(TableFamily::ConstF32), 2);
        assert_eq!(t.table_count(TableFamily::StateI64), 1);
        assert_eq!(t.table_count(TableFamily::ConstI64), 0);
    }

    #[test]
    fn flat_strategy_below_threshold() {
        let strat = choose_compartment_strategy(5, |_| "x".to_string());
        assert_eq!(strat, CompartmentStrategy::Flat);
    }

    #[test]
    fn grouped_strategy_dedupes_identical_bodies() {
        // 12 compartments, even ones get code "A", odd ones get code "B".
        let strat = choose_compartment_strategy(12, |seg| if seg % 2 == 0 { "A".to_string() } else { "B".to_string() });
        match strat {
            CompartmentStrategy::Grouped { groups } => {
                assert_eq!(groups.len(), 2);
                assert_eq!(groups.iter().map(|(_, m)| m.len()).sum::<usize>(), 12);
            }
            CompartmentStrategy::Flat => panic!("expected grouped strategy"),
        }
    }

    #[test]
    fn elimination_order_visits_children_before_parent() {
        // tree: 0 (root) -> 1 -> 2, 0 -> 3
        let parent = vec![0, 0, 1, 0];
        let elim = compute_elimination_order(&parent);
        assert_eq!(elim.order_list.last().copied(), Some(0));
        let pos2 = elim.order_list.iter().position(|&x| x == 2).unwrap();
        let pos1 = elim.order_list.iter().position(|&x| x == 1).unwrap();
        assert!(pos2 < pos1, "child 2 must precede its parent 1 in post-order");
    }

    #[test]
    fn signature_build_allocates_one_voltage_per_segment() {
        let ct = CellType {
            id: 0,
            name: "multi".to_string(),
            segment_count: 3,
            segment_parent: vec![0, 0, 1],
            capacitance_nf: vec![1.0, 1.0, 1.0],
            axial_resistance_mohm: vec![0.0, 10.0, 10.0],
            channel_distributions: vec![],
            has_spike_threshold: true,
            spike_threshold_mv: -20.0,
        };
        let sig = WorkItemSignature::build(&ct);
        assert_eq!(sig.scalars.state_count(), 3);
        assert!(sig.elimination_order.is_some());
    }

    #[test]
    fn signature_build_allocates_gate_state_after_voltage_slots() {
        let ct = CellType {
            id: 1,
            name: "hh".to_string(),
            segment_count: 1,
            segment_parent: vec![0],
            capacitance_nf: vec![1.0],
            axial_resistance_mohm: vec![0.0],
            channel_distributions: vec![eden_model::ChannelDistribution {
                segment: 0,
                g_bar: 1.0,
                reversal: eden_model::ReversalKind::Fixed(50.0),
                gates: vec![
                    eden_model::GateKinetics::AlphaBeta {
                        alpha: eden_model::RateFn::Constant(1.0),
                        beta: eden_model::RateFn::Constant(1.0),
                        power: 3,
                    },
                    eden_model::GateKinetics::TauInf {
                        tau: eden_model::RateFn::Constant(1.0),
                        inf: eden_model::RateFn::Constant(0.5),
                        power: 1,
                    },
                ],
            }],
            has_spike_threshold: true,
            spike_threshold_mv: -20.0,
        };
        let sig = WorkItemSignature::build(&ct);
        // 1 voltage slot + 2 gate slots.
        assert_eq!(sig.scalars.state_count(), 3);
        assert_eq!(ct.gate_state_count(), 2);
        assert_eq!(ct.gate_scalar_slot(0, 0), 1);
        assert_eq!(ct.gate_scalar_slot(0, 1), 2);
    }
}
