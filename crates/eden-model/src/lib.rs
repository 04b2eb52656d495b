//! Resolved `Model` and `SimulatorConfig` interface types.
//!
//! These are the data types handed to the compiler by its external
//! collaborators: a NeuroML/LEMS parser (out of scope here) resolves a
//! declarative description into a [`Model`]; a command-line front end (also
//! out of scope) resolves user options into a [`SimulatorConfig`]. Nothing in
//! this crate parses NeuroML or command-line arguments — it only defines the
//! shapes those processes must produce.

#![deny(missing_docs)]

pub mod error;

pub use error::{ModelError, Result};

use serde::{Deserialize, Serialize};

/// Addresses a point on a membrane, for synapses, gap junctions, and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointOnCell {
    /// Population id.
    pub population: u32,
    /// Cell instance index within the population.
    pub cell_instance: u32,
    /// Segment (compartment) id within the cell.
    pub segment: u32,
    /// Fraction along the segment, in fixed-point per-mille to keep the type `Eq`/`Hash`.
    pub fraction_along_permille: u16,
}

impl PointOnCell {
    /// Construct a point from a floating fraction-along value in `[0, 1]`.
    pub fn new(population: u32, cell_instance: u32, segment: u32, fraction_along: f32) -> Self {
        Self {
            population,
            cell_instance,
            segment,
            fraction_along_permille: (fraction_along.clamp(0.0, 1.0) * 1000.0).round() as u16,
        }
    }

    /// The fraction-along value as a float in `[0, 1]`.
    pub fn fraction_along(&self) -> f32 {
        self.fraction_along_permille as f32 / 1000.0
    }
}

/// Addresses one column of one output log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataWriterColumn {
    /// Owning data writer id.
    pub writer_id: u32,
    /// Column id within the writer.
    pub column_id: u32,
}

/// One LEMS-defined cell type: a set of compartments (segments) with their
/// adjacency, ion channel distributions, and the scale factors needed to
/// lower dimensional quantities into the engine's native unit system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellType {
    /// Unique id within the model.
    pub id: u32,
    /// Human-readable name, used in diagnostics and emitted file names.
    pub name: String,
    /// Segment count; a single-compartment point neuron has exactly one.
    pub segment_count: u32,
    /// Parent segment of each segment, used for the backward-Euler elimination
    /// order; the root segment is its own parent.
    pub segment_parent: Vec<u32>,
    /// Per-segment membrane capacitance, in nF, indexed by segment id.
    pub capacitance_nf: Vec<f32>,
    /// Per-segment axial resistance to `segment_parent[i]`, in MΩ, indexed by
    /// segment id; the root's own entry is never read.
    pub axial_resistance_mohm: Vec<f32>,
    /// Channel distributions attached to this cell type, by segment.
    pub channel_distributions: Vec<ChannelDistribution>,
    /// Whether this cell type declares a spike threshold (required for any
    /// projection that sources a spike from it).
    pub has_spike_threshold: bool,
    /// The membrane potential (segment 0) a spike threshold crossing fires
    /// at, in mV. Only meaningful when `has_spike_threshold` is set.
    pub spike_threshold_mv: f32,
}

impl CellType {
    /// Total number of gate-state scalar slots this cell type needs, one per
    /// `(channel distribution, gate)` pair, in `channel_distributions`
    /// iteration order (§4.3.2). Allocated immediately after the per-segment
    /// voltage states, so a work item's full scalar state layout is
    /// `[v_seg0, .., v_seg{N-1}, gate0, gate1, ..]`.
    pub fn gate_state_count(&self) -> u32 {
        self.channel_distributions.iter().map(|ch| ch.gates.len() as u32).sum()
    }

    /// The scalar state slot for gate `gate_idx` of channel distribution
    /// `chan_idx`, counting past the per-segment voltage slots. Both the
    /// Instantiator and the Kernel Emitter compute this the same way by
    /// replaying the same `channel_distributions` iteration order, so the
    /// two crates never need to exchange an explicit slot table.
    pub fn gate_scalar_slot(&self, chan_idx: usize, gate_idx: usize) -> u32 {
        let mut slot = self.segment_count;
        for (i, ch) in self.channel_distributions.iter().enumerate() {
            if i == chan_idx {
                return slot + gate_idx as u32;
            }
            slot += ch.gates.len() as u32;
        }
        panic!("gate_scalar_slot: channel distribution {chan_idx} out of range");
    }
}

/// Nernst equilibrium potential for an ion of the given valence, in mV, from
/// internal/external concentrations in mM, at the engine's fixed reference
/// temperature (310 K / 37 C). Used for both `Nernst`/`NernstCa2` reversal
/// potentials and, as a documented simplification of the true nonlinear GHK
/// flux equation, for `Ghk`/`Ghk2` as well (see DESIGN.md).
pub fn nernst_mv(valence: i32, conc_in_mm: f32, conc_out_mm: f32) -> f32 {
    const GAS_CONSTANT: f32 = 8.314;
    const TEMPERATURE_K: f32 = 310.0;
    const FARADAY: f32 = 96_485.0;
    (GAS_CONSTANT * TEMPERATURE_K / (valence as f32 * FARADAY)) * (conc_out_mm / conc_in_mm).ln() * 1000.0
}

/// One ion channel distribution on one segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDistribution {
    /// Segment this distribution is attached to.
    pub segment: u32,
    /// Conductance density scaling, in the engine's native units.
    pub g_bar: f32,
    /// How the reversal potential for this distribution is computed.
    pub reversal: ReversalKind,
    /// Gate kinetics for this channel (possibly empty, e.g. a leak channel).
    pub gates: Vec<GateKinetics>,
}

/// Reversal potential computation strategy (§4.3.2). `Nernst`/`Ghk` carry the
/// ion valence and the in/out concentrations needed to evaluate
/// [`nernst_mv`]; the concentrations are cell-type-level constants in this
/// design (no live ion-concentration state), so the reversal potential is a
/// fixed value baked in at codegen time rather than recomputed per step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ReversalKind {
    /// Constant reversal potential.
    Fixed(f32),
    /// Nernst equation from a single ion's concentration.
    Nernst {
        /// Ion valence.
        valence: i32,
        /// Internal concentration, in mM.
        conc_in_mm: f32,
        /// External concentration, in mM.
        conc_out_mm: f32,
    },
    /// Nernst equation specialized for calcium (valence fixed at 2).
    NernstCa2 {
        /// Internal concentration, in mM.
        conc_in_mm: f32,
        /// External concentration, in mM.
        conc_out_mm: f32,
    },
    /// Goldman-Hodgkin-Katz. Approximated here by the Nernst potential of the
    /// same ion (see DESIGN.md) rather than the full nonlinear flux integral.
    Ghk {
        /// Ion valence.
        valence: i32,
        /// Internal concentration, in mM.
        conc_in_mm: f32,
        /// External concentration, in mM.
        conc_out_mm: f32,
    },
    /// Goldman-Hodgkin-Katz, two-ion variant; approximated the same way as
    /// [`ReversalKind::Ghk`].
    Ghk2 {
        /// Ion valence.
        valence: i32,
        /// Internal concentration, in mM.
        conc_in_mm: f32,
        /// External concentration, in mM.
        conc_out_mm: f32,
    },
    /// Explicit per-population reversal potential.
    Population {
        /// Reversal potential, in mV.
        e_rev_mv: f32,
    },
}

/// A closed-form rate function for HH-style gate kinetics (§4.3.2), lowered
/// by the kernel emitter into a `static inline` C helper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RateFn {
    /// A constant rate, independent of membrane voltage.
    Constant(f32),
    /// A sigmoidal voltage dependence: `rate / (1 + exp((v - midpoint_mv) / scale_mv))`.
    Sigmoid {
        /// Peak rate.
        rate: f32,
        /// Half-activation voltage, in mV.
        midpoint_mv: f32,
        /// Slope scale, in mV.
        scale_mv: f32,
    },
}

/// One HH-style or kinetic-scheme gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GateKinetics {
    /// `alpha`/`beta` rate functions, converted to `tau`/`inf` at codegen time.
    AlphaBeta {
        /// Opening rate.
        alpha: RateFn,
        /// Closing rate.
        beta: RateFn,
        /// Gate exponent.
        power: u32,
    },
    /// Directly specified `tau`/`inf` steady-state gate.
    TauInf {
        /// Time constant, in ms.
        tau: RateFn,
        /// Steady-state value.
        inf: RateFn,
        /// Gate exponent.
        power: u32,
    },
    /// Explicit N-state kinetic scheme with a transition rate matrix.
    KineticScheme {
        /// Number of states.
        states: u32,
    },
}

/// A named, sized group of cell instances of one cell type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Population {
    /// Population id.
    pub id: u32,
    /// Name, used in diagnostics.
    pub name: String,
    /// Cell type shared by every instance.
    pub cell_type: u32,
    /// Number of instances.
    pub size: u32,
}

/// One synaptic or gap-junction endpoint connecting two populations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projection {
    /// Projection name, used in diagnostics.
    pub name: String,
    /// Presynaptic population.
    pub pre_population: u32,
    /// Postsynaptic population.
    pub post_population: u32,
    /// Whether this projection requires spike delivery (as opposed to being a
    /// continuous gap junction that only needs a peer voltage).
    pub is_spiking: bool,
    /// The aggregate-current kinetics the kernel emitter (§4.3.3) lowers for
    /// every connection in this projection.
    pub kinetics: SynapseKinetics,
    /// Individual connections within this projection.
    pub connections: Vec<Connection>,
}

/// Aggregate-current kinetics for one projection (§4.3.3).
///
/// Every synaptic component exposes an aggregate current accumulated in a
/// loop over instances; this is the declarative description the kernel
/// emitter lowers into that loop body. `GapJunction` requires only a peer
/// voltage (continuous, no delay line); `Exponential` requires a delay-line
/// spike trigger and decays the conductance between deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SynapseKinetics {
    /// A continuous linear gap junction: `I = G * (V_peer - V_local)`.
    GapJunction {
        /// Conductance, in µS.
        conductance_us: f32,
    },
    /// A single-exponential conductance synapse: on each delivered spike the
    /// conductance jumps by `gbase_us * weight` and then decays with time
    /// constant `tau_ms`; current is `g * (erev_mv - V_local)`.
    Exponential {
        /// Base conductance increment per delivered spike, in µS.
        gbase_us: f32,
        /// Decay time constant, in ms.
        tau_ms: f32,
        /// Reversal potential, in mV.
        erev_mv: f32,
    },
}

/// One instantiated synapse or gap junction between two points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Presynaptic point.
    pub pre: PointOnCell,
    /// Postsynaptic point.
    pub post: PointOnCell,
    /// Synaptic weight, engine-native units.
    pub weight: f32,
    /// Delivery delay in milliseconds (spiking projections only).
    pub delay_ms: f32,
}

/// One external stimulus applied to a point on a cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Input {
    /// Target point.
    pub target: PointOnCell,
    /// Stimulus kind.
    pub kind: InputKind,
}

/// Input stimulus kinds (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InputKind {
    /// A rectangular current pulse.
    Pulse {
        /// Amplitude in nA.
        amplitude_na: f32,
        /// Start time in ms.
        start_ms: f32,
        /// Duration in ms.
        duration_ms: f32,
    },
    /// An explicit list of spike times; the instantiator appends a `+inf` sentinel.
    SpikeList {
        /// Spike times in ms, ascending.
        times_ms: Vec<f32>,
    },
    /// A LEMS component instance with named parameter values.
    Component {
        /// Component type name.
        component_type: String,
        /// Named parameter values.
        parameters: Vec<(String, f32)>,
    },
}

/// One trajectory log file and its columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataWriter {
    /// Data writer id.
    pub id: u32,
    /// Output file path.
    pub path: String,
    /// Columns, in the order they will be written.
    pub columns: Vec<DataWriterColumnSpec>,
}

/// One column's source point and unit scaling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataWriterColumnSpec {
    /// Source point on a cell.
    pub source: PointOnCell,
    /// Scale factor applied to convert engine-native units to the requested
    /// logging units.
    pub scale_factor: f32,
}

/// A fully resolved model: the compiler's sole input besides [`SimulatorConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    /// Declared cell types.
    pub cell_types: Vec<CellType>,
    /// Declared populations.
    pub populations: Vec<Population>,
    /// Declared projections.
    pub projections: Vec<Projection>,
    /// Declared inputs.
    pub inputs: Vec<Input>,
    /// Declared data writers.
    pub data_writers: Vec<DataWriter>,
}

impl Model {
    /// Total neuron count across all populations, in declaration order — this
    /// is the domain the decomposer partitions across ranks (§4.5).
    pub fn total_neurons(&self) -> u32 {
        self.populations.iter().map(|p| p.size).sum()
    }

    /// Validate cross-references between populations, projections, and cell
    /// types (a subset of Model-malformed checks; full validation also
    /// happens incrementally in the Signature Builder and Instantiator).
    pub fn validate(&self) -> Result<()> {
        for pop in &self.populations {
            if !self.cell_types.iter().any(|c| c.id == pop.cell_type) {
                return Err(ModelError::UnknownCellType {
                    population: pop.name.clone(),
                    cell_type: pop.cell_type,
                });
            }
        }
        for proj in &self.projections {
            if !proj.is_spiking {
                continue;
            }
            let Some(post_pop) = self.populations.iter().find(|p| p.id == proj.post_population) else {
                continue;
            };
            let Some(cell_type) = self.cell_types.iter().find(|c| c.id == post_pop.cell_type) else {
                continue;
            };
            if !cell_type.has_spike_threshold {
                if let Some(conn) = proj.connections.first() {
                    return Err(ModelError::SpikingConnectionWithoutThreshold {
                        projection: proj.name.clone(),
                        population: post_pop.name.clone(),
                        segment: conn.post.segment,
                    });
                }
            }
        }
        Ok(())
    }
}

/// The cable equation integrator choice (§6 Inputs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CableSolver {
    /// Choose backward Euler unless the model indicates otherwise.
    Auto,
    /// Always use forward Euler.
    FwdEuler,
    /// Always use backward Euler (the default per §4.3.4).
    BwdEuler,
}

impl Default for CableSolver {
    fn default() -> Self {
        CableSolver::Auto
    }
}

/// Recognized simulator configuration options (§6 Inputs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Override the base RNG seed; `None` uses the model-supplied default.
    pub rng_seed: Option<u64>,
    /// Cable integrator choice.
    pub cable_solver: CableSolver,
    /// Verbose logging.
    pub verbose: bool,
    /// Debug logging.
    pub debug: bool,
    /// Debug logging specific to the network/decomposition code path.
    pub debug_netcode: bool,
    /// Dump the raw scalar state vector at startup.
    pub dump_raw_state_scalar: bool,
    /// Dump raw table state at startup.
    pub dump_raw_state_table: bool,
    /// Dump the raw table layout (sizes, offsets) at startup.
    pub dump_raw_layout: bool,
    /// Dump array locations (pointers) for debugging generated code.
    pub dump_array_locations: bool,
    /// Prefer `icc` over the default system C compiler.
    pub use_icc: bool,
    /// Also emit assembly (`-S`) alongside the compiled shared object.
    pub emit_assembly: bool,
    /// Initial simulation time, in ms.
    pub t_initial: f32,
    /// Final simulation time, in ms.
    pub t_final: f32,
    /// Timestep, in ms.
    pub dt: f32,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            rng_seed: None,
            cable_solver: CableSolver::BwdEuler,
            verbose: false,
            debug: false,
            debug_netcode: false,
            dump_raw_state_scalar: false,
            dump_raw_state_table: false,
            dump_raw_layout: false,
            dump_array_locations: false,
            use_icc: false,
            emit_assembly: false,
            t_initial: 0.0,
            t_final: 100.0,
            dt: 0.01,
        }
    }
}

impl SimulatorConfig {
    /// Validate the numeric fields carry a sane domain.
    pub fn validate(&self) -> Result<()> {
        if self.dt <= 0.0 {
            return Err(ModelError::InvalidConfig {
                field: "dt".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.t_final < self.t_initial {
            return Err(ModelError::InvalidConfig {
                field: "t_final".to_string(),
                reason: "must be >= t_initial".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> Model {
        Model {
            cell_types: vec![CellType {
                id: 0,
                name: "passive".to_string(),
                segment_count: 1,
                segment_parent: vec![0],
                capacitance_nf: vec![1.0],
                axial_resistance_mohm: vec![0.0],
                channel_distributions: vec![],
                has_spike_threshold: true,
                spike_threshold_mv: -20.0,
            }],
            populations: vec![Population { id: 0, name: "pop0".to_string(), cell_type: 0, size: 10 }],
            projections: vec![],
            inputs: vec![],
            data_writers: vec![],
        }
    }

    #[test]
    fn total_neurons_sums_populations() {
        let m = sample_model();
        assert_eq!(m.total_neurons(), 10);
    }

    #[test]
    fn validate_rejects_unknown_cell_type() {
        let mut m = sample_model();
        m.populations[0].cell_type = 99;
        assert!(matches!(m.validate(), Err(ModelError::UnknownCellType { .. })));
    }

    #[test]
    fn validate_rejects_spiking_projection_without_threshold() {
        let mut m = sample_model();
        m.cell_types[0].has_spike_threshold = false;
        m.projections.push(Projection {
            name: "proj0".to_string(),
            pre_population: 0,
            post_population: 0,
            is_spiking: true,
            kinetics: SynapseKinetics::Exponential { gbase_us: 0.001, tau_ms: 2.0, erev_mv: 0.0 },
            connections: vec![Connection {
                pre: PointOnCell::new(0, 0, 0, 0.5),
                post: PointOnCell::new(0, 1, 0, 0.5),
                weight: 1.0,
                delay_ms: 1.0,
            }],
        });
        assert!(matches!(m.validate(), Err(ModelError::SpikingConnectionWithoutThreshold { .. })));
    }

    #[test]
    fn point_on_cell_fraction_along_roundtrips_approximately() {
        let p = PointOnCell::new(0, 0, 0, 0.333);
        assert!((p.fraction_along() - 0.333).abs() < 0.001);
    }

    #[test]
    fn simulator_config_defaults_are_valid() {
        assert!(SimulatorConfig::default().validate().is_ok());
    }

    #[test]
    fn simulator_config_rejects_nonpositive_dt() {
        let mut cfg = SimulatorConfig::default();
        cfg.dt = 0.0;
        assert!(cfg.validate().is_err());
    }
}
