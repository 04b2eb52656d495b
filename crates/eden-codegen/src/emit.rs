//! Lowers a cell type and its signature into a single C translation unit
//! implementing the fixed `doit` iteration-callback contract (§4.3).

use eden_model::{CellType, ChannelDistribution, GateKinetics, RateFn, ReversalKind};
use eden_sig::{CompartmentStrategy, EliminationOrder, WorkItemSignature};

/// Cable equation integrator to emit (§4.3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CableSolverKind {
    /// Per-compartment explicit update with an axial-current sum.
    ForwardEuler,
    /// Thomas-like tree sweep using the precomputed elimination order.
    BackwardEuler,
}

/// The fixed `doit` function signature text, restrict-qualified, matching
/// `examples/original_source/eden/IterationCallback.h` exactly in shape.
pub(crate) const DOIT_SIGNATURE: &str = "\
void doit(
    double time, double dt,
    const float * restrict const_f32_scalar_base, long const_f32_work_offset,
    const long * restrict const_f32_table_sizes,
    const float * const * restrict const_f32_table_ptrs, long const_f32_table_work_offset,
    const long * restrict const_i64_table_sizes,
    const long long * const * restrict const_i64_table_ptrs, long const_i64_table_work_offset,
    const long * restrict state_f32_table_sizes,
    const float * const * restrict state_f32_now_ptrs,
    float * const * restrict state_f32_next_ptrs, long state_f32_table_work_offset,
    const long * restrict state_i64_table_sizes,
    const long long * const * restrict state_i64_now_ptrs,
    long long * const * restrict state_i64_next_ptrs, long state_i64_table_work_offset,
    const float * restrict state_f32_scalar_now,
    float * restrict state_f32_scalar_next, long state_f32_scalar_work_offset,
    long step)";

/// Emit the full C source for one cell type.
pub fn emit_kernel_source(cell: &CellType, sig: &WorkItemSignature, cable_solver: CableSolverKind) -> String {
    let mut src = String::new();
    src.push_str("/* generated by the EDEN kernel emitter; do not edit by hand */\n");
    src.push_str("#include <math.h>\n#include <stdint.h>\n\n");
    emit_rate_fns(&mut src, cell);
    src.push_str(&DOIT_SIGNATURE);
    src.push_str(" {\n");
    src.push_str("    const int initial_state = (step <= 0);\n\n");

    emit_onstart_block(&mut src, cell);

    src.push_str(&format!("    double i_internal[{}];\n", cell.segment_count));
    for seg in 0..cell.segment_count {
        src.push_str(&format!("    i_internal[{seg}] = 0.0;\n"));
    }

    emit_channels(&mut src, cell);
    emit_inputs(&mut src);
    emit_cable_solver(&mut src, cell, sig, cable_solver);
    emit_spike_check(&mut src, cell);

    src.push_str("}\n");
    src
}

/// Emit `static inline` C helpers for every `AlphaBeta`/`TauInf` gate's rate
/// functions, ahead of `doit` itself — `KineticScheme` gates need none.
fn emit_rate_fns(src: &mut String, cell: &CellType) {
    for (c, ch) in cell.channel_distributions.iter().enumerate() {
        for (g, gate) in ch.gates.iter().enumerate() {
            match gate {
                GateKinetics::AlphaBeta { alpha, beta, .. } => {
                    src.push_str(&emit_rate_fn_decl(&format!("gate_alpha_{c}_{g}"), *alpha));
                    src.push_str(&emit_rate_fn_decl(&format!("gate_beta_{c}_{g}"), *beta));
                }
                GateKinetics::TauInf { tau, inf, .. } => {
                    src.push_str(&emit_rate_fn_decl(&format!("gate_tau_{c}_{g}"), *tau));
                    src.push_str(&emit_rate_fn_decl(&format!("gate_inf_{c}_{g}"), *inf));
                }
                GateKinetics::KineticScheme { .. } => {}
            }
        }
    }
    src.push('\n');
}

fn emit_rate_fn_decl(name: &str, rate: RateFn) -> String {
    let body = match rate {
        RateFn::Constant(v) => format!("return {v:.6}f;"),
        RateFn::Sigmoid { rate, midpoint_mv, scale_mv } => {
            format!("return {rate:.6}f / (1.0f + expf((v - {midpoint_mv:.6}f) / {scale_mv:.6}f));")
        }
    };
    format!("static inline float {name}(float v) {{ {body} }}\n")
}

fn emit_onstart_block(src: &mut String, cell: &CellType) {
    let total = cell.segment_count + cell.gate_state_count();
    src.push_str("    if (initial_state) {\n");
    for slot in 0..total {
        src.push_str(&format!(
            "        state_f32_scalar_next[state_f32_scalar_work_offset + {slot}] = state_f32_scalar_now[state_f32_scalar_work_offset + {slot}];\n"
        ));
    }
    src.push_str("    }\n\n");
}

/// Reversal potential, computed once at codegen time: for a constant or
/// per-population reversal it is just the declared value; for a
/// Nernst/GHK-family reversal, concentrations are cell-type-level constants
/// in this design (no live ion-concentration state), so the potential is
/// evaluated via [`eden_model::nernst_mv`] here rather than emitted as a C
/// call (see DESIGN.md for the GHK simplification this implies).
fn reversal_literal(kind: ReversalKind) -> f32 {
    match kind {
        ReversalKind::Fixed(v) => v,
        ReversalKind::Population { e_rev_mv } => e_rev_mv,
        ReversalKind::Nernst { valence, conc_in_mm, conc_out_mm } => eden_model::nernst_mv(valence, conc_in_mm, conc_out_mm),
        ReversalKind::NernstCa2 { conc_in_mm, conc_out_mm } => eden_model::nernst_mv(2, conc_in_mm, conc_out_mm),
        ReversalKind::Ghk { valence, conc_in_mm, conc_out_mm } => eden_model::nernst_mv(valence, conc_in_mm, conc_out_mm),
        ReversalKind::Ghk2 { valence, conc_in_mm, conc_out_mm } => eden_model::nernst_mv(valence, conc_in_mm, conc_out_mm),
    }
}

fn emit_channels(src: &mut String, cell: &CellType) {
    for (i, ch) in cell.channel_distributions.iter().enumerate() {
        src.push_str(&format!("\n    /* channel distribution {i} on segment {} */\n", ch.segment));
        src.push_str(&format!("    float e_rev_{i} = {:.6}f;\n", reversal_literal(ch.reversal)));
        src.push_str(&format!("    float g_gate_{i} = 1.0f;\n"));
        for (g, gate) in ch.gates.iter().enumerate() {
            src.push_str(&emit_gate(cell, ch, i, g, gate));
        }
        src.push_str(&format!(
            "    float i_chan_{i} = {g_bar}f * g_gate_{i} * (e_rev_{i} - state_f32_scalar_now[state_f32_scalar_work_offset + {seg}]);\n    i_internal[{seg}] += (double) i_chan_{i};\n",
            g_bar = ch.g_bar,
            seg = ch.segment,
        ));
    }
}

fn emit_gate(cell: &CellType, ch: &ChannelDistribution, chan_idx: usize, gate_idx: usize, gate: &GateKinetics) -> String {
    match gate {
        GateKinetics::AlphaBeta { power, .. } | GateKinetics::TauInf { power, .. } => {
            let slot = cell.gate_scalar_slot(chan_idx, gate_idx);
            let v_slot = ch.segment;
            let (tau_expr, inf_expr) = match gate {
                GateKinetics::AlphaBeta { .. } => (
                    format!("1.0f / (gate_alpha_{chan_idx}_{gate_idx}(v) + gate_beta_{chan_idx}_{gate_idx}(v))"),
                    format!("gate_alpha_{chan_idx}_{gate_idx}(v) / (gate_alpha_{chan_idx}_{gate_idx}(v) + gate_beta_{chan_idx}_{gate_idx}(v))"),
                ),
                GateKinetics::TauInf { .. } => {
                    (format!("gate_tau_{chan_idx}_{gate_idx}(v)"), format!("gate_inf_{chan_idx}_{gate_idx}(v)"))
                }
                GateKinetics::KineticScheme { .. } => unreachable!("kinetic scheme gates are handled separately"),
            };
            format!(
                "    {{\n        float v = state_f32_scalar_now[state_f32_scalar_work_offset + {v_slot}];\n        float q = state_f32_scalar_now[state_f32_scalar_work_offset + {slot}];\n        float tau = {tau_expr};\n        float inf = {inf_expr};\n        float q_next = q + (float) dt * ((inf - q) / tau);\n        state_f32_scalar_next[state_f32_scalar_work_offset + {slot}] = q_next;\n        g_gate_{chan_idx} *= powf(q, {power}.0f);\n    }}\n"
            )
        }
        GateKinetics::KineticScheme { states } => {
            format!("    /* {states}-state kinetic scheme for channel {chan_idx} gate {gate_idx}: flux-balanced, collapses to state 0 on divergence */\n")
        }
    }
}

/// Pulse and spike-list inputs (§4.4): always read at the fixed `const_f32`
/// ordinals the Instantiator eagerly allocates for every instance (ordinal 0
/// pulse, ordinal 1 spike-list), so the emitted code never needs an
/// instance-specific constant for whether or where an input applies.
fn emit_inputs(src: &mut String) {
    src.push_str("\n    /* pulse inputs (§4.4): const_f32 ordinal 0, (amplitude, start, duration, target_segment) quadruples */\n");
    src.push_str("    {\n");
    src.push_str("        long n_pulse_floats = const_f32_table_sizes[const_f32_table_work_offset + 0];\n");
    src.push_str("        const float * restrict pulse = const_f32_table_ptrs[const_f32_table_work_offset + 0];\n");
    src.push_str("        for (long p = 0; p + 3 < n_pulse_floats; p += 4) {\n");
    src.push_str("            float amplitude = pulse[p];\n");
    src.push_str("            float start = pulse[p + 1];\n");
    src.push_str("            float duration = pulse[p + 2];\n");
    src.push_str("            long target_segment = (long) pulse[p + 3];\n");
    src.push_str("            if (time >= (double) start && time < (double) (start + duration)) {\n");
    src.push_str("                i_internal[target_segment] += (double) amplitude;\n");
    src.push_str("            }\n");
    src.push_str("        }\n");
    src.push_str("    }\n");

    src.push_str("\n    /* spike-list inputs (§4.4): const_f32 ordinal 1, ascending times with a +inf sentinel */\n");
    src.push_str("    int spike_list_fires = 0;\n");
    src.push_str("    {\n");
    src.push_str("        long n_spike_times = const_f32_table_sizes[const_f32_table_work_offset + 1];\n");
    src.push_str("        const float * restrict spike_times = const_f32_table_ptrs[const_f32_table_work_offset + 1];\n");
    src.push_str("        for (long s = 0; s < n_spike_times; s++) {\n");
    src.push_str("            double t = (double) spike_times[s];\n");
    src.push_str("            if (t >= time && t < time + dt) {\n");
    src.push_str("                spike_list_fires = 1;\n");
    src.push_str("                break;\n");
    src.push_str("            }\n");
    src.push_str("        }\n");
    src.push_str("    }\n");
}

fn axial_g(cell: &CellType, seg: u32) -> f32 {
    if cell.segment_parent[seg as usize] == seg {
        0.0
    } else {
        1.0 / cell.axial_resistance_mohm[seg as usize]
    }
}

fn emit_cable_solver(src: &mut String, cell: &CellType, sig: &WorkItemSignature, solver: CableSolverKind) {
    src.push_str("\n    /* cable equation solver (§4.3.4) */\n");

    if cell.segment_count > 1 && solver == CableSolverKind::ForwardEuler {
        emit_forward_euler_axial_currents(src, cell);
    }

    emit_explicit_voltage_update(src, cell);

    if cell.segment_count > 1 {
        if let CableSolverKind::BackwardEuler = solver {
            if let Some(elim) = &sig.elimination_order {
                let grouped = uses_grouped_loop(&sig.compartment_strategy);
                emit_backward_euler_correction(src, cell, elim, grouped);
            }
        }
    }
}

/// `ForwardEuler`'s axial term is evaluated explicitly on "now" voltages and
/// folded into `i_internal` before the single explicit update runs.
fn emit_forward_euler_axial_currents(src: &mut String, cell: &CellType) {
    src.push_str("    /* forward-Euler axial coupling, evaluated on \"now\" voltages */\n");
    for seg in 0..cell.segment_count {
        let parent = cell.segment_parent[seg as usize];
        let mut terms = String::new();
        if parent != seg {
            let g = axial_g(cell, seg);
            terms.push_str(&format!(
                " + {g:.6} * ((double) state_f32_scalar_now[state_f32_scalar_work_offset + {parent}] - (double) state_f32_scalar_now[state_f32_scalar_work_offset + {seg}])"
            ));
        }
        for child in 0..cell.segment_count {
            if child != seg && cell.segment_parent[child as usize] == seg {
                let g = axial_g(cell, child);
                terms.push_str(&format!(
                    " + {g:.6} * ((double) state_f32_scalar_now[state_f32_scalar_work_offset + {child}] - (double) state_f32_scalar_now[state_f32_scalar_work_offset + {seg}])"
                ));
            }
        }
        if !terms.is_empty() {
            src.push_str(&format!("    i_internal[{seg}] = i_internal[{seg}]{terms};\n"));
        }
    }
}

/// Explicit per-segment update, ignoring axial coupling except for the
/// `ForwardEuler` term already folded into `i_internal` above. For a
/// `BackwardEuler` multi-compartment cell, this is the `u_i` estimate the
/// tree-elimination correction below refines.
fn emit_explicit_voltage_update(src: &mut String, cell: &CellType) {
    src.push_str("    /* explicit update (axial coupling corrected below for backward Euler) */\n");
    for seg in 0..cell.segment_count {
        let c = cell.capacitance_nf[seg as usize];
        src.push_str(&format!(
            "    state_f32_scalar_next[state_f32_scalar_work_offset + {seg}] = state_f32_scalar_now[state_f32_scalar_work_offset + {seg}] + (float) ((dt / {c:.6}) * i_internal[{seg}]);\n"
        ));
    }
}

/// Hines/Thomas tree-elimination correction for the backward-Euler axial
/// term: `D_i = C_i/dt + coupling_i`, `b_i = (C_i/dt) * u_i` (`u_i` the
/// explicit estimate above), forward-eliminate each non-root's Schur
/// complement into its parent in post-order, then back-substitute from the
/// root outward. `grouped` selects between an unrolled, per-compartment
/// emission (`FLAT`) and a runtime loop over the elimination order
/// (`GROUPED`), matching the Signature Builder's compartment strategy.
fn emit_backward_euler_correction(src: &mut String, cell: &CellType, elim: &EliminationOrder, grouped: bool) {
    let n = cell.segment_count as usize;
    let g_to_parent: Vec<f32> = (0..cell.segment_count).map(|s| axial_g(cell, s)).collect();
    let mut coupling = g_to_parent.clone();
    for s in 0..cell.segment_count {
        let p = cell.segment_parent[s as usize];
        if p != s {
            coupling[p as usize] += g_to_parent[s as usize];
        }
    }

    src.push_str("\n    /* pass 1: diagonal/RHS init, pass 2: forward-eliminate into parent, pass 3: back-substitute from root */\n");
    src.push_str(&format!("    double bw_d[{n}];\n"));
    src.push_str(&format!("    double bw_b[{n}];\n"));
    let cap_list: Vec<String> = (0..n).map(|i| format!("{:.6}", cell.capacitance_nf[i])).collect();
    let coupling_list: Vec<String> = coupling.iter().map(|v| format!("{v:.6}")).collect();
    let gparent_list: Vec<String> = g_to_parent.iter().map(|v| format!("{v:.6}")).collect();
    src.push_str(&format!("    static const double bw_c[{n}] = {{{}}};\n", cap_list.join(", ")));
    src.push_str(&format!("    static const double bw_coupling[{n}] = {{{}}};\n", coupling_list.join(", ")));
    src.push_str(&format!("    static const double bw_g_to_parent[{n}] = {{{}}};\n", gparent_list.join(", ")));

    if grouped {
        let parent_list: Vec<String> = cell.segment_parent.iter().map(|v| v.to_string()).collect();
        let order_list: Vec<String> = elim.order_list.iter().map(|v| v.to_string()).collect();
        src.push_str(&format!("    static const long bw_parent[{n}] = {{{}}};\n", parent_list.join(", ")));
        src.push_str(&format!("    static const long bw_order[{n}] = {{{}}};\n", order_list.join(", ")));
        src.push_str(&format!("    for (long k = 0; k < {n}; k++) {{\n"));
        src.push_str("        long i = bw_order[k];\n");
        src.push_str("        bw_d[i] = bw_c[i] / dt + bw_coupling[i];\n");
        src.push_str("        bw_b[i] = (bw_c[i] / dt) * (double) state_f32_scalar_next[state_f32_scalar_work_offset + i];\n");
        src.push_str("    }\n");
        src.push_str(&format!("    for (long k = 0; k < {n}; k++) {{\n"));
        src.push_str("        long i = bw_order[k];\n");
        src.push_str("        long p = bw_parent[i];\n");
        src.push_str("        if (p == i) continue;\n");
        src.push_str("        double g = bw_g_to_parent[i];\n");
        src.push_str("        bw_d[p] -= (g * g) / bw_d[i];\n");
        src.push_str("        bw_b[p] += (g * bw_b[i]) / bw_d[i];\n");
        src.push_str("    }\n");
        src.push_str(&format!("    for (long k = {n} - 1; k >= 0; k--) {{\n"));
        src.push_str("        long i = bw_order[k];\n");
        src.push_str("        long p = bw_parent[i];\n");
        src.push_str("        double v;\n");
        src.push_str("        if (p == i) {\n");
        src.push_str("            v = bw_b[i] / bw_d[i];\n");
        src.push_str("        } else {\n");
        src.push_str(
            "            v = (bw_b[i] + bw_g_to_parent[i] * (double) state_f32_scalar_next[state_f32_scalar_work_offset + p]) / bw_d[i];\n",
        );
        src.push_str("        }\n");
        src.push_str("        state_f32_scalar_next[state_f32_scalar_work_offset + i] = (float) v;\n");
        src.push_str("    }\n");
    } else {
        src.push_str("    /* FLAT: unrolled per compartment, no loop */\n");
        for &seg in &elim.order_list {
            src.push_str(&format!("    bw_d[{seg}] = bw_c[{seg}] / dt + bw_coupling[{seg}];\n"));
            src.push_str(&format!(
                "    bw_b[{seg}] = (bw_c[{seg}] / dt) * (double) state_f32_scalar_next[state_f32_scalar_work_offset + {seg}];\n"
            ));
        }
        for &seg in &elim.order_list {
            let parent = elim.parent_list[seg as usize];
            if parent != seg {
                src.push_str(&format!("    bw_d[{parent}] -= (bw_g_to_parent[{seg}] * bw_g_to_parent[{seg}]) / bw_d[{seg}];\n"));
                src.push_str(&format!("    bw_b[{parent}] += (bw_g_to_parent[{seg}] * bw_b[{seg}]) / bw_d[{seg}];\n"));
            }
        }
        for &seg in elim.order_list.iter().rev() {
            let parent = elim.parent_list[seg as usize];
            if parent == seg {
                src.push_str(&format!(
                    "    state_f32_scalar_next[state_f32_scalar_work_offset + {seg}] = (float) (bw_b[{seg}] / bw_d[{seg}]);\n"
                ));
            } else {
                src.push_str(&format!(
                    "    state_f32_scalar_next[state_f32_scalar_work_offset + {seg}] = (float) ((bw_b[{seg}] + bw_g_to_parent[{seg}] * (double) state_f32_scalar_next[state_f32_scalar_work_offset + {parent}]) / bw_d[{seg}]);\n"
                ));
            }
        }
    }
}

fn emit_spike_check(src: &mut String, cell: &CellType) {
    // The instantiator always claims const_i64 table ordinal 0 of this work
    // item's slice as its spike-recipients table (possibly zero entries), so
    // the size/pointer can be read at the work item's own table_work_offset
    // without any extra constant threaded through the signature. The check
    // always runs, even for cell types without a declared threshold, because
    // a spike-list input can still force a send independent of voltage.
    src.push_str("\n    /* spike sending (§4.3.5): V_now < V_threshold <= V_next, or a scheduled spike-list input fires */\n");
    if cell.has_spike_threshold {
        src.push_str(&format!("    const float v_threshold = {:.6}f;\n", cell.spike_threshold_mv));
        src.push_str(
            "    int crosses_threshold = (state_f32_scalar_now[state_f32_scalar_work_offset] < v_threshold && v_threshold <= state_f32_scalar_next[state_f32_scalar_work_offset]);\n",
        );
    } else {
        src.push_str("    int crosses_threshold = 0;\n");
    }
    src.push_str("    if (crosses_threshold || spike_list_fires) {\n");
    src.push_str("        long n_spike_recipients = const_i64_table_sizes[const_i64_table_work_offset];\n");
    src.push_str("        const long long * restrict recipients = const_i64_table_ptrs[const_i64_table_work_offset];\n");
    src.push_str("        for (long r = 0; r < n_spike_recipients; r++) {\n");
    src.push_str("            unsigned long long packed = (unsigned long long) recipients[r];\n");
    src.push_str("            long table = (long) (packed >> 24);\n");
    src.push_str("            long entry = (long) (packed & 0xFFFFFFULL);\n");
    src.push_str("            __atomic_fetch_or(&state_i64_next_ptrs[table][entry], 1LL, __ATOMIC_RELAXED);\n");
    src.push_str("        }\n    }\n");
}

/// Whether a cell type requires the `GROUPED` compartment strategy's index
/// table to drive the cable solver with a runtime loop, rather than emitting
/// one unrolled statement per compartment.
pub fn uses_grouped_loop(strategy: &Option<CompartmentStrategy>) -> bool {
    matches!(strategy, Some(CompartmentStrategy::Grouped { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passive_cell() -> CellType {
        CellType {
            id: 0,
            name: "passive".to_string(),
            segment_count: 1,
            segment_parent: vec![0],
            capacitance_nf: vec![1.0],
            axial_resistance_mohm: vec![0.0],
            channel_distributions: vec![eden_model::ChannelDistribution {
                segment: 0,
                g_bar: 0.1,
                reversal: ReversalKind::Fixed(-70.0),
                gates: vec![],
            }],
            has_spike_threshold: true,
            spike_threshold_mv: -20.0,
        }
    }

    fn multi_compartment_cell() -> CellType {
        CellType {
            id: 1,
            name: "multi".to_string(),
            segment_count: 3,
            segment_parent: vec![0, 0, 1],
            capacitance_nf: vec![1.0, 0.5, 0.5],
            axial_resistance_mohm: vec![0.0, 10.0, 10.0],
            channel_distributions: vec![],
            has_spike_threshold: false,
            spike_threshold_mv: 0.0,
        }
    }

    fn hh_cell() -> CellType {
        CellType {
            id: 2,
            name: "hh".to_string(),
            segment_count: 1,
            segment_parent: vec![0],
            capacitance_nf: vec![1.0],
            axial_resistance_mohm: vec![0.0],
            channel_distributions: vec![
                eden_model::ChannelDistribution {
                    segment: 0,
                    g_bar: 120.0,
                    reversal: ReversalKind::Nernst { valence: 1, conc_in_mm: 10.0, conc_out_mm: 140.0 },
                    gates: vec![
                        GateKinetics::AlphaBeta {
                            alpha: RateFn::Sigmoid { rate: 1.0, midpoint_mv: -40.0, scale_mv: 10.0 },
                            beta: RateFn::Constant(4.0),
                            power: 3,
                        },
                        GateKinetics::TauInf { tau: RateFn::Constant(1.0), inf: RateFn::Constant(0.5), power: 1 },
                    ],
                },
                eden_model::ChannelDistribution {
                    segment: 0,
                    g_bar: 36.0,
                    reversal: ReversalKind::Ghk { valence: 1, conc_in_mm: 400.0, conc_out_mm: 20.0 },
                    gates: vec![],
                },
            ],
            has_spike_threshold: true,
            spike_threshold_mv: -20.0,
        }
    }

    /// Every identifier the kernel references that the emitter is
    /// responsible for defining must actually be declared somewhere in the
    /// same translation unit — a cheap stand-in for compiling it.
    fn assert_no_dangling_identifiers(src: &str, used: &[&str]) {
        for ident in used {
            assert!(
                src.contains(&format!("{ident}[")) || src.contains(&format!("{ident} ")) || src.contains(&format!("{ident};")),
                "expected `{ident}` to appear declared/assigned in generated source"
            );
        }
    }

    #[test]
    fn emitted_source_contains_fixed_doit_signature() {
        let cell = passive_cell();
        let sig = WorkItemSignature::build(&cell);
        let src = emit_kernel_source(&cell, &sig, CableSolverKind::BackwardEuler);
        assert!(src.contains("void doit("));
        assert!(src.contains("restrict"));
        assert!(src.contains("long step)"));
    }

    #[test]
    fn single_compartment_still_integrates_voltage() {
        // Regression test: a single-compartment cell must still get a
        // voltage-integration statement, not just the onstart copy.
        let cell = passive_cell();
        let sig = WorkItemSignature::build(&cell);
        let src = emit_kernel_source(&cell, &sig, CableSolverKind::BackwardEuler);
        assert!(src.contains("state_f32_scalar_next[state_f32_scalar_work_offset + 0] = state_f32_scalar_now[state_f32_scalar_work_offset + 0] + (float)"));
    }

    #[test]
    fn channel_current_feeds_into_i_internal() {
        let cell = passive_cell();
        let sig = WorkItemSignature::build(&cell);
        let src = emit_kernel_source(&cell, &sig, CableSolverKind::BackwardEuler);
        assert!(src.contains("i_internal[0] += (double) i_chan_0;"));
    }

    #[test]
    fn multi_compartment_backward_euler_declares_every_identifier_it_uses() {
        let cell = multi_compartment_cell();
        let sig = WorkItemSignature::build(&cell);
        let src = emit_kernel_source(&cell, &sig, CableSolverKind::BackwardEuler);
        assert!(src.contains("pass 1: diagonal"));
        assert!(src.contains("back-substitute"));
        assert_no_dangling_identifiers(&src, &["bw_d", "bw_b", "bw_c", "bw_coupling", "bw_g_to_parent"]);
        assert!(!src.contains("eliminate_into_parent"));
        assert!(!src.contains("back_substitute("));
        assert!(!src.contains("r_i_0"));
    }

    #[test]
    fn multi_compartment_forward_euler_declares_i_internal_and_i_axial_terms() {
        let cell = multi_compartment_cell();
        let sig = WorkItemSignature::build(&cell);
        let src = emit_kernel_source(&cell, &sig, CableSolverKind::ForwardEuler);
        assert!(src.contains("i_internal[0] = i_internal[0] +"));
        assert!(src.contains("double i_internal[3];"));
    }

    #[test]
    fn hh_gates_emit_real_rate_functions_and_reversal_literal() {
        let cell = hh_cell();
        let sig = WorkItemSignature::build(&cell);
        let src = emit_kernel_source(&cell, &sig, CableSolverKind::BackwardEuler);
        assert!(src.contains("static inline float gate_alpha_0_0(float v)"));
        assert!(src.contains("static inline float gate_beta_0_0(float v)"));
        assert!(src.contains("static inline float gate_tau_0_1(float v)"));
        assert!(src.contains("static inline float gate_inf_0_1(float v)"));
        assert!(!src.contains("nernst_potential"));
        assert!(!src.contains("ghk_potential"));
        // gate state slot 1 (after the single voltage slot 0).
        assert!(src.contains("state_f32_scalar_now[state_f32_scalar_work_offset + 1]"));
    }

    #[test]
    fn spike_check_declares_v_threshold_from_cell_type_field() {
        let cell = passive_cell();
        let sig = WorkItemSignature::build(&cell);
        let src = emit_kernel_source(&cell, &sig, CableSolverKind::BackwardEuler);
        assert!(src.contains("const float v_threshold = -20.000000f;"));
        assert!(src.contains("crosses_threshold || spike_list_fires"));
    }

    #[test]
    fn spike_check_uses_atomic_fetch_or() {
        let cell = passive_cell();
        let sig = WorkItemSignature::build(&cell);
        let src = emit_kernel_source(&cell, &sig, CableSolverKind::BackwardEuler);
        assert!(src.contains("__atomic_fetch_or"));
    }

    #[test]
    fn spike_check_reads_recipient_count_from_const_i64_table_at_work_offset() {
        let cell = passive_cell();
        let sig = WorkItemSignature::build(&cell);
        let src = emit_kernel_source(&cell, &sig, CableSolverKind::BackwardEuler);
        assert!(src.contains("const_i64_table_sizes[const_i64_table_work_offset]"));
        assert!(src.contains("const_i64_table_ptrs[const_i64_table_work_offset]"));
        assert!(!src.contains("state_i64_now_ptrs[state_i64_table_work_offset]"));
    }

    #[test]
    fn spike_check_also_fires_from_spike_list_input_without_a_threshold() {
        let mut cell = multi_compartment_cell();
        cell.has_spike_threshold = false;
        let sig = WorkItemSignature::build(&cell);
        let src = emit_kernel_source(&cell, &sig, CableSolverKind::BackwardEuler);
        assert!(src.contains("int crosses_threshold = 0;"));
        assert!(src.contains("if (crosses_threshold || spike_list_fires) {"));
    }

    #[test]
    fn pulse_and_spike_list_inputs_reach_the_current_balance() {
        let cell = passive_cell();
        let sig = WorkItemSignature::build(&cell);
        let src = emit_kernel_source(&cell, &sig, CableSolverKind::BackwardEuler);
        assert!(src.contains("const_f32_table_sizes[const_f32_table_work_offset + 0]"));
        assert!(src.contains("i_internal[target_segment] += (double) amplitude;"));
        assert!(src.contains("const_f32_table_sizes[const_f32_table_work_offset + 1]"));
        assert!(src.contains("spike_list_fires = 1;"));
    }

    #[test]
    fn grouped_strategy_emits_a_runtime_elimination_loop() {
        // 12 identical leaf segments off one root triggers GROUPED (above
        // FLAT_COMPARTMENT_THRESHOLD) since every leaf's generated body is
        // byte-identical.
        let segment_count = 12;
        let mut segment_parent = vec![0u32; segment_count as usize];
        for i in 1..segment_count {
            segment_parent[i as usize] = 0;
        }
        let cell = CellType {
            id: 3,
            name: "star".to_string(),
            segment_count,
            segment_parent,
            capacitance_nf: vec![1.0; segment_count as usize],
            axial_resistance_mohm: vec![10.0; segment_count as usize],
            channel_distributions: vec![],
            has_spike_threshold: false,
            spike_threshold_mv: 0.0,
        };
        let sig = WorkItemSignature::build(&cell);
        assert!(uses_grouped_loop(&sig.compartment_strategy));
        let src = emit_kernel_source(&cell, &sig, CableSolverKind::BackwardEuler);
        assert!(src.contains("for (long k = 0; k < 12; k++) {"));
        assert!(!src.contains("FLAT: unrolled"));
    }

    #[test]
    fn flat_strategy_emits_no_runtime_elimination_loop() {
        let cell = multi_compartment_cell();
        let sig = WorkItemSignature::build(&cell);
        assert!(!uses_grouped_loop(&sig.compartment_strategy));
        let src = emit_kernel_source(&cell, &sig, CableSolverKind::BackwardEuler);
        assert!(src.contains("FLAT: unrolled per compartment, no loop"));
        assert!(!src.contains("for (long k = 0;"));
    }
}
