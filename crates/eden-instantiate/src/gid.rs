//! Global neuron id assignment (§4.4 "Population instance").
//!
//! Populations are laid out contiguously in declaration order; a cell
//! instance's global id is its population's base offset plus its index
//! within the population. This is the same domain [`eden_decomp::decompose`]
//! partitions across ranks.

use eden_model::Model;

use crate::error::{InstantiateError, Result};

/// Base global id of each population, in declaration order.
pub fn population_offsets(model: &Model) -> Vec<u32> {
    let mut offsets = Vec::with_capacity(model.populations.len());
    let mut next = 0u32;
    for pop in &model.populations {
        offsets.push(next);
        next += pop.size;
    }
    offsets
}

/// Resolve `(population, cell_instance)` to a global neuron id.
pub fn global_id(model: &Model, offsets: &[u32], population: u32, cell_instance: u32) -> Result<u32> {
    let (pop_index, pop) = model
        .populations
        .iter()
        .enumerate()
        .find(|(_, p)| p.id == population)
        .ok_or(InstantiateError::UnknownPopulation { population })?;
    if cell_instance >= pop.size {
        return Err(InstantiateError::InstanceOutOfRange { population, instance: cell_instance, size: pop.size });
    }
    Ok(offsets[pop_index] + cell_instance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eden_model::{CellType, Population};

    fn two_population_model() -> Model {
        Model {
            cell_types: vec![CellType {
                id: 0,
                name: "passive".to_string(),
                segment_count: 1,
                segment_parent: vec![0],
                channel_distributions: vec![],
                has_spike_threshold: true,
            }],
            populations: vec![
                Population { id: 0, name: "a".to_string(), cell_type: 0, size: 5 },
                Population { id: 1, name: "b".to_string(), cell_type: 0, size: 3 },
            ],
            projections: vec![],
            inputs: vec![],
            data_writers: vec![],
        }
    }

    #[test]
    fn offsets_are_prefix_sums() {
        let model = two_population_model();
        assert_eq!(population_offsets(&model), vec![0, 5]);
    }

    #[test]
    fn second_population_gids_start_after_first() {
        let model = two_population_model();
        let offsets = population_offsets(&model);
        assert_eq!(global_id(&model, &offsets, 1, 0).unwrap(), 5);
        assert_eq!(global_id(&model, &offsets, 1, 2).unwrap(), 7);
    }

    #[test]
    fn out_of_range_instance_is_rejected() {
        let model = two_population_model();
        let offsets = population_offsets(&model);
        assert!(matches!(
            global_id(&model, &offsets, 0, 5),
            Err(InstantiateError::InstanceOutOfRange { .. })
        ));
    }

    #[test]
    fn unknown_population_is_rejected() {
        let model = two_population_model();
        let offsets = population_offsets(&model);
        assert!(matches!(global_id(&model, &offsets, 9, 0), Err(InstantiateError::UnknownPopulation { .. })));
    }
}
