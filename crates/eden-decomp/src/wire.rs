//! Per-step wire format (§4.5.1).
//!
//! Every step, a rank sends one flat `f32` payload per peer that asked it
//! for data: `[vpeer_values…, daw_values…, spike_indices…]`. Spike indices
//! are plain `i32`s type-punned into the `f32` slots via bit reinterpretation
//! rather than converted numerically, so the receiver must know how many
//! trailing slots are spike indices (equal to the sender's spike-source
//! count for that peer) to pun them back correctly.

/// Pack one step's payload to a peer: value slots in `[vpeer, daw]` order
/// followed by spike index slots, each spike index bit-punned into an f32.
pub fn pack_step_payload(vpeer_values: &[f32], daw_values: &[f32], spike_indices: &[i32]) -> Vec<f32> {
    let mut payload = Vec::with_capacity(vpeer_values.len() + daw_values.len() + spike_indices.len());
    payload.extend_from_slice(vpeer_values);
    payload.extend_from_slice(daw_values);
    payload.extend(spike_indices.iter().map(|&i| f32::from_bits(i as u32)));
    payload
}

/// Split a received payload back into its three sections, given how many
/// vpeer/data-writer value slots and spike index slots the recv list
/// expects from this peer.
pub fn unpack_step_payload(
    payload: &[f32],
    vpeer_count: usize,
    daw_count: usize,
    spike_count: usize,
) -> Option<(&[f32], &[f32], Vec<i32>)> {
    let expected = vpeer_count + daw_count + spike_count;
    if payload.len() != expected {
        return None;
    }
    let (vpeer, rest) = payload.split_at(vpeer_count);
    let (daw, spikes) = rest.split_at(daw_count);
    let spike_indices = spikes.iter().map(|&f| f.to_bits() as i32).collect();
    Some((vpeer, daw, spike_indices))
}

/// Serialize an f32 payload to little-endian bytes for transmission over a
/// [`crate::transport::Transport`].
pub fn payload_to_bytes(payload: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(payload.len() * 4);
    for v in payload {
        bytes.extend_from_slice(&v.to_bits().to_le_bytes());
    }
    bytes
}

/// Deserialize a little-endian byte buffer produced by [`payload_to_bytes`]
/// back into an f32 payload.
pub fn payload_from_bytes(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_bits(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
            .collect(),
    )
}
