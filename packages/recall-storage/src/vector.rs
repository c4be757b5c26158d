//! Vector encoding and similarity.
//!
//! Vectors are stored as packed little-endian `f32` values.

pub fn encode(vec: &[f32]) -> Vec<u8> {
	vec.iter().flat_map(|value| value.to_le_bytes()).collect()
}

/// Decodes a stored vector. Returns `None` when the byte length is not a multiple of four.
pub fn decode(bytes: &[u8]) -> Option<Vec<f32>> {
	if bytes.len() % 4 != 0 {
		return None;
	}

	Some(
		bytes
			.chunks_exact(4)
			.map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
			.collect(),
	)
}

/// Cosine similarity, `1 - cosine_distance`. Zero when either vector has no magnitude or the
/// lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
	if a.len() != b.len() || a.is_empty() {
		return 0.0;
	}

	let mut dot = 0.0_f64;
	let mut norm_a = 0.0_f64;
	let mut norm_b = 0.0_f64;

	for (x, y) in a.iter().zip(b) {
		let (x, y) = (f64::from(*x), f64::from(*y));

		dot += x * y;
		norm_a += x * x;
		norm_b += y * y;
	}

	if norm_a == 0.0 || norm_b == 0.0 {
		return 0.0;
	}

	(dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decode_reads_encoded_bytes() {
		let vec = vec![0.25_f32, -1.5, 3.0];

		assert_eq!(encode(&vec).len(), 12);
		assert_eq!(decode(&encode(&vec)), Some(vec));
		assert_eq!(decode(&[0, 0, 0]), None);
	}

	#[test]
	fn cosine_of_known_vectors() {
		assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
		assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
		assert!((cosine_similarity(&[1.0, 0.0], &[-2.0, 0.0]) + 1.0).abs() < 1e-6);
		assert!((cosine_similarity(&[1.0, 1.0], &[1.0, 0.0]) - 0.707_106_8).abs() < 1e-5);
	}

	#[test]
	fn cosine_is_zero_for_degenerate_input() {
		assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
		assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
		assert_eq!(cosine_similarity(&[], &[]), 0.0);
	}
}
