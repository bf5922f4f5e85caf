//! Classic CryptoNote ring signatures.
//!
//! One `(c, r)` pair per ring member. The challenges of all members must sum to the hash of the
//! message and every member's `(L, R)` commitment, which only the holder of one secret key in
//! the ring can arrange without revealing which member it is.

use super::hash::{Hash, hash_to_scalar};
use super::keys::{KeyImage, PublicKey, SecretKey, hash_to_point, random_scalar};
use super::CryptoError;
use curve25519_dalek::{
	edwards::{CompressedEdwardsY, EdwardsPoint},
	scalar::Scalar,
	traits::IsIdentity,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
	pub c: [u8; 32],
	pub r: [u8; 32],
}

fn canonical(bytes: [u8; 32]) -> Option<Scalar> {
	Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes))
}

fn decompress_image(image: &KeyImage) -> Option<EdwardsPoint> {
	CompressedEdwardsY(image.0)
		.decompress()
		.filter(|point| point.is_torsion_free() && !point.is_identity())
}

pub fn generate_ring_signature(
	prefix_hash: &Hash,
	image: &KeyImage,
	ring: &[PublicKey],
	secret: &SecretKey,
	secret_index: usize,
) -> Result<Vec<Signature>, CryptoError> {
	if secret_index >= ring.len() {
		return Err(CryptoError::RingSignature(format!(
			"secret index {} outside ring of {}",
			secret_index,
			ring.len()
		)));
	}
	let image_point = decompress_image(image)
		.ok_or_else(|| CryptoError::InvalidPoint(image.to_hex()))?;
	let secret_scalar = secret.scalar()?;

	let mut buf = Vec::with_capacity(32 + ring.len() * 64);
	buf.extend_from_slice(&prefix_hash.0);

	let mut pairs = vec![(Scalar::ZERO, Scalar::ZERO); ring.len()];
	let mut sum = Scalar::ZERO;
	let mut nonce = Scalar::ZERO;

	for (i, key) in ring.iter().enumerate() {
		let point = key.decompress()?;
		let hashed = hash_to_point(key);
		let (l, r) = if i == secret_index {
			nonce = random_scalar();
			(EdwardsPoint::mul_base(&nonce), nonce * hashed)
		} else {
			let c = random_scalar();
			let r = random_scalar();
			pairs[i] = (c, r);
			sum += c;
			(
				EdwardsPoint::vartime_double_scalar_mul_basepoint(&c, &point, &r),
				r * hashed + c * image_point,
			)
		};
		buf.extend_from_slice(l.compress().as_bytes());
		buf.extend_from_slice(r.compress().as_bytes());
	}

	let challenge = hash_to_scalar(&buf) - sum;
	pairs[secret_index] = (challenge, nonce - challenge * secret_scalar);

	Ok(pairs
		.into_iter()
		.map(|(c, r)| Signature {
			c: c.to_bytes(),
			r: r.to_bytes(),
		})
		.collect())
}

pub fn check_ring_signature(
	prefix_hash: &Hash,
	image: &KeyImage,
	ring: &[PublicKey],
	signatures: &[Signature],
) -> bool {
	if ring.is_empty() || ring.len() != signatures.len() {
		return false;
	}
	let Some(image_point) = decompress_image(image) else {
		return false;
	};

	let mut buf = Vec::with_capacity(32 + ring.len() * 64);
	buf.extend_from_slice(&prefix_hash.0);
	let mut sum = Scalar::ZERO;

	for (key, sig) in ring.iter().zip(signatures) {
		let Ok(point) = key.decompress() else {
			return false;
		};
		let (Some(c), Some(r)) = (canonical(sig.c), canonical(sig.r)) else {
			return false;
		};
		let l = EdwardsPoint::vartime_double_scalar_mul_basepoint(&c, &point, &r);
		let r_point = r * hash_to_point(key) + c * image_point;
		buf.extend_from_slice(l.compress().as_bytes());
		buf.extend_from_slice(r_point.compress().as_bytes());
		sum += c;
	}

	hash_to_scalar(&buf) == sum
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::crypto::{cn_fast_hash, generate_key_image, generate_keys};

	fn ring_with_secret(size: usize, real: usize) -> (Vec<PublicKey>, SecretKey, KeyImage) {
		let mut ring = Vec::new();
		let mut real_secret = None;
		for i in 0..size {
			let (public, secret) = generate_keys();
			ring.push(public);
			if i == real {
				real_secret = Some(secret);
			}
		}
		let secret = real_secret.unwrap();
		let image = generate_key_image(&ring[real], &secret).unwrap();
		(ring, secret, image)
	}

	#[test]
	fn test_sign_and_verify() {
		let message = cn_fast_hash(b"prefix");
		for (size, real) in [(1, 0), (4, 2), (6, 5)] {
			let (ring, secret, image) = ring_with_secret(size, real);
			let sigs = generate_ring_signature(&message, &image, &ring, &secret, real).unwrap();
			assert_eq!(sigs.len(), size);
			assert!(check_ring_signature(&message, &image, &ring, &sigs));
		}
	}

	#[test]
	fn test_tampering_detected() {
		let message = cn_fast_hash(b"prefix");
		let (ring, secret, image) = ring_with_secret(4, 1);
		let sigs = generate_ring_signature(&message, &image, &ring, &secret, 1).unwrap();

		assert!(!check_ring_signature(&cn_fast_hash(b"other"), &image, &ring, &sigs));

		let (_, _, foreign_image) = ring_with_secret(1, 0);
		assert!(!check_ring_signature(&message, &foreign_image, &ring, &sigs));

		let mut swapped = ring.clone();
		swapped.swap(0, 3);
		assert!(!check_ring_signature(&message, &image, &swapped, &sigs));

		assert!(!check_ring_signature(&message, &image, &ring, &sigs[..3]));
	}

	#[test]
	fn test_secret_index_out_of_range() {
		let (ring, secret, image) = ring_with_secret(2, 0);
		let result = generate_ring_signature(&Hash::NULL, &image, &ring, &secret, 2);
		assert!(matches!(result, Err(CryptoError::RingSignature(_))));
	}
}
