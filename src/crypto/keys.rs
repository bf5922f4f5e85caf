use super::hash::{decode_hex_32, hash_to_scalar, keccak256, write_varint};
use super::CryptoError;
use curve25519_dalek::{
	edwards::{CompressedEdwardsY, EdwardsPoint},
	scalar::Scalar,
	traits::IsIdentity,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Compressed Ed25519 point.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

/// Canonical little-endian scalar. Wiped on drop.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(pub [u8; 32]);

/// Shared secret `8·a·R` between a transaction key and a view key.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct KeyDerivation(pub [u8; 32]);

/// `x·Hp(P)`, unique per output and revealed when the output is spent.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyImage(pub [u8; 32]);

impl PublicKey {
	pub fn from_point(point: &EdwardsPoint) -> Self {
		Self(point.compress().to_bytes())
	}

	pub fn decompress(&self) -> Result<EdwardsPoint, CryptoError> {
		CompressedEdwardsY(self.0)
			.decompress()
			.ok_or_else(|| CryptoError::InvalidPoint(hex::encode(self.0)))
	}

	pub fn to_hex(&self) -> String {
		hex::encode(self.0)
	}

	pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
		Ok(Self(decode_hex_32(s)?))
	}
}

impl fmt::Debug for PublicKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "PublicKey({})", self.to_hex())
	}
}

impl SecretKey {
	pub fn from_scalar(scalar: &Scalar) -> Self {
		Self(scalar.to_bytes())
	}

	/// Rejects encodings that are not reduced modulo the group order.
	pub fn scalar(&self) -> Result<Scalar, CryptoError> {
		Option::<Scalar>::from(Scalar::from_canonical_bytes(self.0)).ok_or(CryptoError::InvalidScalar)
	}

	pub fn to_hex(&self) -> String {
		hex::encode(self.0)
	}

	pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
		let mut bytes = decode_hex_32(s)?;
		let key = Self(bytes);
		bytes.zeroize();
		key.scalar()?;
		Ok(key)
	}
}

impl fmt::Debug for SecretKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("SecretKey(<redacted>)")
	}
}

impl KeyImage {
	pub fn is_null(&self) -> bool {
		self.0 == [0u8; 32]
	}

	pub fn to_hex(&self) -> String {
		hex::encode(self.0)
	}

	pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
		Ok(Self(decode_hex_32(s)?))
	}
}

impl fmt::Display for KeyImage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_hex())
	}
}

impl fmt::Debug for KeyImage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "KeyImage({})", self.to_hex())
	}
}

/// Uniformly random scalar, reduced from 64 random bytes.
pub fn random_scalar() -> Scalar {
	let mut wide = [0u8; 64];
	rand::rng().fill_bytes(&mut wide);
	let scalar = Scalar::from_bytes_mod_order_wide(&wide);
	wide.zeroize();
	scalar
}

pub fn generate_keys() -> (PublicKey, SecretKey) {
	let secret = random_scalar();
	(
		PublicKey::from_point(&EdwardsPoint::mul_base(&secret)),
		SecretKey::from_scalar(&secret),
	)
}

pub fn secret_key_to_public_key(secret: &SecretKey) -> Result<PublicKey, CryptoError> {
	Ok(PublicKey::from_point(&EdwardsPoint::mul_base(
		&secret.scalar()?,
	)))
}

/// True when the key decodes to a curve point.
pub fn check_key(key: &PublicKey) -> bool {
	key.decompress().is_ok()
}

pub fn generate_key_derivation(
	tx_public_key: &PublicKey,
	secret: &SecretKey,
) -> Result<KeyDerivation, CryptoError> {
	let point = tx_public_key.decompress()?;
	let shared = (secret.scalar()? * point).mul_by_cofactor();
	Ok(KeyDerivation(shared.compress().to_bytes()))
}

/// `Hs(D ‖ varint(index))`
pub fn derivation_to_scalar(derivation: &KeyDerivation, output_index: usize) -> Scalar {
	let mut buf = Vec::with_capacity(32 + 10);
	buf.extend_from_slice(&derivation.0);
	write_varint(output_index as u64, &mut buf);
	hash_to_scalar(&buf)
}

/// One-time output key `Hs(D ‖ i)·G + B`.
pub fn derive_public_key(
	derivation: &KeyDerivation,
	output_index: usize,
	base: &PublicKey,
) -> Result<PublicKey, CryptoError> {
	let base_point = base.decompress()?;
	let scalar = derivation_to_scalar(derivation, output_index);
	Ok(PublicKey::from_point(
		&(EdwardsPoint::mul_base(&scalar) + base_point),
	))
}

/// One-time output secret `Hs(D ‖ i) + b`.
pub fn derive_secret_key(
	derivation: &KeyDerivation,
	output_index: usize,
	base: &SecretKey,
) -> Result<SecretKey, CryptoError> {
	let scalar = derivation_to_scalar(derivation, output_index) + base.scalar()?;
	Ok(SecretKey::from_scalar(&scalar))
}

/// `Hp`: try-and-increment hash onto the prime-order subgroup.
pub fn hash_to_point(key: &PublicKey) -> EdwardsPoint {
	let mut counter: u32 = 0;
	loop {
		let mut buf = [0u8; 36];
		buf[..32].copy_from_slice(&key.0);
		buf[32..].copy_from_slice(&counter.to_le_bytes());
		if let Some(point) = CompressedEdwardsY(keccak256(&buf)).decompress() {
			let cleared = point.mul_by_cofactor();
			if !cleared.is_identity() {
				return cleared;
			}
		}
		counter = counter.wrapping_add(1);
	}
}

pub fn generate_key_image(public: &PublicKey, secret: &SecretKey) -> Result<KeyImage, CryptoError> {
	let image = secret.scalar()? * hash_to_point(public);
	Ok(KeyImage(image.compress().to_bytes()))
}
