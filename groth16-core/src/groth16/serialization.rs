use ark_ec::pairing::Pairing;
use ark_serialize::{
    CanonicalDeserialize, CanonicalSerialize, Compress, Read, SerializationError, Valid, Validate,
    Write,
};

use super::keys::{
    CommitmentKey, CommitmentVerifyingKey, ProvingKey, ProvingKeyG1, ProvingKeyG2, VerifyingKey,
    VerifyingKeyG1, VerifyingKeyG2,
};
use super::proof::Proof;
use super::residency::ResidencyCache;
use crate::poly::FftDomain;

/// The two encodings every artifact supports. The canonical form compresses points and
/// validates on read; the raw form writes uncompressed points and trusts its input.
pub trait BinaryFormat: CanonicalSerialize + CanonicalDeserialize {
    fn write_to<W: Write>(&self, writer: W) -> Result<(), SerializationError> {
        self.serialize_compressed(writer)
    }

    fn read_from<R: Read>(reader: R) -> Result<Self, SerializationError> {
        Self::deserialize_compressed(reader)
    }

    fn write_raw_to<W: Write>(&self, writer: W) -> Result<(), SerializationError> {
        self.serialize_uncompressed(writer)
    }

    fn read_raw_from<R: Read>(reader: R) -> Result<Self, SerializationError> {
        Self::deserialize_uncompressed_unchecked(reader)
    }

    fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        let mut bytes = Vec::with_capacity(self.compressed_size());
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationError> {
        Self::read_from(bytes)
    }
}

impl<E: Pairing> BinaryFormat for Proof<E> {}
impl<E: Pairing> BinaryFormat for ProvingKey<E> {}
impl<E: Pairing> BinaryFormat for VerifyingKey<E> {}

impl<E: Pairing> CanonicalSerialize for ProvingKey<E> {
    fn serialize_with_mode<W: Write>(
        &self,
        mut writer: W,
        compress: Compress,
    ) -> Result<(), SerializationError> {
        (self.domain.size() as u64).serialize_with_mode(&mut writer, compress)?;
        self.g1.serialize_with_mode(&mut writer, compress)?;
        self.g2.serialize_with_mode(&mut writer, compress)?;
        self.infinity_a.serialize_with_mode(&mut writer, compress)?;
        self.infinity_b.serialize_with_mode(&mut writer, compress)?;
        (self.nb_infinity_a as u64).serialize_with_mode(&mut writer, compress)?;
        (self.nb_infinity_b as u64).serialize_with_mode(&mut writer, compress)?;
        self.commitment_keys
            .serialize_with_mode(&mut writer, compress)?;
        Ok(())
    }

    fn serialized_size(&self, compress: Compress) -> usize {
        3 * 0u64.serialized_size(compress)
            + self.g1.serialized_size(compress)
            + self.g2.serialized_size(compress)
            + self.infinity_a.serialized_size(compress)
            + self.infinity_b.serialized_size(compress)
            + self.commitment_keys.serialized_size(compress)
    }
}

impl<E: Pairing> Valid for ProvingKey<E> {
    fn check(&self) -> Result<(), SerializationError> {
        self.g1.check()?;
        self.g2.check()?;
        self.commitment_keys.check()?;
        self.check_shape().map_err(|e| {
            tracing::debug!(error = %e, "rejecting proving key");
            SerializationError::InvalidData
        })
    }
}

impl<E: Pairing> CanonicalDeserialize for ProvingKey<E> {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        let size = u64::deserialize_with_mode(&mut reader, compress, validate)?;
        let domain = usize::try_from(size)
            .ok()
            .and_then(FftDomain::from_size)
            .ok_or(SerializationError::InvalidData)?;
        let g1 = ProvingKeyG1::deserialize_with_mode(&mut reader, compress, validate)?;
        let g2 = ProvingKeyG2::deserialize_with_mode(&mut reader, compress, validate)?;
        let infinity_a = Vec::<bool>::deserialize_with_mode(&mut reader, compress, validate)?;
        let infinity_b = Vec::<bool>::deserialize_with_mode(&mut reader, compress, validate)?;
        let nb_infinity_a = u64::deserialize_with_mode(&mut reader, compress, validate)? as usize;
        let nb_infinity_b = u64::deserialize_with_mode(&mut reader, compress, validate)? as usize;
        let commitment_keys =
            Vec::<CommitmentKey<E>>::deserialize_with_mode(&mut reader, compress, validate)?;

        let pk = Self {
            domain,
            g1,
            g2,
            infinity_a,
            infinity_b,
            nb_infinity_a,
            nb_infinity_b,
            commitment_keys,
            residency: ResidencyCache::default(),
        };
        if validate == Validate::Yes {
            pk.check_shape().map_err(|e| {
                tracing::debug!(error = %e, "rejecting proving key");
                SerializationError::InvalidData
            })?;
        }
        Ok(pk)
    }
}

// `e(α, β)` is not written; it is recomputed on read.
impl<E: Pairing> CanonicalSerialize for VerifyingKey<E> {
    fn serialize_with_mode<W: Write>(
        &self,
        mut writer: W,
        compress: Compress,
    ) -> Result<(), SerializationError> {
        self.g1.serialize_with_mode(&mut writer, compress)?;
        self.g2.serialize_with_mode(&mut writer, compress)?;
        self.commitment_key
            .serialize_with_mode(&mut writer, compress)?;
        self.public_and_commitment_committed
            .serialize_with_mode(&mut writer, compress)?;
        Ok(())
    }

    fn serialized_size(&self, compress: Compress) -> usize {
        self.g1.serialized_size(compress)
            + self.g2.serialized_size(compress)
            + self.commitment_key.serialized_size(compress)
            + self
                .public_and_commitment_committed
                .serialized_size(compress)
    }
}

impl<E: Pairing> Valid for VerifyingKey<E> {
    fn check(&self) -> Result<(), SerializationError> {
        self.g1.check()?;
        self.g2.check()?;
        self.commitment_key.check()?;
        self.check_shape()
            .map_err(|_| SerializationError::InvalidData)
    }
}

impl<E: Pairing> CanonicalDeserialize for VerifyingKey<E> {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        let g1 = VerifyingKeyG1::deserialize_with_mode(&mut reader, compress, validate)?;
        let g2 = VerifyingKeyG2::deserialize_with_mode(&mut reader, compress, validate)?;
        let commitment_key =
            CommitmentVerifyingKey::deserialize_with_mode(&mut reader, compress, validate)?;
        let public_and_commitment_committed =
            Vec::<Vec<usize>>::deserialize_with_mode(&mut reader, compress, validate)?;
        let vk = VerifyingKey::new(g1, g2, commitment_key, public_and_commitment_committed);
        if validate == Validate::Yes {
            vk.check_shape()
                .map_err(|_| SerializationError::InvalidData)?;
        }
        Ok(vk)
    }
}
