//! Runtime curve dispatch. Each `Any*` value carries its curve; mixing curves across
//! arguments is a configuration error.

use std::fmt;
use std::str::FromStr;

use ark_bls12_381::Bls12_381;
use ark_bn254::Bn254;
use ark_serialize::{Read, SerializationError, Write};

use crate::backend::{AcceleratorContext, BackendKind, CpuBackend};
use crate::groth16::{
    self, BinaryFormat, Proof, ProverConfig, ProvingKey, VerifierConfig, VerifyingKey,
};
use crate::r1cs::{ConstraintSystem, Witness};
use crate::utils::errors::{ProveError, SetupError, VerifyError};

type Bn254Fr = ark_bn254::Fr;
type Bls12_381Fr = ark_bls12_381::Fr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CurveId {
    Bn254,
    Bls12_381,
}

impl CurveId {
    /// Leading byte of every curve-tagged encoding.
    pub fn tag(self) -> u8 {
        match self {
            CurveId::Bn254 => 0,
            CurveId::Bls12_381 => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CurveId::Bn254),
            1 => Some(CurveId::Bls12_381),
            _ => None,
        }
    }

    pub fn supports(self, backend: BackendKind) -> bool {
        matches!(
            (self, backend),
            (_, BackendKind::Cpu) | (CurveId::Bn254, BackendKind::Icicle)
        )
    }
}

impl fmt::Display for CurveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveId::Bn254 => write!(f, "bn254"),
            CurveId::Bls12_381 => write!(f, "bls12-381"),
        }
    }
}

impl FromStr for CurveId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bn254" => Ok(CurveId::Bn254),
            "bls12-381" | "bls12_381" => Ok(CurveId::Bls12_381),
            other => Err(format!("unknown curve `{other}`")),
        }
    }
}

macro_rules! any_curve {
    ($(#[$meta:meta])* $name:ident, $bn:ty, $bls:ty) => {
        $(#[$meta])*
        pub enum $name {
            Bn254($bn),
            Bls12_381($bls),
        }

        impl $name {
            pub fn curve(&self) -> CurveId {
                match self {
                    $name::Bn254(_) => CurveId::Bn254,
                    $name::Bls12_381(_) => CurveId::Bls12_381,
                }
            }
        }
    };
}

any_curve!(
    #[derive(Clone, Debug)]
    AnyConstraintSystem,
    ConstraintSystem<Bn254Fr>,
    ConstraintSystem<Bls12_381Fr>
);
any_curve!(
    #[derive(Clone, Debug, PartialEq, Eq)]
    AnyWitness,
    Witness<Bn254Fr>,
    Witness<Bls12_381Fr>
);
any_curve!(
    /// Public inputs without the constant-one wire.
    #[derive(Clone, Debug, PartialEq, Eq)]
    AnyPublicWitness,
    Vec<Bn254Fr>,
    Vec<Bls12_381Fr>
);
any_curve!(
    #[derive(Clone, Debug, PartialEq, Eq)]
    AnyProvingKey,
    ProvingKey<Bn254>,
    ProvingKey<Bls12_381>
);
any_curve!(
    #[derive(Clone, Debug, PartialEq, Eq)]
    AnyVerifyingKey,
    VerifyingKey<Bn254>,
    VerifyingKey<Bls12_381>
);
any_curve!(
    #[derive(Clone, Debug, PartialEq, Eq)]
    AnyProof,
    Proof<Bn254>,
    Proof<Bls12_381>
);

macro_rules! tagged_encoding {
    ($name:ident) => {
        impl $name {
            pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), SerializationError> {
                writer.write_all(&[self.curve().tag()])?;
                match self {
                    $name::Bn254(inner) => inner.write_to(writer),
                    $name::Bls12_381(inner) => inner.write_to(writer),
                }
            }

            pub fn write_raw_to<W: Write>(&self, mut writer: W) -> Result<(), SerializationError> {
                writer.write_all(&[self.curve().tag()])?;
                match self {
                    $name::Bn254(inner) => inner.write_raw_to(writer),
                    $name::Bls12_381(inner) => inner.write_raw_to(writer),
                }
            }

            pub fn read_from<R: Read>(mut reader: R) -> Result<Self, SerializationError> {
                match read_curve(&mut reader)? {
                    CurveId::Bn254 => BinaryFormat::read_from(reader).map($name::Bn254),
                    CurveId::Bls12_381 => BinaryFormat::read_from(reader).map($name::Bls12_381),
                }
            }

            pub fn read_raw_from<R: Read>(mut reader: R) -> Result<Self, SerializationError> {
                match read_curve(&mut reader)? {
                    CurveId::Bn254 => BinaryFormat::read_raw_from(reader).map($name::Bn254),
                    CurveId::Bls12_381 => {
                        BinaryFormat::read_raw_from(reader).map($name::Bls12_381)
                    }
                }
            }
        }
    };
}

tagged_encoding!(AnyProvingKey);
tagged_encoding!(AnyVerifyingKey);
tagged_encoding!(AnyProof);

fn read_curve<R: Read>(reader: &mut R) -> Result<CurveId, SerializationError> {
    let mut tag = [0u8; 1];
    reader.read_exact(&mut tag)?;
    CurveId::from_tag(tag[0]).ok_or(SerializationError::InvalidData)
}

/// Generates keys for `cs`. Keys are backend-agnostic host data, but a curve the
/// context's backend cannot prove over is rejected here rather than at the first prove.
pub fn setup(
    context: &AcceleratorContext,
    cs: &AnyConstraintSystem,
) -> Result<(AnyProvingKey, AnyVerifyingKey), SetupError> {
    let curve = cs.curve();
    if !curve.supports(context.kind()) {
        return Err(SetupError::UnsupportedCurve {
            curve,
            backend: context.kind(),
        });
    }
    Ok(match cs {
        AnyConstraintSystem::Bn254(cs) => {
            let (pk, vk) = groth16::setup::<Bn254>(cs)?;
            (AnyProvingKey::Bn254(pk), AnyVerifyingKey::Bn254(vk))
        }
        AnyConstraintSystem::Bls12_381(cs) => {
            let (pk, vk) = groth16::setup::<Bls12_381>(cs)?;
            (AnyProvingKey::Bls12_381(pk), AnyVerifyingKey::Bls12_381(vk))
        }
    })
}

fn curve_mismatch(what: &str, expected: CurveId, got: CurveId) -> String {
    format!("{what} is over {got} but the circuit is over {expected}")
}

/// Proves on the backend `config` selects, which `context` must be able to serve.
pub fn prove(
    context: &AcceleratorContext,
    cs: &AnyConstraintSystem,
    pk: &AnyProvingKey,
    witness: &AnyWitness,
    config: &ProverConfig,
) -> Result<AnyProof, ProveError> {
    let curve = cs.curve();
    if !curve.supports(config.backend) {
        return Err(ProveError::UnsupportedCurve {
            curve,
            backend: config.backend,
        });
    }
    context.check_selection(config.backend, config.device_id)?;

    match (cs, pk, witness) {
        (
            AnyConstraintSystem::Bn254(cs),
            AnyProvingKey::Bn254(pk),
            AnyWitness::Bn254(witness),
        ) => match config.backend {
            BackendKind::Cpu => {
                groth16::prove(cs, pk, witness, &CpuBackend::new(), config).map(AnyProof::Bn254)
            }
            BackendKind::Icicle => prove_bn254_icicle(context, cs, pk, witness, config),
        },
        (
            AnyConstraintSystem::Bls12_381(cs),
            AnyProvingKey::Bls12_381(pk),
            AnyWitness::Bls12_381(witness),
        ) => groth16::prove(cs, pk, witness, &CpuBackend::new(), config)
            .map(AnyProof::Bls12_381),
        _ if pk.curve() != curve => Err(ProveError::Configuration(curve_mismatch(
            "proving key",
            curve,
            pk.curve(),
        ))),
        _ => Err(ProveError::Configuration(curve_mismatch(
            "witness",
            curve,
            witness.curve(),
        ))),
    }
}

#[cfg(feature = "icicle")]
fn prove_bn254_icicle(
    context: &AcceleratorContext,
    cs: &ConstraintSystem<Bn254Fr>,
    pk: &ProvingKey<Bn254>,
    witness: &Witness<Bn254Fr>,
    config: &ProverConfig,
) -> Result<AnyProof, ProveError> {
    let backend = crate::backend::icicle::IcicleBackend::new(context, config.device_id)?;
    groth16::prove(cs, pk, witness, &backend, config).map(AnyProof::Bn254)
}

#[cfg(not(feature = "icicle"))]
fn prove_bn254_icicle(
    _context: &AcceleratorContext,
    _cs: &ConstraintSystem<Bn254Fr>,
    _pk: &ProvingKey<Bn254>,
    _witness: &Witness<Bn254Fr>,
    _config: &ProverConfig,
) -> Result<AnyProof, ProveError> {
    Err(ProveError::Configuration(
        "built without the `icicle` feature".to_string(),
    ))
}

pub fn verify(
    proof: &AnyProof,
    vk: &AnyVerifyingKey,
    public_witness: &AnyPublicWitness,
    config: &VerifierConfig,
) -> Result<(), VerifyError> {
    match (proof, vk, public_witness) {
        (AnyProof::Bn254(proof), AnyVerifyingKey::Bn254(vk), AnyPublicWitness::Bn254(public)) => {
            groth16::verify(proof, vk, public, config)
        }
        (
            AnyProof::Bls12_381(proof),
            AnyVerifyingKey::Bls12_381(vk),
            AnyPublicWitness::Bls12_381(public),
        ) => groth16::verify(proof, vk, public, config),
        _ => Err(VerifyError::Configuration(format!(
            "curve mismatch: proof over {}, key over {}, public witness over {}",
            proof.curve(),
            vk.curve(),
            public_witness.curve()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::r1cs::ConstraintSystemBuilder;
    use ark_ff::PrimeField;

    fn circuit<F: PrimeField>() -> ConstraintSystem<F> {
        let mut builder = ConstraintSystemBuilder::<F>::new();
        let out = builder.public_input();
        let x = builder.secret_input();
        let y = builder.secret_input();
        builder.assert_mul(x, y, out);
        builder.build().unwrap()
    }

    fn witness<F: PrimeField>() -> Witness<F> {
        Witness::new(vec![F::from(15u64)], vec![F::from(3u64), F::from(5u64)])
    }

    #[test]
    fn curve_names_round_trip() {
        for curve in [CurveId::Bn254, CurveId::Bls12_381] {
            assert_eq!(curve.to_string().parse::<CurveId>(), Ok(curve));
            assert_eq!(CurveId::from_tag(curve.tag()), Some(curve));
        }
        assert!("secp256k1".parse::<CurveId>().is_err());
        assert!(!CurveId::Bls12_381.supports(BackendKind::Icicle));
    }

    #[test]
    fn dispatch_per_curve() {
        let context = AcceleratorContext::cpu();
        let config = ProverConfig::default();
        for (cs, witness, public) in [
            (
                AnyConstraintSystem::Bn254(circuit()),
                AnyWitness::Bn254(witness()),
                AnyPublicWitness::Bn254(vec![Bn254Fr::from(15u64)]),
            ),
            (
                AnyConstraintSystem::Bls12_381(circuit()),
                AnyWitness::Bls12_381(witness()),
                AnyPublicWitness::Bls12_381(vec![Bls12_381Fr::from(15u64)]),
            ),
        ] {
            let (pk, vk) = setup(&context, &cs).unwrap();
            let proof = prove(&context, &cs, &pk, &witness, &config).unwrap();
            assert_eq!(proof.curve(), cs.curve());

            let mut bytes = Vec::new();
            proof.write_to(&mut bytes).unwrap();
            assert_eq!(bytes[0], cs.curve().tag());
            let proof = AnyProof::read_from(&bytes[..]).unwrap();

            let mut bytes = Vec::new();
            vk.write_raw_to(&mut bytes).unwrap();
            let vk = AnyVerifyingKey::read_raw_from(&bytes[..]).unwrap();
            verify(&proof, &vk, &public, &VerifierConfig::default()).unwrap();
        }
    }

    #[test]
    fn mixed_curves_are_rejected() {
        let context = AcceleratorContext::cpu();
        let bn = AnyConstraintSystem::Bn254(circuit());
        let bls = AnyConstraintSystem::Bls12_381(circuit());
        let (bn_pk, bn_vk) = setup(&context, &bn).unwrap();
        let (bls_pk, _) = setup(&context, &bls).unwrap();

        let err = prove(
            &context,
            &bn,
            &bls_pk,
            &AnyWitness::Bn254(witness()),
            &ProverConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ProveError::Configuration(_)));

        let proof = prove(
            &context,
            &bn,
            &bn_pk,
            &AnyWitness::Bn254(witness()),
            &ProverConfig::default(),
        )
        .unwrap();
        let err = verify(
            &proof,
            &bn_vk,
            &AnyPublicWitness::Bls12_381(vec![Bls12_381Fr::from(15u64)]),
            &VerifierConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, VerifyError::Configuration(_)));
    }

    #[test]
    fn bls12_381_has_no_icicle_backend() {
        let context = AcceleratorContext::cpu();
        let cs = AnyConstraintSystem::Bls12_381(circuit());
        let (pk, _) = setup(&context, &cs).unwrap();
        let config = ProverConfig::default().with_backend(BackendKind::Icicle);
        let err = prove(&context, &cs, &pk, &AnyWitness::Bls12_381(witness()), &config)
            .unwrap_err();
        assert!(matches!(
            err,
            ProveError::UnsupportedCurve {
                curve: CurveId::Bls12_381,
                backend: BackendKind::Icicle
            }
        ));
    }

    #[test]
    fn setup_rejects_curves_the_context_cannot_prove() {
        let icicle = AcceleratorContext::detached(BackendKind::Icicle, 1);
        let err = setup(&icicle, &AnyConstraintSystem::Bls12_381(circuit())).unwrap_err();
        assert!(matches!(
            err,
            SetupError::UnsupportedCurve {
                curve: CurveId::Bls12_381,
                backend: BackendKind::Icicle
            }
        ));

        let (pk, vk) = setup(&icicle, &AnyConstraintSystem::Bn254(circuit())).unwrap();
        assert_eq!(pk.curve(), CurveId::Bn254);
        assert_eq!(vk.curve(), CurveId::Bn254);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(AnyProof::read_from(&[7u8, 0, 0][..]).is_err());
    }
}
