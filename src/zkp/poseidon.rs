// Poseidon hash over the BN254 scalar field, evaluated natively and in-circuit
// Used for keys, note commitments, nullifiers and Merkle nodes

use std::sync::OnceLock;

use ark_bn254::Fr;
use ark_crypto_primitives::crh::poseidon::constraints::{CRHGadget, CRHParametersVar};
use ark_crypto_primitives::crh::poseidon::CRH;
use ark_crypto_primitives::crh::CRHSchemeGadget;
use ark_crypto_primitives::sponge::poseidon::{find_poseidon_ark_and_mds, PoseidonConfig, PoseidonSponge};
use ark_crypto_primitives::sponge::CryptographicSponge;
use ark_ff::PrimeField;
use ark_r1cs_std::alloc::AllocVar;
use ark_r1cs_std::fields::fp::FpVar;
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

/// Full rounds, shared by every width
pub const FULL_ROUNDS: usize = 8;
/// S-box exponent
pub const ALPHA: u64 = 5;
/// Largest supported input count (state width 4)
pub const MAX_INPUTS: usize = 3;
/// Partial rounds for one, two and three inputs
const PARTIAL_ROUNDS: [usize; MAX_INPUTS] = [56, 57, 56];

/// One Poseidon instance per input count.
///
/// Each input count gets its own state width (inputs + 1 capacity element),
/// which separates the domains of `hash1`, `hash2` and `hash3`.
pub struct PoseidonParameters {
    configs: Vec<PoseidonConfig<Fr>>,
}

impl PoseidonParameters {
    fn generate() -> Self {
        let configs = (1..=MAX_INPUTS)
            .map(|rate| {
                let partial_rounds = PARTIAL_ROUNDS[rate - 1];
                let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
                    Fr::MODULUS_BIT_SIZE as u64,
                    rate,
                    FULL_ROUNDS as u64,
                    partial_rounds as u64,
                    0,
                );
                PoseidonConfig::new(FULL_ROUNDS, partial_rounds, ALPHA, mds, ark, rate, 1)
            })
            .collect();
        Self { configs }
    }

    /// Parameters for hashing exactly `inputs` elements (1..=3)
    pub fn config(&self, inputs: usize) -> &PoseidonConfig<Fr> {
        &self.configs[inputs - 1]
    }
}

/// Lazily generated, process-wide parameters
pub fn parameters() -> &'static PoseidonParameters {
    static PARAMETERS: OnceLock<PoseidonParameters> = OnceLock::new();
    PARAMETERS.get_or_init(PoseidonParameters::generate)
}

fn hash_native(inputs: &[Fr]) -> Fr {
    let mut sponge = PoseidonSponge::new(parameters().config(inputs.len()));
    sponge.absorb(&inputs.to_vec());
    sponge.squeeze_field_elements::<Fr>(1)[0]
}

pub fn hash1(a: Fr) -> Fr {
    hash_native(&[a])
}

pub fn hash2(a: Fr, b: Fr) -> Fr {
    hash_native(&[a, b])
}

pub fn hash3(a: Fr, b: Fr, c: Fr) -> Fr {
    hash_native(&[a, b, c])
}

/// In-circuit counterpart of the native functions above
pub struct PoseidonGadget {
    params: Vec<CRHParametersVar<Fr>>,
}

impl PoseidonGadget {
    pub fn new(cs: ConstraintSystemRef<Fr>) -> Result<Self, SynthesisError> {
        let params = (1..=MAX_INPUTS)
            .map(|inputs| CRHParametersVar::<Fr>::new_constant(cs.clone(), parameters().config(inputs)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { params })
    }

    fn evaluate(&self, inputs: &[FpVar<Fr>]) -> Result<FpVar<Fr>, SynthesisError> {
        <CRHGadget<Fr> as CRHSchemeGadget<CRH<Fr>, Fr>>::evaluate(&self.params[inputs.len() - 1], inputs)
    }

    pub fn hash1(&self, a: &FpVar<Fr>) -> Result<FpVar<Fr>, SynthesisError> {
        self.evaluate(&[a.clone()])
    }

    pub fn hash2(&self, a: &FpVar<Fr>, b: &FpVar<Fr>) -> Result<FpVar<Fr>, SynthesisError> {
        self.evaluate(&[a.clone(), b.clone()])
    }

    pub fn hash3(&self, a: &FpVar<Fr>, b: &FpVar<Fr>, c: &FpVar<Fr>) -> Result<FpVar<Fr>, SynthesisError> {
        self.evaluate(&[a.clone(), b.clone(), c.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_r1cs_std::R1CSVar;
    use ark_relations::r1cs::ConstraintSystem;

    #[test]
    fn test_poseidon_parameters_shape() {
        let params = parameters();
        for inputs in 1..=MAX_INPUTS {
            let config = params.config(inputs);
            assert_eq!(config.rate, inputs);
            assert_eq!(config.capacity, 1);
            assert_eq!(config.full_rounds, FULL_ROUNDS);
            assert_eq!(config.alpha, ALPHA);
            assert_eq!(config.mds.len(), inputs + 1);
        }
    }

    #[test]
    fn test_hash_is_deterministic_and_input_sensitive() {
        let a = Fr::from(1u64);
        let b = Fr::from(2u64);
        assert_eq!(hash2(a, b), hash2(a, b));
        assert_ne!(hash2(a, b), hash2(b, a));
        assert_ne!(hash3(a, b, Fr::from(0u64)), hash3(a, b, Fr::from(1u64)));
    }

    #[test]
    fn test_widths_are_domain_separated() {
        let a = Fr::from(42u64);
        let zero = Fr::from(0u64);
        assert_ne!(hash1(a), hash2(a, zero));
        assert_ne!(hash2(a, zero), hash3(a, zero, zero));
    }

    #[test]
    fn test_gadget_matches_native() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let gadget = PoseidonGadget::new(cs.clone()).unwrap();

        let a = Fr::from(11u64);
        let b = Fr::from(22u64);
        let c = Fr::from(33u64);
        let a_var = FpVar::new_witness(cs.clone(), || Ok(a)).unwrap();
        let b_var = FpVar::new_witness(cs.clone(), || Ok(b)).unwrap();
        let c_var = FpVar::new_witness(cs.clone(), || Ok(c)).unwrap();

        assert_eq!(gadget.hash1(&a_var).unwrap().value().unwrap(), hash1(a));
        assert_eq!(gadget.hash2(&a_var, &b_var).unwrap().value().unwrap(), hash2(a, b));
        assert_eq!(gadget.hash3(&a_var, &b_var, &c_var).unwrap().value().unwrap(), hash3(a, b, c));
        assert!(cs.is_satisfied().unwrap());
    }
}
