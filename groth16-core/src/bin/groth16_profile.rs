use std::any::Any;
use std::time::Instant;

use ark_ff::PrimeField;
use clap::{Parser, ValueEnum};
use eyre::WrapErr;
use tracing_chrome::ChromeLayerBuilder;
use tracing_subscriber::{self, fmt::format::FmtSpan, prelude::*, EnvFilter};

use groth16_core::backend::{AcceleratorConfig, AcceleratorContext, BackendKind};
use groth16_core::curves::{
    self, AnyConstraintSystem, AnyProof, AnyPublicWitness, AnyWitness, CurveId,
};
use groth16_core::dag::Schedule;
use groth16_core::groth16::{ProverConfig, VerifierConfig};
use groth16_core::r1cs::synthetic::{power_chain, SyntheticCircuit};

/// Runs setup, prove and verify on a synthetic power-chain circuit under tracing.
#[derive(Parser, Debug)]
struct Cli {
    /// Number of multiplication constraints, as 2^scale
    #[clap(short, long, default_value_t = 16)]
    scale: usize,

    /// Add a commitment group to the circuit
    #[clap(long)]
    commitment: bool,

    #[clap(long, default_value = "bn254")]
    curve: CurveId,

    #[clap(long, value_enum, default_value_t = BackendArg::Cpu)]
    backend: BackendArg,

    #[clap(long, default_value_t = 0)]
    device: usize,

    /// Override the backend's default schedule
    #[clap(long, value_enum)]
    schedule: Option<ScheduleArg>,

    /// Number of proofs to generate with the same key
    #[clap(short, long, default_value_t = 1)]
    repeat: usize,

    /// Output formats
    #[clap(short, long, value_enum)]
    format: Option<Vec<Format>>,

    /// Chrome trace output file
    #[clap(long)]
    trace_file: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
enum BackendArg {
    Cpu,
    Icicle,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
enum ScheduleArg {
    Sequential,
    Concurrent,
}

#[derive(Debug, Clone, ValueEnum, PartialEq)]
enum Format {
    Default,
    Chrome,
}

fn init_tracing(cli: &Cli) -> Vec<Box<dyn Any>> {
    let mut layers = Vec::new();

    let log_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_filter(log_filter)
        .boxed();
    layers.push(log_layer);

    let mut guards: Vec<Box<dyn Any>> = vec![];
    if let Some(format) = &cli.format {
        if format.contains(&Format::Default) {
            let collector_layer = tracing_subscriber::fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .compact()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .boxed();
            layers.push(collector_layer);
        }
        if format.contains(&Format::Chrome) {
            let (chrome_layer, guard) = match &cli.trace_file {
                Some(file) => ChromeLayerBuilder::new()
                    .file(file)
                    .include_args(true)
                    .build(),
                None => ChromeLayerBuilder::new().include_args(true).build(),
            };
            layers.push(chrome_layer.boxed());
            guards.push(Box::new(guard));
            tracing::info!("Running tracing-chrome. Traces can be viewed in https://ui.perfetto.dev/");
        }
    }

    tracing_subscriber::registry().with(layers).init();
    guards
}

/// Initializes the requested backend. A backend that fails to come up terminates the
/// process.
fn init_context(cli: &Cli) -> eyre::Result<(AcceleratorContext, AcceleratorConfig)> {
    let mut config = AcceleratorConfig::from_env().wrap_err("reading accelerator environment")?;
    config.kind = match cli.backend {
        BackendArg::Cpu => BackendKind::Cpu,
        BackendArg::Icicle => BackendKind::Icicle,
    };
    config.device_id = cli.device;
    Ok((AcceleratorContext::init_or_exit(&config), config))
}

fn synthetic<F: PrimeField>(cli: &Cli) -> eyre::Result<SyntheticCircuit<F>> {
    let nb_mul = (1usize << cli.scale).saturating_sub(1);
    power_chain(nb_mul, cli.commitment, F::from(3u64)).wrap_err("building synthetic circuit")
}

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    let _guards = init_tracing(&cli);

    let (context, accelerator) = init_context(&cli)?;
    let mut prover_config = ProverConfig::default()
        .with_backend(accelerator.kind)
        .with_device_id(accelerator.device_id);
    if let Some(schedule) = cli.schedule {
        prover_config = prover_config.with_schedule(match schedule {
            ScheduleArg::Sequential => Schedule::Sequential,
            ScheduleArg::Concurrent => Schedule::Concurrent,
        });
    }
    let verifier_config = VerifierConfig::from(&prover_config);

    let (cs, witness, public) = match cli.curve {
        CurveId::Bn254 => {
            let circuit = synthetic::<ark_bn254::Fr>(&cli)?;
            (
                AnyConstraintSystem::Bn254(circuit.cs),
                AnyWitness::Bn254(circuit.witness),
                AnyPublicWitness::Bn254(circuit.public),
            )
        }
        CurveId::Bls12_381 => {
            let circuit = synthetic::<ark_bls12_381::Fr>(&cli)?;
            (
                AnyConstraintSystem::Bls12_381(circuit.cs),
                AnyWitness::Bls12_381(circuit.witness),
                AnyPublicWitness::Bls12_381(circuit.public),
            )
        }
    };

    let span = tracing::info_span!("groth16_profile", curve = %cli.curve, scale = cli.scale);
    let _enter = span.enter();

    let start = Instant::now();
    let (pk, vk) = curves::setup(&context, &cs)?;
    tracing::info!(elapsed = ?start.elapsed(), "setup");

    let mut proof: Option<AnyProof> = None;
    for i in 0..cli.repeat.max(1) {
        let start = Instant::now();
        proof = Some(curves::prove(&context, &cs, &pk, &witness, &prover_config)?);
        tracing::info!(run = i, elapsed = ?start.elapsed(), "prove");
    }

    if let Some(proof) = proof {
        let mut bytes = Vec::new();
        proof.write_to(&mut bytes)?;
        let start = Instant::now();
        curves::verify(&proof, &vk, &public, &verifier_config)?;
        tracing::info!(elapsed = ?start.elapsed(), proof_bytes = bytes.len(), "verify");
    }
    Ok(())
}
