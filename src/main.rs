//! sendflow - drive one send through the pipeline against the simulated ledger
//!
//! ```text
//! sendflow --kind transfer --to 1Bob --amount 1.5 --inputs 600
//! sendflow --kind script --bytecode 0x0102 --password hunter2
//! ```
//!
//! When the source address holds more inputs than one transaction may spend,
//! the consolidation prompt is accepted, the sweep is submitted and the
//! original draft is sent in a fresh run.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sendflow::collaborators::{CredentialGate, TracingNotifier};
use sendflow::pipeline::{BuildOutcome, Collaborators, SendOutcome, SendPipeline};
use sendflow::simulated::{InMemoryAddressRegistry, SimulatedLedger, StaticPasswordGate};
use sendflow::{Address, PartialDraft, SendflowConfig, TxKind};

const DEMO_ADDRESS: &str = "1DrDyTr9RpRsQnDnXo2YRiPzPW4ooHX5LLoqXrqfMrpQH";
const DEMO_PUBLIC_KEY: &str = "0381818e63bd9e35a5489b52a430accefc608fd60aa2c7c0d1b393b5239aedf6b2";

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "sendflow.toml")]
    config: String,

    /// Transaction kind (transfer, script, deploy)
    #[arg(short, long, default_value = "transfer")]
    kind: TxKind,

    /// Destination address for transfers
    #[arg(long)]
    to: Option<String>,

    /// Amount in whole units (e.g. 1.5); omitted on a transfer means send everything
    #[arg(short, long)]
    amount: Option<String>,

    /// Hex bytecode for script calls and deployments
    #[arg(long)]
    bytecode: Option<String>,

    /// Password entered at the password check
    #[arg(long)]
    password: Option<String>,

    /// Password the simulated wallet expects
    #[arg(long, env = "SENDFLOW_WALLET_PASSWORD", default_value = "", hide_env_values = true)]
    wallet_password: String,

    /// Inputs held by the sending address (overrides the config)
    #[arg(long)]
    inputs: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    let config = SendflowConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    let address = Address::new(DEMO_ADDRESS, DEMO_PUBLIC_KEY, config.simulation.balance);
    let inputs = args.inputs.unwrap_or(config.simulation.initial_inputs);
    let ledger = Arc::new(SimulatedLedger::new(config.simulation.clone()).with_inputs(DEMO_ADDRESS, inputs));
    let credentials = config
        .pipeline
        .password_requirement
        .then(|| Arc::new(StaticPasswordGate::new(&args.wallet_password)) as Arc<dyn CredentialGate>);

    let deps = Collaborators {
        ledger: ledger.clone(),
        registry: Arc::new(InMemoryAddressRegistry::new(vec![address.clone()])),
        notifier: Arc::new(TracingNotifier),
        credentials,
        session: None,
    };

    let draft = draft_from_args(&args, address);
    info!(kind = ?draft.kind, inputs, network = %config.pipeline.network, "Starting send");

    // A sweep completes its own run, so the original draft gets a second one
    for attempt in 1..=2 {
        let mut pipeline = SendPipeline::new(draft.clone(), deps.clone(), &config)?;
        if run_once(&mut pipeline, &draft, args.password.as_deref()).await? {
            info!(attempt, submitted = ledger.submitted().len(), "Done");
            return Ok(());
        }
        info!(remaining_inputs = ledger.inputs(DEMO_ADDRESS), "Inputs consolidated, sending again");
    }
    bail!("transaction still needs consolidation after sweeping")
}

fn init_logging(verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        "sendflow=debug,info"
    } else {
        "sendflow=info,warn,error"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(())
}

fn draft_from_args(args: &Args, address: Address) -> PartialDraft {
    let mut draft = PartialDraft::new(args.kind, address);
    if let Some(to) = &args.to {
        draft = draft.to(to);
    }
    if let Some(bytecode) = &args.bytecode {
        draft = draft.bytecode(bytecode);
    }
    match (&args.amount, args.kind) {
        (Some(amount), _) => draft.amount(amount),
        (None, TxKind::Transfer) => draft.send_remaining(),
        (None, _) => draft,
    }
}

/// Run the pipeline to completion; false when the run only swept inputs
async fn run_once(pipeline: &mut SendPipeline, draft: &PartialDraft, password: Option<&str>) -> Result<bool> {
    let outcome = match pipeline.submit_draft(draft.clone()).await? {
        BuildOutcome::Review(summary) => {
            info!(
                title = pipeline.title(),
                tx_id = %summary.tx_id,
                fee = %summary.fee,
                amount = ?summary.amount,
                destination = ?summary.destination,
                "Review"
            );
            let outcome = pipeline.send().await?;
            authenticate_if_needed(pipeline, outcome, password).await?
        }
        BuildOutcome::ConsolidationPrompt(prompt) => {
            info!(transactions = prompt.transactions, fee = %prompt.fee, "Consolidation required, accepting");
            let outcome = pipeline.accept_consolidation().await?;
            let outcome = authenticate_if_needed(pipeline, outcome, password).await?;
            if let SendOutcome::Sent(report) = outcome {
                info!(notice = %report.notice, tx_count = report.tx_ids.len(), "Sweep submitted");
                return Ok(false);
            }
            outcome
        }
        BuildOutcome::Discarded => bail!("run closed before the build finished"),
    };

    match outcome {
        SendOutcome::Sent(report) => {
            info!(notice = %report.notice, tx_ids = ?report.tx_ids, signature = ?report.signature, "Submitted");
            Ok(true)
        }
        SendOutcome::PasswordRequired | SendOutcome::Discarded => {
            warn!(step = %pipeline.step(), "Run ended without a submission");
            bail!("transaction was not submitted")
        }
    }
}

async fn authenticate_if_needed(
    pipeline: &mut SendPipeline,
    outcome: SendOutcome,
    password: Option<&str>,
) -> Result<SendOutcome> {
    if outcome != SendOutcome::PasswordRequired {
        return Ok(outcome);
    }
    let Some(password) = password else {
        pipeline.close()?;
        bail!("password required, pass --password");
    };
    Ok(pipeline.authenticate(password).await?)
}
