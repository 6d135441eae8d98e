// crates/melcli/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use melcore::{AnyEnvelope, NodeConfig, Trace, Value, CONTENT_TYPE_JSON, CONTENT_TYPE_JSON_PRETTY};
use melruntime::{
    CallMode, CallStatus, CallWorkflowRequest, MelRuntime, PipelineResult, PlatformConfig,
    RuntimeConfig, SourceContext,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mel")]
#[command(about = "Mel workflow engine CLI", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available node types and their capabilities
    Nodes,

    /// Run a pipeline file over a JSON input
    Run {
        /// Path to a JSON array of node configs
        #[arg(short, long)]
        file: PathBuf,

        /// Input payload as a JSON string
        #[arg(short, long, default_value = "null")]
        input: String,

        /// Workflow id recorded in the trace
        #[arg(long, default_value = "cli")]
        agent: String,

        /// Pretty-print output envelopes
        #[arg(long)]
        pretty: bool,
    },

    /// Split a JSON array, log every item and aggregate the results
    Split {
        /// JSON array, or object holding one at --path
        #[arg(short, long)]
        input: String,

        /// Dotted path to the array inside the input
        #[arg(short, long)]
        path: Option<String>,

        /// Emit the results of this many items per group
        #[arg(long)]
        expected_count: Option<u64>,
    },

    /// Re-encode an envelope file with another converter
    Convert {
        /// Envelope file to read
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
        to: Format,
    },

    /// Call another workflow through the dispatch layer
    Call {
        /// Target workflow id
        #[arg(short, long)]
        workflow: String,

        /// Call payload as a JSON string
        #[arg(short, long, default_value = "null")]
        data: String,

        /// Return immediately after dispatch
        #[arg(long)]
        no_wait: bool,

        /// Seconds to wait for the return
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Dispatch base URL (overrides MEL_TRIGGER_URL)
        #[arg(long)]
        trigger_url: Option<String>,
    },

    /// Create an example pipeline file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "pipeline.json")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Compact,
    Pretty,
}

impl Format {
    fn content_type(self) -> &'static str {
        match self {
            Format::Compact => CONTENT_TYPE_JSON,
            Format::Pretty => CONTENT_TYPE_JSON_PRETTY,
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Nodes => list_nodes()?,
        Commands::Run {
            file,
            input,
            agent,
            pretty,
        } => run_pipeline(file, &input, &agent, pretty).await?,
        Commands::Split {
            input,
            path,
            expected_count,
        } => split_input(&input, path, expected_count).await?,
        Commands::Convert { file, to } => convert_envelope(file, to)?,
        Commands::Call {
            workflow,
            data,
            no_wait,
            timeout,
            trigger_url,
        } => call_workflow(workflow, &data, no_wait, timeout, trigger_url).await?,
        Commands::Init { output } => create_example_pipeline(output)?,
    }

    Ok(())
}

fn build_runtime(platform: PlatformConfig) -> Result<MelRuntime> {
    let runtime = MelRuntime::new(RuntimeConfig {
        platform,
        ..RuntimeConfig::default()
    });
    melnodes::register_all(runtime.registry(), runtime.mel())?;
    Ok(runtime)
}

fn parse_payload(raw: &str) -> Result<Value> {
    let json: serde_json::Value = serde_json::from_str(raw).context("Input is not valid JSON")?;
    Ok(Value::from(json))
}

fn list_nodes() -> Result<()> {
    println!("📦 Available Node Types:");
    println!();

    let runtime = build_runtime(PlatformConfig::default())?;
    for summary in runtime.registry().list() {
        println!(
            "  • {} ({}) [{}]",
            summary.meta.type_id, summary.meta.category, summary.capabilities
        );
        if !summary.meta.description.is_empty() {
            println!("    {}", summary.meta.description);
        }
        for param in &summary.meta.parameters {
            let marker = if param.required { "required" } else { "optional" };
            println!("      - {} ({}): {}", param.name, marker, param.description);
        }
    }
    Ok(())
}

async fn run_pipeline(file: PathBuf, input: &str, agent: &str, pretty: bool) -> Result<()> {
    println!("🚀 Loading pipeline from: {}", file.display());

    let pipeline_json = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let pipeline: Vec<NodeConfig> = serde_json::from_str(&pipeline_json)?;
    println!("   Nodes: {}", pipeline.len());
    println!();

    let runtime = build_runtime(PlatformConfig::from_env())?;
    let result = execute(&runtime, agent, &pipeline, parse_payload(input)?).await;

    let format = if pretty { Format::Pretty } else { Format::Compact };
    print_result(&runtime, &result, format)
}

async fn split_input(input: &str, path: Option<String>, expected_count: Option<u64>) -> Result<()> {
    let mut split = NodeConfig::new("flow.split").with_id("split");
    if let Some(path) = path {
        split = split.with_config("path", path);
    }
    let mut aggregate = NodeConfig::new("flow.aggregate")
        .with_id("aggregate")
        .with_config("partial_results", false);
    if let Some(count) = expected_count {
        aggregate = aggregate.with_config("expected_count", count);
    }
    let pipeline = vec![split, NodeConfig::new("debug.log").with_id("log"), aggregate];

    let runtime = build_runtime(PlatformConfig::from_env())?;
    let result = execute(&runtime, "cli", &pipeline, parse_payload(input)?).await;
    print_result(&runtime, &result, Format::Pretty)
}

async fn execute(runtime: &MelRuntime, agent: &str, pipeline: &[NodeConfig], payload: Value) -> PipelineResult {
    let run_id = uuid::Uuid::new_v4().to_string();
    let ctx = runtime.context(agent, &run_id);
    let input = AnyEnvelope::new(payload, Trace::new(agent, &run_id, "cli"));

    let result = runtime.run(&ctx, pipeline, input).await;
    runtime.finish_run(&run_id);
    result
}

fn print_result(runtime: &MelRuntime, result: &PipelineResult, format: Format) -> Result<()> {
    println!();
    println!("📊 Execution Summary:");
    println!("   Node executions: {}", result.executions);
    println!("   Outputs: {}", result.outputs.len());
    println!("   Waiting: {}", result.pending);
    println!("   Failures: {}", result.failures.len());
    println!("   Duration: {}ms", result.duration.as_millis());

    for failure in &result.failures {
        println!("  ❌ {}", failure);
    }

    if !result.outputs.is_empty() {
        println!();
        println!("📤 Outputs:");
        for envelope in &result.outputs {
            let bytes = runtime.converters().marshal(format.content_type(), envelope)?;
            println!("{}", String::from_utf8_lossy(&bytes));
        }
    }

    if result.is_success() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("{} pipeline branch(es) failed", result.failures.len()))
    }
}

fn convert_envelope(file: PathBuf, to: Format) -> Result<()> {
    let bytes = std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
    let converters = melcore::ConverterSet::with_defaults();

    // Both JSON variants decode alike, so the compact reader accepts either.
    let envelope = converters.unmarshal(CONTENT_TYPE_JSON, &bytes)?;
    let output = converters.marshal(to.content_type(), &envelope)?;
    println!("{}", String::from_utf8_lossy(&output));
    Ok(())
}

async fn call_workflow(
    workflow: String,
    data: &str,
    no_wait: bool,
    timeout: Option<u64>,
    trigger_url: Option<String>,
) -> Result<()> {
    let mut platform = PlatformConfig::from_env();
    if let Some(url) = trigger_url {
        platform.trigger_base_url = url.trim_end_matches('/').to_string();
    }
    let runtime = build_runtime(platform)?;
    let run_id = uuid::Uuid::new_v4().to_string();
    let ctx = runtime.context("cli", &run_id);

    let request = CallWorkflowRequest {
        target_workflow_id: workflow.clone(),
        call_data: parse_payload(data)?,
        call_mode: if no_wait { CallMode::Async } else { CallMode::Sync },
        timeout_seconds: timeout,
        source: SourceContext {
            workflow_id: "cli".to_string(),
            run_id,
            node_id: None,
        },
    };

    println!("📨 Calling workflow: {}", workflow);
    let mel = runtime.mel();
    let response = tokio::select! {
        response = mel.call_workflow(request, &ctx.cancellation) => response?,
        _ = tokio::signal::ctrl_c() => {
            runtime.shutdown();
            return Err(anyhow::anyhow!("Interrupted"));
        }
    };

    match response.status {
        CallStatus::Sent => println!("✨ Dispatched call {}", response.call_id),
        CallStatus::Completed => {
            println!(
                "✨ Call {} returned '{}' in {}ms",
                response.call_id,
                response.return_status.unwrap_or_default(),
                response.duration.as_millis()
            );
            let data = response.data.unwrap_or_default();
            println!("{}", serde_json::to_string_pretty(&data.to_json())?);
        }
    }
    Ok(())
}

fn create_example_pipeline(output: PathBuf) -> Result<()> {
    let pipeline = vec![
        NodeConfig::new("flow.split")
            .with_name("Split Items")
            .with_config("path", "items"),
        NodeConfig::new("debug.log")
            .with_name("Log Item")
            .with_config("message", "item"),
        NodeConfig::new("flow.aggregate").with_name("Collect Items"),
    ];

    let json = serde_json::to_string_pretty(&pipeline)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example pipeline: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  mel run --file {} --input '{{\"items\": [1, 2, 3]}}'",
        output.display()
    );

    Ok(())
}
