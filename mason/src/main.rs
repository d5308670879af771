//! Grid-world construction agent CLI.
//!
//! Parses voxel schemas, previews build orders and runs the full
//! orchestrator against the in-process simulated world.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::warn;

use mason::context::{RunContext, Settings};
use mason::core::invariants::validate_plan;
use mason::core::manifest::Manifest;
use mason::core::planner::{self, PlanOptions};
use mason::core::schema::Schema;
use mason::core::types::{Facing, FuelLevel, ItemStack, RunMode, Vec3};
use mason::exit_codes;
use mason::io::config::{DEFAULT_CONFIG_FILE, MasonConfig, load_config, write_config};
use mason::io::operator::{Headless, Operator, default_operator};
use mason::io::report::write_report;
use mason::io::schema_file::{list_schemas, load_schema};
use mason::io::sim::{CONTAINER_SLOTS, DEFAULT_STACK_LIMIT, SimWorld};
use mason::logging;
use mason::orchestrator::{self, StepEvent, StepResult};

/// Directory searched when no schema path is given.
const SCHEMA_DIR: &str = "schemas";

#[derive(Parser)]
#[command(
    name = "mason",
    version,
    about = "Plan and run grid-world construction jobs"
)]
struct Cli {
    /// Configuration file.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Raise diagnostic logging on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default configuration file if missing.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Parse a schema file and check the plan it produces.
    Validate { schema: PathBuf },
    /// Print the materials a schema needs.
    Manifest { schema: PathBuf },
    /// Print the build order without running it.
    Plan {
        /// Schema file; chosen from `schemas/` when omitted.
        schema: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Run a schema against the simulated world.
    Simulate {
        /// Schema file; chosen from `schemas/` when omitted.
        schema: Option<PathBuf>,
        /// Starting fuel level.
        #[arg(long, default_value_t = 1000)]
        fuel: u32,
        /// Never prompt; anything needing the operator aborts the run.
        #[arg(long)]
        headless: bool,
        /// Write the completion report as JSON.
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Validate { schema } => cmd_validate(&cli.config, &schema),
        Command::Manifest { schema } => cmd_manifest(&schema),
        Command::Plan { schema, format } => cmd_plan(&cli.config, schema, format),
        Command::Simulate {
            schema,
            fuel,
            headless,
            report,
        } => cmd_simulate(&cli.config, schema, fuel, headless, report.as_deref()),
    }
}

fn cmd_init(config: &Path, force: bool) -> Result<i32> {
    if config.exists() && !force {
        println!("{} already exists", config.display());
        return Ok(exit_codes::OK);
    }
    write_config(config, &MasonConfig::default())?;
    println!("wrote {}", config.display());
    Ok(exit_codes::OK)
}

fn cmd_validate(config: &Path, schema_path: &Path) -> Result<i32> {
    let cfg = load_config(config)?;
    let schema = load_schema(schema_path)?;
    let plan = planner::plan(&schema, &plan_options(&cfg));
    if cfg.build.mode == RunMode::Build {
        let errors = validate_plan(&plan.steps);
        if !errors.is_empty() {
            bail!("plan violations:\n- {}", errors.join("\n- "));
        }
    }
    let bounds = schema.bounds();
    println!(
        "ok: {} steps, {} materials, bounds {}..{}, {} air cells skipped",
        plan.steps.len(),
        schema.manifest().len(),
        bounds.min,
        bounds.max,
        plan.skipped
    );
    Ok(exit_codes::OK)
}

fn cmd_manifest(schema_path: &Path) -> Result<i32> {
    let schema = load_schema(schema_path)?;
    let manifest = schema.manifest();
    for (material, count) in manifest.iter() {
        println!("{count:>6}  {material}");
    }
    println!("{:>6}  total", manifest.total());
    Ok(exit_codes::OK)
}

fn cmd_plan(config: &Path, schema_path: Option<PathBuf>, format: Format) -> Result<i32> {
    let cfg = load_config(config)?;
    let mut operator = default_operator();
    let schema_path = resolve_schema(schema_path, operator.as_mut())?;
    let schema = load_schema(&schema_path)?;
    let plan = planner::plan(&schema, &plan_options(&cfg));
    match format {
        Format::Json => {
            let json = serde_json::to_string_pretty(&plan.steps).context("serialize plan")?;
            println!("{json}");
        }
        Format::Text => {
            for step in &plan.steps {
                println!(
                    "{:>5}  {:<28} target {}  from {}  side {}",
                    step.index, step.material, step.target, step.approach, step.side
                );
            }
            println!("{} steps, {} skipped", plan.steps.len(), plan.skipped);
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_simulate(
    config: &Path,
    schema_path: Option<PathBuf>,
    fuel: u32,
    headless: bool,
    report_path: Option<&Path>,
) -> Result<i32> {
    let mut cfg = load_config(config)?;
    let mut operator: Box<dyn Operator> = if headless {
        Box::new(Headless)
    } else {
        default_operator()
    };
    let schema_path = resolve_schema(schema_path, operator.as_mut())?;
    let schema = load_schema(&schema_path)?;

    let facing = operator.choose_facing(Facing::North);
    cfg.build.orientation = operator.choose_orientation(cfg.build.orientation);
    let mut world = supplied_world(&schema, &cfg, fuel).with_agent(Vec3::ZERO, facing);
    let mut ctx = RunContext::new(&cfg, Vec3::ZERO, facing);

    let report = orchestrator::run(&mut ctx, &mut world, operator.as_mut(), &schema, print_step);
    println!("{}", report.summary());
    if let Some(error) = &report.last_error {
        println!("last error: {error}");
    }
    if let Some(path) = report_path {
        write_report(path, &report)?;
    }
    Ok(exit_codes::for_outcome(report.outcome))
}

fn resolve_schema(path: Option<PathBuf>, operator: &mut dyn Operator) -> Result<PathBuf> {
    if let Some(path) = path {
        return Ok(path);
    }
    let candidates = list_schemas(Path::new(SCHEMA_DIR))?;
    if candidates.is_empty() {
        bail!("no schema given and {SCHEMA_DIR}/ holds no schema files");
    }
    operator
        .choose_schema(&candidates)
        .context("no schema chosen")
}

fn plan_options(cfg: &MasonConfig) -> PlanOptions {
    Settings::from_config(cfg).plan
}

/// Simulated world with a supply chest under the home cell.
///
/// Build runs get the schema's materials in the chest; every run gets a
/// stack of coal there.
fn supplied_world(schema: &Schema, cfg: &MasonConfig, fuel: u32) -> SimWorld {
    let mut world = SimWorld::new().with_fuel(FuelLevel::Level(fuel));
    let mut items = vec![ItemStack::new("minecraft:coal", DEFAULT_STACK_LIMIT)];
    if cfg.build.mode == RunMode::Build {
        stack_into(&mut items, schema.manifest());
    }
    world.add_container(Vec3::DOWN, "minecraft:chest", items);
    world
}

fn stack_into(items: &mut Vec<ItemStack>, manifest: &Manifest) {
    for (material, count) in manifest.iter() {
        let mut left = count;
        while left > 0 {
            if items.len() >= CONTAINER_SLOTS {
                warn!(%material, left, "supply chest full, run will be short");
                return;
            }
            let n = left.min(DEFAULT_STACK_LIMIT);
            items.push(ItemStack::new(material.clone(), n));
            left -= n;
        }
    }
}

fn print_step(event: &StepEvent) {
    let verb = match event.result {
        StepResult::Placed => "placed",
        StepResult::Reused => "kept",
        StepResult::Cleared => "cleared",
        StepResult::AlreadyEmpty => "already empty",
        StepResult::Failed => "failed",
    };
    println!(
        "[{}/{}] {verb} {} at {}",
        event.index + 1,
        event.total,
        event.material,
        event.target
    );
}
