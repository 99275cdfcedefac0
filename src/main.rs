//! deseq2_batch command-line interface

use clap::Parser;
use log::{info, LevelFilter};

use deseq2_batch::cli::{Cli, Commands};
use deseq2_batch::load_base_dataset;
use deseq2_batch::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Find the first non-flag argument (potential subcommand)
    let first_positional = args.iter().skip(1).find(|a| !a.starts_with('-'));
    let subcommands = ["run", "check", "help"];
    let has_subcommand = first_positional.map_or(false, |a| subcommands.contains(&a.as_str()));

    if !has_subcommand {
        if args.iter().any(|a| a == "--help" || a == "-h") {
            print_help();
        } else if args.iter().any(|a| a == "-V" || a == "--version") {
            println!("deseq2_batch {}", VERSION);
        } else {
            print_no_args();
        }
        return;
    }

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Some(Commands::Run {
            counts,
            metadata,
            specs,
            output,
            names,
            name_id_column,
            name_column,
            skip_rows,
            blocking,
            min_count,
            min_samples,
            alpha,
            lfc,
            top,
            parallel,
            threads,
            no_independent_filtering,
            no_plots,
        }) => run_batch(RunArgs {
            counts,
            metadata,
            specs,
            output,
            names,
            name_id_column,
            name_column,
            skip_rows,
            blocking,
            filter: LowCountFilter {
                min_count,
                min_samples,
            },
            alpha,
            lfc,
            top,
            parallel,
            threads,
            independent_filtering: !no_independent_filtering,
            plots: !no_plots,
        }),
        Some(Commands::Check {
            counts,
            metadata,
            specs,
            skip_rows,
            blocking,
            min_count,
            min_samples,
        }) => run_check(
            &counts,
            &metadata,
            &specs,
            skip_rows,
            &blocking,
            &LowCountFilter {
                min_count,
                min_samples,
            },
        ),
        None => {
            print_no_args();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Custom help output
// ---------------------------------------------------------------------------

fn print_no_args() {
    println!("deseq2_batch v{}", VERSION);
    println!("Run `deseq2_batch --help` for usage.");
}

fn print_help() {
    println!("deseq2_batch v{}", VERSION);
    println!("Batch differential abundance comparisons with a DESeq2-style model");
    println!();
    println!("Usage: deseq2_batch <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  run        Run every comparison of a comparison table");
    println!("               - hold-constant subsets of one shared, filtered dataset");
    println!("               - donor-blocked models for dendrimer and tlr contrasts");
    println!("               - per-comparison TSV tables and volcano plots");
    println!("               - batch summary and overlap of significant features");
    println!("  check      Validate inputs and print the planned comparisons");
    println!();
    println!("Global Options:");
    println!("  -v, --verbose    Enable verbose output");
    println!("  -h, --help       Print help");
    println!("  -V, --version    Print version");
    println!();
    println!("Examples:");
    println!("  deseq2_batch run -c counts.csv -m metadata.csv -s comparisons.csv -o results");
    println!("  deseq2_batch check -c counts.csv -m metadata.csv -s comparisons.csv");
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

struct RunArgs {
    counts: String,
    metadata: String,
    specs: String,
    output: String,
    names: Option<String>,
    name_id_column: String,
    name_column: String,
    skip_rows: usize,
    blocking: String,
    filter: LowCountFilter,
    alpha: f64,
    lfc: f64,
    top: usize,
    parallel: bool,
    threads: usize,
    independent_filtering: bool,
    plots: bool,
}

fn run_batch(args: RunArgs) -> Result<()> {
    if args.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()
            .ok();
    }

    let base = load_base_dataset(&args.counts, &args.metadata, &args.filter)?;

    info!("Loading comparisons from: {}", args.specs);
    let specs = load_comparison_specs_file(&args.specs, args.skip_rows, &SpecColumns::default())?;

    let lookup = match &args.names {
        Some(path) => {
            info!("Loading feature names from: {}", path);
            NameTable::from_file(path, &args.name_id_column, &args.name_column)?
        }
        None => NameTable::default(),
    };

    let mut persister = DirectoryPersister::for_batch(&args.output)?.with_plot_options(PlotOptions {
        alpha: args.alpha,
        lfc: args.lfc,
    });
    if !args.plots {
        persister = persister.without_plots();
    }

    let config = BatchConfig {
        parallel: args.parallel,
        selector: ModelSelector::new(&args.blocking),
        alpha: args.alpha,
        lfc: args.lfc,
        top_n: args.top,
    };
    let engine = NbGlmEngine {
        wald: WaldParams {
            independent_filtering: args.independent_filtering,
            ..WaldParams::default()
        },
        ..NbGlmEngine::default()
    };
    let orchestrator = BatchOrchestrator::with_fitter(config, ContrastFitter::new(engine));
    let outcome = orchestrator.run(&specs, &base, &lookup, &persister);

    let summary = BatchSummary::new(&outcome, args.top, args.alpha);
    println!("{}", summary);
    write_reports(&args.output, &outcome, &summary, args.alpha, args.lfc)?;

    info!(
        "{} of {} comparisons succeeded; results in {}",
        outcome.n_succeeded(),
        outcome.len(),
        args.output
    );
    Ok(())
}

fn run_check(
    counts_path: &str,
    metadata_path: &str,
    specs_path: &str,
    skip_rows: usize,
    blocking: &str,
    filter: &LowCountFilter,
) -> Result<()> {
    let base = load_base_dataset(counts_path, metadata_path, filter)?;
    let specs = load_comparison_specs_file(specs_path, skip_rows, &SpecColumns::default())?;
    let selector = ModelSelector::new(blocking);

    let mut n_ok = 0;
    for spec in &specs {
        let plan = DatasetSubsetter
            .subset(&base, &spec.hold_constant_factor, &spec.hold_constant_value)
            .and_then(|subset| {
                let formula = selector.select_formula(&spec.varying_factor)?;
                let (design, _) = prepare_contrast(&subset, &formula, &spec.level_a, &spec.level_b)?;
                Ok((subset.n_samples(), design.formula))
            });

        match plan {
            Ok((n_samples, formula)) => {
                n_ok += 1;
                println!("OK    {} ({} samples, {})", spec, n_samples, formula);
            }
            Err(e) => println!("FAIL  {} [{}] {}", spec, e.kind(), e),
        }
    }
    println!("{} of {} comparisons can be run", n_ok, specs.len());
    Ok(())
}
