//! Command-line interface for deseq2_batch

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "deseq2_batch")]
#[command(version)]
#[command(about = "Batch differential abundance comparisons with a DESeq2-style model")]
#[command(disable_help_flag = true)]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every comparison of a comparison table
    #[command(
        about = "Run every comparison of a comparison table",
        long_about = "Run every comparison of a comparison table\n\n\
            Loads counts and sample metadata, filters low-count features once, then for\n\
            each row of the comparison table selects the hold-constant samples, fits\n\
            the donor-blocked model for the varying factor and tests level A against\n\
            level B. A failing comparison is reported and the batch continues.",
        after_long_help = "\
Examples:
  # Run all comparisons, writing tables, volcano plots and reports to results/
  deseq2_batch run -c counts.csv -m metadata.csv -s comparisons.csv -o results

  # Attach gene symbols and run comparisons on 8 threads
  deseq2_batch run -c counts.csv -m metadata.csv -s comparisons.csv -o results \\
    --names genes.tsv --name-id-column gene_id --name-column symbol --parallel -t 8

  # Comparison table with two title lines above the header
  deseq2_batch run -c counts.csv -m metadata.csv -s comparisons.csv --skip-rows 2"
    )]
    Run {
        /// Path to count matrix CSV/TSV file
        #[arg(short, long,
            long_help = "Path to count matrix file.\n\
                Format: first column = feature IDs, remaining columns = raw counts per sample.\n\
                Supports both CSV (comma) and TSV (tab) delimiters (auto-detected).")]
        counts: String,

        /// Path to sample metadata CSV/TSV file
        #[arg(short, long,
            long_help = "Path to sample metadata file.\n\
                Format: first column = sample IDs (matching count matrix columns),\n\
                remaining columns = factors such as donor, dendrimer, tlr.")]
        metadata: String,

        /// Path to the comparison table
        #[arg(short, long,
            long_help = "Path to the comparison table.\n\
                Required columns: id, holdConstantFactor, holdConstantValue,\n\
                varyingFactor, levelA, levelB. Blank rows are ignored.")]
        specs: String,

        /// Output directory; per-comparison files go under <output>/comparisons [default: results]
        #[arg(short, long, default_value = "results")]
        output: String,

        /// Feature id -> name table
        #[arg(long, value_name = "FILE")]
        names: Option<String>,

        /// Id column of the name table [default: featureId]
        #[arg(long, default_value = "featureId")]
        name_id_column: String,

        /// Name column of the name table [default: name]
        #[arg(long, default_value = "name")]
        name_column: String,

        /// Leading lines of the comparison table to skip [default: 0]
        #[arg(long, default_value = "0")]
        skip_rows: usize,

        /// Blocking factor added to every model; empty to disable [default: donor]
        #[arg(long, default_value = "donor")]
        blocking: String,

        /// Minimum count for the low-count filter [default: 10]
        #[arg(long, default_value = "10")]
        min_count: f64,

        /// Samples that must reach --min-count [default: 3]
        #[arg(long, default_value = "3")]
        min_samples: usize,

        /// Adjusted p-value cutoff for plots and overlap sets [default: 0.05]
        #[arg(short, long, default_value = "0.05")]
        alpha: f64,

        /// Absolute log2 fold change cutoff for plots and overlap sets [default: 1.0]
        #[arg(long, default_value = "1.0")]
        lfc: f64,

        /// Rows per comparison in the console summary [default: 10]
        #[arg(long, default_value = "10")]
        top: usize,

        /// Run comparisons in parallel
        #[arg(long)]
        parallel: bool,

        /// Number of threads (0 = auto) [default: 0]
        #[arg(short = 't', long, default_value = "0")]
        threads: usize,

        /// Disable independent filtering (just apply BH to all features)
        #[arg(long)]
        no_independent_filtering: bool,

        /// Skip the volcano plots
        #[arg(long)]
        no_plots: bool,
    },

    /// Validate inputs and print the planned comparisons
    #[command(
        long_about = "Validate inputs and print the planned comparisons without fitting.\n\n\
            Reports for every comparison the subset size and whether the varying\n\
            factor and both levels are usable.",
        after_long_help = "\
Examples:
  deseq2_batch check -c counts.csv -m metadata.csv -s comparisons.csv"
    )]
    Check {
        /// Path to count matrix CSV/TSV file
        #[arg(short, long)]
        counts: String,

        /// Path to sample metadata CSV/TSV file
        #[arg(short, long)]
        metadata: String,

        /// Path to the comparison table
        #[arg(short, long)]
        specs: String,

        /// Leading lines of the comparison table to skip [default: 0]
        #[arg(long, default_value = "0")]
        skip_rows: usize,

        /// Blocking factor added to every model [default: donor]
        #[arg(long, default_value = "donor")]
        blocking: String,

        /// Minimum count for the low-count filter [default: 10]
        #[arg(long, default_value = "10")]
        min_count: f64,

        /// Samples that must reach --min-count [default: 3]
        #[arg(long, default_value = "3")]
        min_samples: usize,
    },
}
