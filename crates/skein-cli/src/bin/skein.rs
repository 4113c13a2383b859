/// skein interpreter CLI

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use skein_cli::{load_metadata, load_script, RunOptions, Runner};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "skein")]
#[command(about = "skein interpreter - runs scripts saved as JSON syntax trees")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a script
    Run {
        /// Script file (JSON array of nodes)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Run to completion without suspending; async-only natives fail
        #[arg(long)]
        sync: bool,

        /// Stop with an error after this many evaluation steps (0 = no limit)
        #[arg(long, value_name = "N")]
        max_step: Option<u64>,

        /// Yield to the runtime every RATE steps (0 = never)
        #[arg(long, value_name = "RATE")]
        irq_rate: Option<f64>,

        /// Milliseconds to sleep when yielding
        #[arg(long, value_name = "MS")]
        irq_sleep: Option<f64>,

        /// Abort the script on its first error
        #[arg(long)]
        abort_on_error: bool,

        /// JSON object of constants to define before running
        #[arg(long, value_name = "FILE")]
        consts: Option<PathBuf>,

        /// Print the syntax tree and exit
        #[arg(long)]
        dump_ast: bool,

        /// Print the value of the last statement
        #[arg(long)]
        print_result: bool,
    },

    /// Print a script's metadata blocks as JSON
    Meta {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Run {
            input,
            sync,
            max_step,
            irq_rate,
            irq_sleep,
            abort_on_error,
            consts,
            dump_ast,
            print_result,
        } => {
            if dump_ast {
                let script = load_script(&input)?;
                print!("{}", skein_ast::ast_dump::dump_nodes(&script));
                return Ok(());
            }

            let options = RunOptions::new(&input)
                .sync(sync)
                .max_step(max_step)
                .irq_rate(irq_rate)
                .irq_sleep(irq_sleep)
                .abort_on_error(abort_on_error)
                .consts(consts);
            let output = Runner::new(options)
                .run(|value| println!("{}", value))
                .await
                .with_context(|| format!("failed to run {}", input.display()))?;

            tracing::debug!(steps = output.steps, "script finished");
            if print_result {
                if let Some(value) = output.value {
                    println!("{}", value.repr_literal());
                }
            }
        }
        Command::Meta { input } => {
            let meta = load_metadata(&input)?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
        }
    }
    Ok(())
}
