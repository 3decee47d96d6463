use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use console::style;

use textdir::config::{Config, CONFIG_FILE};
use textdir::renderdoc::{self, Status};
use textdir::Diagnostic;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a single file and print the document as JSON
    Convert {
        file: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print the JSON on one line
        #[arg(long)]
        compact: bool,
    },
    /// Convert every document in a directory into a JSON map keyed by relative path
    Build {
        dir: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_config(explicit: Option<PathBuf>, dir: &Path) -> anyhow::Result<Config> {
    match explicit {
        Some(path) => Config::load(path),
        None => Config::load_from_dir(dir),
    }
}

fn print_warning(path: &Path, warning: &Diagnostic) {
    eprintln!(
        "{} {}: {}",
        style("warning:").yellow().bold(),
        path.display(),
        warning
    );
}

fn print_err(e: &anyhow::Error) {
    eprintln!("{} {}", style("Error:").red().bold(), e);
    e.chain()
        .skip(1)
        .for_each(|cause| eprintln!(" {} {}", style("caused by:").bold(), cause));
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Convert {
            file,
            config,
            compact,
        } => {
            let dir = file.parent().unwrap_or_else(|| Path::new("."));
            let config = load_config(config, dir)?;

            let conversion = renderdoc::convert_file(&file, &config)
                .with_context(|| format!("Could not convert {}", file.display()))?;
            for warning in &conversion.warnings {
                print_warning(&file, warning);
            }

            let json = if compact {
                serde_json::to_string(&conversion.document)?
            } else {
                serde_json::to_string_pretty(&conversion.document)?
            };
            println!("{}", json);
            Ok(())
        }
        Commands::Build {
            dir,
            config,
            output,
        } => {
            if !dir.is_dir() {
                return Err(anyhow!("{} is not a directory", dir.display()));
            }
            let config = load_config(config, &dir)
                .with_context(|| format!("Error loading {}", CONFIG_FILE))?;

            eprintln!("{}", style("=".repeat(60)).blue());
            eprintln!("{} {}", style("Building").bold(), dir.display());
            eprintln!("{}", style("-".repeat(60)).blue());

            let rendered = renderdoc::render_dir_with(&dir, &config, |path, format, status| {
                let rel = path.strip_prefix(&dir).unwrap_or(path);
                let status = match status {
                    Status::Done => style("done").green(),
                    Status::Draft => style("draft").yellow(),
                };
                eprintln!("{:<40} {:<18} {}", rel.display(), style(format).bold(), status);
            })
            .map_err(|e| {
                eprintln!("{}", style("error").red());
                e
            })
            .context("Build error:")?;

            for (path, warning) in &rendered.warnings {
                print_warning(path, warning);
            }

            let json = serde_json::to_string_pretty(&rendered.documents)?;
            match output {
                Some(path) => fs::write(&path, json)
                    .with_context(|| format!("Could not write {}", path.display()))?,
                None => println!("{}", json),
            }

            eprintln!("{}", style("-".repeat(60)).blue());
            eprintln!(
                "{} {} documents",
                style("Success").green().bold(),
                rendered.documents.len()
            );
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        print_err(&e);
        std::process::exit(1);
    }
}
