mod common;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::debug;
use owo_colors::OwoColorize;

use mica_asm::ClassUnit;
use mica_codegen::{compile_program, CodegenConfig};
use mica_syntax::program::Program;
use mica_vm::Vm;

#[derive(Parser, Debug)]
#[command(name = "mica", about = "Generate and run mica stack assembly")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate assembly from an attributed program tree (JSON)
    Build {
        tree: PathBuf,

        /// Directory the unit is written to
        #[arg(short = 'o', long = "out-dir", default_value = ".")]
        out_dir: PathBuf,

        /// Unit name (defaults to the tree's name, then the file stem)
        #[arg(long = "class")]
        class: Option<String>,

        #[arg(long = "max-stack", default_value_t = 1000)]
        max_stack: u32,

        #[arg(long = "max-locals", default_value_t = 1000)]
        max_locals: u32,

        /// Execute the generated unit afterwards
        #[arg(long = "run", default_value_t = false)]
        run: bool,

        #[arg(long = "step-limit")]
        step_limit: Option<u64>,
    },
    /// Execute an assembly file
    Run {
        file: PathBuf,

        /// Stop after this many instructions
        #[arg(long = "step-limit")]
        step_limit: Option<u64>,
    },
}

fn build(tree: &Path, out_dir: &Path, class: Option<String>, config: CodegenConfig) -> Result<(PathBuf, String)> {
    let json = fs::read_to_string(tree).with_context(|| format!("Failed to read {}", tree.display()))?;
    let mut program: Program =
        serde_json::from_str(&json).with_context(|| format!("invalid program tree in {}", tree.display()))?;
    if let Some(class) = class {
        program.name = class;
    } else if program.name.is_empty() {
        program.name = tree.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    }
    debug!("building unit '{}' from {}", program.name, tree.display());

    let gen = compile_program(&program, config);
    fs::create_dir_all(out_dir).with_context(|| format!("Failed to create {}", out_dir.display()))?;
    let path = gen.dump(out_dir).with_context(|| format!("Failed to write unit to {}", out_dir.display()))?;
    let text = gen.output().unwrap_or_default().to_string();
    Ok((path, text))
}

fn execute(source: &str, origin: &Path, step_limit: Option<u64>) -> Result<()> {
    let unit: ClassUnit = source.parse().with_context(|| format!("Failed to parse {}", origin.display()))?;
    let mut vm = Vm::new().with_step_limit(step_limit);
    vm.run(&unit).with_context(|| format!("{} failed", unit.name))?;
    debug!("{} finished after {} steps", unit.name, vm.steps());
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Build { tree, out_dir, class, max_stack, max_locals, run, step_limit } => {
            let config = CodegenConfig { max_stack, max_locals, ..CodegenConfig::default() };
            let (path, text) = match build(&tree, &out_dir, class, config) {
                Ok(built) => built,
                Err(e) => {
                    common::render_error("Build error", None, &e);
                    std::process::exit(1);
                }
            };
            eprintln!("{} {}", "wrote".green().bold(), path.display());
            if run {
                if let Err(e) = execute(&text, &path, step_limit) {
                    common::render_error("VM error", Some(&text), &e);
                    std::process::exit(1);
                }
            }
        }
        Command::Run { file, step_limit } => {
            let source = match fs::read_to_string(&file) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!(
                        "{}: {}",
                        "error".red().bold(),
                        format!("Failed to read {}: {}", file.display(), e).red()
                    );
                    std::process::exit(1);
                }
            };
            if let Err(e) = execute(&source, &file, step_limit) {
                common::render_error("VM error", Some(&source), &e);
                std::process::exit(1);
            }
        }
    }
}
