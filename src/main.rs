use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use mdtoc::config::{self, HookConfig};
use mdtoc::dir_toc::{dir_toc, DirTocOptions, IgnorePatterns};
use mdtoc::git_utils::{HistoryResolver, RepoCache};
use mdtoc::hook::TocHook;

#[derive(Debug)]
enum CliCommand {
    Process {
        page: PathBuf,
        docs_dir: Option<PathBuf>,
    },
    Build {
        input_path: PathBuf,
        output_dir: PathBuf,
    },
    List(DirTocOptions),
}

fn main() -> Result<()> {
    let raw_args: Vec<String> = env::args().skip(1).collect();

    let (config_path, command) = match parse_args(&raw_args) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("{err}");
            print_usage();
            std::process::exit(1);
        }
    };

    print_banner();

    let config = config::load_config(config_path.as_deref());
    if let Err(err) = run_command(command, &config) {
        eprintln!("{err}");
        std::process::exit(1);
    }

    Ok(())
}

fn run_command(command: CliCommand, config: &HookConfig) -> Result<()> {
    match command {
        CliCommand::Process { page, docs_dir } => run_process(page, docs_dir, config),
        CliCommand::Build {
            input_path,
            output_dir,
        } => run_build(input_path, output_dir, config),
        CliCommand::List(options) => run_list(&options, config),
    }
}

/// Render a directory listing TOC to stdout, Markdown syntax.
fn run_list(options: &DirTocOptions, config: &HookConfig) -> Result<()> {
    let ignore = IgnorePatterns::load(&config.docs_dir);
    println!("{}", dir_toc(&config.docs_dir, options, &ignore));
    Ok(())
}

fn print_banner() {
    eprintln!("mdtoc v{}", env!("CARGO_PKG_VERSION"));
}

fn build_hook(config: &HookConfig) -> TocHook {
    let resolver = HistoryResolver::new(RepoCache::new(), config.ignored_commits());
    TocHook::new(config.is_enabled(), config.template(), resolver)
}

/// Run one page through the hook and write the result to stdout.
fn run_process(page: PathBuf, docs_dir: Option<PathBuf>, config: &HookConfig) -> Result<()> {
    let markdown = fs::read_to_string(&page)
        .with_context(|| format!("failed to read page {}", page.display()))?;

    // Outline links are relative to the page unless a docs dir is given.
    let base_dir = docs_dir
        .or_else(|| page.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));

    let mut hook = build_hook(config);
    print!("{}", hook.on_page_markdown(&markdown, &base_dir));
    Ok(())
}

/// Copy the docs tree into the output dir, expanding every Markdown page.
fn run_build(input_path: PathBuf, output_dir: PathBuf, config: &HookConfig) -> Result<()> {
    if !input_path.is_dir() {
        bail!("Docs source is not a directory: {}", input_path.display());
    }

    let mut hook = build_hook(config);
    fs::create_dir_all(&output_dir).with_context(|| {
        format!("failed to create output directory {}", output_dir.display())
    })?;
    build_tree(&input_path, &output_dir, &mut hook)
}

fn build_tree(source: &Path, target: &Path, hook: &mut TocHook) -> Result<()> {
    for entry in fs::read_dir(source)
        .with_context(|| format!("failed to read directory {}", source.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        let dest = target.join(entry.file_name());

        if path.is_dir() {
            fs::create_dir_all(&dest)
                .with_context(|| format!("failed to create directory {}", dest.display()))?;
            build_tree(&path, &dest, hook)?;
        } else if path.extension().map(|ext| ext == "md").unwrap_or(false) {
            let markdown = fs::read_to_string(&path)
                .with_context(|| format!("failed to read page {}", path.display()))?;
            let base_dir = path.parent().unwrap_or(source);
            fs::write(&dest, hook.on_page_markdown(&markdown, base_dir))
                .with_context(|| format!("failed to write page {}", dest.display()))?;
        } else {
            fs::copy(&path, &dest)
                .with_context(|| format!("failed to copy {}", path.display()))?;
        }
    }
    Ok(())
}

fn parse_args(args: &[String]) -> Result<(Option<PathBuf>, CliCommand)> {
    let mut iter = args.iter().peekable();
    let mut config_path: Option<PathBuf> = None;

    while let Some(flag) = iter.peek() {
        match flag.as_str() {
            "-c" | "--config" => {
                iter.next();
                let Some(path) = iter.next() else {
                    bail!("Missing value for --config");
                };
                config_path = Some(PathBuf::from(path));
            }
            _ => break,
        }
    }

    let remaining: Vec<String> = iter.cloned().collect();
    let command = parse_command(&remaining)?;
    Ok((config_path, command))
}

fn parse_command(args: &[String]) -> Result<CliCommand> {
    let mut args = args.iter();
    let Some(command) = args.next() else {
        bail!("Missing command");
    };

    match command.as_str() {
        "process" => {
            let mut page = None;
            let mut docs_dir = None;

            let mut args = args.cloned();
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "-d" | "--docs" => {
                        let path = args
                            .next()
                            .ok_or_else(|| anyhow::anyhow!("Missing value for --docs"))?;
                        docs_dir = Some(PathBuf::from(path));
                    }
                    _ if page.is_none() => {
                        page = Some(arg);
                    }
                    _ => bail!("Unexpected argument for process: {arg}"),
                }
            }

            let page = page
                .ok_or_else(|| anyhow::anyhow!("Missing page for process"))
                .and_then(validate_path)?;
            Ok(CliCommand::Process { page, docs_dir })
        }
        "build" => {
            let mut input_path = None;
            let mut output_dir = None;

            let mut args = args.cloned();
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "-o" | "--output" => {
                        let path = args
                            .next()
                            .ok_or_else(|| anyhow::anyhow!("Missing value for --output"))?;
                        output_dir = Some(PathBuf::from(path));
                    }
                    _ if input_path.is_none() => {
                        input_path = Some(arg);
                    }
                    _ => bail!("Unexpected argument for build: {arg}"),
                }
            }

            let input = input_path
                .ok_or_else(|| anyhow::anyhow!("Missing path for build"))
                .and_then(validate_path)?;
            let output = output_dir.unwrap_or_else(|| PathBuf::from("output"));
            Ok(CliCommand::Build {
                input_path: input,
                output_dir: output,
            })
        }
        "list" => {
            let mut options = DirTocOptions::default();
            let mut path = None;

            let mut args = args.cloned();
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--depth" => {
                        let value = args
                            .next()
                            .ok_or_else(|| anyhow::anyhow!("Missing value for --depth"))?;
                        options.depth = match value.as_str() {
                            "1" => 1,
                            "2" => 2,
                            other => bail!("Unsupported depth: {other}"),
                        };
                    }
                    "--numbered" => options.numbered = true,
                    "--no-group" => options.group_by_dir = false,
                    _ if path.is_none() => {
                        path = Some(arg);
                    }
                    _ => bail!("Unexpected argument for list: {arg}"),
                }
            }

            if let Some(path) = path {
                options.path = path;
            }
            Ok(CliCommand::List(options))
        }
        _ => bail!("Unknown command: {command}"),
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  mdtoc [-c <config-file>] process <page.md> [-d <docs-dir>]");
    eprintln!("  mdtoc [-c <config-file>] build <docs-dir> [-o <output-dir>]");
    eprintln!("  mdtoc [-c <config-file>] list [<path>] [--depth 1|2] [--numbered] [--no-group]");
}

fn validate_path(path: String) -> Result<PathBuf> {
    let input_path = PathBuf::from(path);
    if !input_path.exists() {
        bail!("Path not found: {}", input_path.display());
    }
    Ok(input_path)
}
