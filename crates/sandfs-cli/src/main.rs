//! sandfs CLI entry point.
//!
//! Usage:
//!   sandfs [--root DIR] [--config FILE] <command> [args...]
//!
//! Every path is virtual: `/` is the sandbox root, and nothing can escape it.

use std::env;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use sandfs_kernel::{
    FileData, FsConfig, LocalStorage, MkdirOptions, ReadOptions, RmdirOptions, SandFs,
    UnlinkOptions, WriteOptions,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> ExitCode {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

/// Global options, parsed ahead of the command name.
#[derive(Debug, Default)]
struct Options {
    root: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn run() -> Result<ExitCode> {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut opts = Options::default();
    let mut rest = args.as_slice();

    // Parse global options
    while let Some(arg) = rest.first() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(ExitCode::SUCCESS);
            }
            "--version" | "-V" => {
                println!("sandfs {}", env!("CARGO_PKG_VERSION"));
                return Ok(ExitCode::SUCCESS);
            }
            "--root" => {
                let dir = rest.get(1).context("--root requires a directory")?;
                opts.root = Some(PathBuf::from(dir));
                rest = &rest[2..];
            }
            "--config" => {
                let file = rest.get(1).context("--config requires a file")?;
                opts.config = Some(PathBuf::from(file));
                rest = &rest[2..];
            }
            a if a.starts_with("--root=") => {
                opts.root = Some(PathBuf::from(&a["--root=".len()..]));
                rest = &rest[1..];
            }
            a if a.starts_with("--config=") => {
                opts.config = Some(PathBuf::from(&a["--config=".len()..]));
                rest = &rest[1..];
            }
            _ => break,
        }
    }

    let Some((command, args)) = rest.split_first() else {
        print_help();
        return Ok(ExitCode::FAILURE);
    };

    let fs = open(&opts)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        fs.init(false).await;
        dispatch(&fs, command, args).await
    })
}

fn print_help() {
    println!(
        r#"sandfs v{}

Usage:
  sandfs [OPTIONS] <command> [args...]

Options:
  --root <dir>                 Local directory to sandbox (default: current directory)
  --config <file>              Config file (default: ~/.config/sandfs/config.toml)
  -h, --help                   Show this help
  -V, --version                Show version

Commands:
  ls [path]                    List a directory
  cat <path>                   Print a file
  write <path> [text]          Write text (or stdin) to a file, creating parents
  append <path> [text]         Append text (or stdin) to a file
  mkdir [-p] <path>            Create a directory
  rmdir [-r] <path>            Remove a directory
  rm [-r] <path>               Remove a file (or, with -r, anything)
  mv <from> <to>               Rename
  cp <from> <to>               Copy
  stat <path>                  Print stat as JSON
  du <path>                    Total size in bytes
  ln <target> <path>           Create a link marker at <target> pointing to <path>
  readlink <path>              Print a link marker's destination
  clear                        Remove everything below the root

Examples:
  sandfs --root ./data mkdir -p /logs/2024
  echo hello | sandfs write /notes.txt
  sandfs stat /notes.txt
"#,
        env!("CARGO_PKG_VERSION")
    );
}

/// Build the facade over a local directory.
fn open(opts: &Options) -> Result<SandFs> {
    let config = match &opts.config {
        Some(path) => FsConfig::load_from(path)?,
        None => FsConfig::load()?,
    };
    let root = match &opts.root {
        Some(dir) => dir.clone(),
        None => env::current_dir().context("Failed to determine current directory")?,
    };
    std::fs::create_dir_all(&root)
        .with_context(|| format!("Failed to create root {}", root.display()))?;
    tracing::debug!(root = %root.display(), ?config, "opening sandbox");

    let fs = SandFs::new(Arc::new(LocalStorage::new(root)), config).with_warning_sink(|w| {
        eprintln!("warning: {} {}: {}", w.operation, w.path, w.error);
    });
    Ok(fs)
}

/// Split a leading flag off the argument list.
fn flag<'a>(args: &'a [String], names: &[&str]) -> (bool, &'a [String]) {
    match args.first() {
        Some(first) if names.contains(&first.as_str()) => (true, &args[1..]),
        _ => (false, args),
    }
}

fn one<'a>(command: &str, args: &'a [String]) -> Result<&'a str> {
    match args {
        [path] => Ok(path.as_str()),
        _ => bail!("usage: sandfs {command} <path>"),
    }
}

fn two<'a>(command: &str, args: &'a [String]) -> Result<(&'a str, &'a str)> {
    match args {
        [a, b] => Ok((a.as_str(), b.as_str())),
        _ => bail!("usage: sandfs {command} <from> <to>"),
    }
}

/// Payload from the command line, or stdin when omitted.
fn payload(command: &str, args: &[String]) -> Result<(String, FileData)> {
    match args {
        [path, text] => Ok((path.clone(), FileData::from(text.as_str()))),
        [path] => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read stdin")?;
            Ok((path.clone(), FileData::from(buf)))
        }
        _ => bail!("usage: sandfs {command} <path> [text]"),
    }
}

async fn dispatch(fs: &SandFs, command: &str, args: &[String]) -> Result<ExitCode> {
    match command {
        "ls" => {
            let path = args.first().map(String::as_str).unwrap_or("/");
            let mut names = fs.readdir(path).await?;
            names.sort();
            for name in names {
                println!("{name}");
            }
        }

        "cat" => {
            let data = fs.read_file(one(command, args)?, ReadOptions::default()).await?;
            std::io::stdout()
                .write_all(data.as_bytes())
                .context("Failed to write stdout")?;
        }

        "write" => {
            let (path, data) = payload(command, args)?;
            fs.write_file(&path, data, WriteOptions::recursive()).await?;
        }

        "append" => {
            let (path, data) = payload(command, args)?;
            fs.append_file(&path, data, WriteOptions::default()).await?;
        }

        "mkdir" => {
            let (recursive, args) = flag(args, &["-p", "--parents"]);
            let opts = MkdirOptions { recursive };
            fs.mkdir(one(command, args)?, opts).await?;
        }

        "rmdir" => {
            let (recursive, args) = flag(args, &["-r", "--recursive"]);
            let opts = RmdirOptions { recursive };
            fs.rmdir(one(command, args)?, opts).await?;
        }

        "rm" => {
            let (remove_all, args) = flag(args, &["-r", "-rf", "--recursive"]);
            let opts = UnlinkOptions { remove_all };
            fs.unlink(one(command, args)?, opts).await?;
        }

        "mv" => {
            let (from, to) = two(command, args)?;
            fs.rename(from, to).await?;
        }

        "cp" => {
            let (from, to) = two(command, args)?;
            fs.copy(from, to).await?;
        }

        "stat" => {
            let stat = fs.stat(one(command, args)?).await?;
            println!("{}", serde_json::to_string_pretty(&stat)?);
        }

        "du" => {
            println!("{}", fs.du(one(command, args)?).await?);
        }

        "ln" => {
            let (target, path) = two(command, args)?;
            fs.symlink(target, path).await?;
        }

        "readlink" => {
            println!("{}", fs.readlink(one(command, args)?).await?);
        }

        "clear" => fs.clear().await,

        unknown => {
            eprintln!("Unknown command: {unknown}");
            eprintln!("Run 'sandfs --help' for usage.");
            return Ok(ExitCode::FAILURE);
        }
    }
    Ok(ExitCode::SUCCESS)
}
