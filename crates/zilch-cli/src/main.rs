mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_BUILD_ERROR, EXIT_FAILURE, EXIT_MANIFEST_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;
use zilch_core::{install_signal_handler, Project};

#[derive(Debug, Parser)]
#[command(
    name = "zilch",
    version,
    about = "Declarative package manager for reproducible development environments"
)]
struct Cli {
    /// Path to zilch.toml or a directory containing it. Defaults to
    /// $ZILCH_PATH, then ./zilch.toml, then the user-global manifest.
    #[arg(long, global = true)]
    path: Option<PathBuf>,

    /// Source alias to scope the command to.
    #[arg(long, global = true)]
    source: Option<String>,

    /// Builder backend ("nix", or "mock" for testing). Defaults to
    /// $ZILCH_BACKEND, then "nix".
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Install packages and rebuild the environment.
    Install {
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Uninstall packages and rebuild the environment.
    Remove {
        /// Only remove packages whose source matches --source, instead of
        /// the first package of that name from any source.
        #[arg(long, default_value_t = false)]
        match_source: bool,
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Search sources for packages.
    Search {
        #[arg(required = true)]
        terms: Vec<String>,
    },
    /// Show details of an installed package.
    Info { name: String },
    /// List installed packages.
    List,
    /// Manage package sources.
    Source {
        #[command(subcommand)]
        command: SourceCommands,
    },
    /// Rebuild the environment from the manifest.
    Sync,
    /// Start a shell (or run a command) inside the environment.
    Shell {
        /// Command to run instead of an interactive shell (after --).
        #[arg(last = true)]
        command: Vec<String>,
    },
    /// Rebuild, then garbage-collect unreferenced store paths.
    Autoremove,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
enum SourceCommands {
    /// Register a source; without --rev its current revision is resolved
    /// and pinned.
    Add {
        url: String,
        alias: String,
        #[arg(long)]
        rev: Option<String>,
    },
    /// Unregister a source.
    Remove { alias: String },
    /// List registered sources.
    List,
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("ZILCH_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    install_signal_handler();

    if let Commands::Completions { shell } = &cli.command {
        return match commands::completions::run::<Cli>(*shell) {
            Ok(code) => ExitCode::from(code),
            Err(msg) => {
                eprintln!("error: {msg}");
                ExitCode::from(EXIT_FAILURE)
            }
        };
    }

    let backend_name = cli
        .backend
        .clone()
        .or_else(|| std::env::var("ZILCH_BACKEND").ok())
        .unwrap_or_else(|| "nix".to_owned());
    let backend = match zilch_runtime::select_backend(&backend_name) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let mut project = match Project::load(cli.path.as_deref(), backend.as_ref()) {
        Ok(project) => project,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(classify(&e.to_string()));
        }
    };
    tracing::debug!("using manifest {}", project.manifest_path().display());

    let json_output = cli.json;
    let source_scope = cli.source.as_deref();
    let result = match cli.command {
        Commands::Install { packages } => commands::install::run(
            &mut project,
            backend.as_ref(),
            &packages,
            source_scope,
            json_output,
        ),
        Commands::Remove {
            match_source,
            packages,
        } => commands::remove::run(
            &mut project,
            backend.as_ref(),
            &packages,
            source_scope,
            match_source,
            json_output,
        ),
        Commands::Search { terms } => {
            commands::search::run(&project, backend.as_ref(), &terms, source_scope, json_output)
        }
        Commands::Info { name } => commands::info::run(&project, &name, source_scope, json_output),
        Commands::List => commands::list::run(&project, json_output),
        Commands::Source { command } => match command {
            SourceCommands::Add { url, alias, rev } => commands::source::add(
                &mut project,
                backend.as_ref(),
                &url,
                &alias,
                rev.as_deref(),
                json_output,
            ),
            SourceCommands::Remove { alias } => {
                commands::source::remove(&mut project, &alias, json_output)
            }
            SourceCommands::List => commands::source::list(&project, json_output),
        },
        Commands::Sync => commands::sync::run(&project, backend.as_ref(), json_output),
        Commands::Shell { command } => commands::shell::run(&project, backend.as_ref(), &command),
        Commands::Autoremove => commands::autoremove::run(&project, backend.as_ref()),
        Commands::Completions { .. } => unreachable!("handled before project load"),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(classify(&msg))
        }
    }
}

fn classify(msg: &str) -> u8 {
    if msg.starts_with("manifest error:") || msg.starts_with("failed to parse manifest") {
        EXIT_MANIFEST_ERROR
    } else if msg.starts_with("build failed:") || msg.starts_with("failed to lock revisions:") {
        EXIT_BUILD_ERROR
    } else {
        EXIT_FAILURE
    }
}
