use anyhow::Result;
use doccomb::cli::output::{render_index, render_members, render_query, render_scan, QueryReport};
use doccomb::cli::{join_argument, Cli, Commands, OutputArgs};
use doccomb::config::{Config, CONFIG_FILE};
use doccomb::engine::{self, Invalidated, ScanArgs, Session};
use doccomb::parser::cfamily::CFamilyFrontEnd;
use doccomb::parser::scan_file;
use doccomb::types::Directive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .init();
}

fn canonical(path: PathBuf) -> PathBuf {
    path.canonicalize().unwrap_or(path)
}

fn open_session(root: &Path, output: &OutputArgs) -> Result<(Session, Config, Invalidated)> {
    let cfg = Config::load(output.config.as_deref(), root)?;
    let mut session = Session::open(root, cfg.clone(), Box::new(CFamilyFrontEnd));
    let invalidated = session.refresh()?;
    Ok((session, cfg, invalidated))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Scan { file, output, args } => {
            let root = canonical(std::env::current_dir()?);
            let file = canonical(file);
            let cfg = Config::load(output.config.as_deref(), &root)?;
            let args = if args.is_empty() {
                ScanArgs::new(&root, &cfg).for_path(&file).to_vec()
            } else {
                args
            };
            let content = scan_file(&CFamilyFrontEnd, &file, &args, &cfg.scan)?;
            render_scan(&file, &content, &root, output.format.unwrap_or(cfg.format))?;
        }
        Commands::Index { path, output } => {
            let root = canonical(path);
            let (session, cfg, invalidated) = open_session(&root, &output)?;
            render_index(
                session.index(),
                &invalidated,
                &root,
                output.format.unwrap_or(cfg.format),
            )?;
            session.close()?;
        }
        Commands::Query {
            directive,
            argument,
            namespace,
            module,
            document,
            project,
        } => {
            let root = canonical(project.root);
            let (mut session, cfg, _) = open_session(&root, &project.output)?;
            let bucket = Directive::parse(&directive);
            let argument = join_argument(&argument);
            let result = match &document {
                Some(document) => session.lookup_for_document(
                    document, &bucket, &argument, &namespace, &module,
                ),
                None => session.query(&bucket, &argument, &namespace, &module),
            };
            let report = QueryReport {
                requested: directive.trim(),
                directive: &bucket,
                argument: &argument,
                namespace: &namespace,
                module: &module,
                result: &result,
            };
            render_query(&report, &root, project.output.format.unwrap_or(cfg.format))?;
            session.close()?;

            if result.comment.is_none() {
                std::process::exit(1);
            }
        }
        Commands::Members {
            namespace,
            module,
            project,
        } => {
            let root = canonical(project.root);
            let (session, cfg, _) = open_session(&root, &project.output)?;
            render_members(
                &namespace,
                &module,
                session.index().members(&namespace, &module),
                &root,
                project.output.format.unwrap_or(cfg.format),
            )?;
            session.close()?;
        }
        Commands::Watch { path, config } => {
            let root = canonical(path);
            let output = OutputArgs {
                format: None,
                config,
            };
            let (mut session, _, _) = open_session(&root, &output)?;
            eprintln!(
                "Watching {} ({} files indexed)",
                root.display(),
                session.index().files().len()
            );
            engine::watch(&mut session, Duration::from_millis(250), |session, invalidated| {
                eprintln!(
                    "Re-indexed: {} documented declarations in {} files",
                    session.index().len(),
                    session.index().files().len()
                );
                for document in invalidated {
                    println!("{document}");
                }
            })?;
            session.close()?;
        }
        Commands::Init => {
            let path = std::env::current_dir()?.join(CONFIG_FILE);
            if path.exists() {
                eprintln!("{CONFIG_FILE} already exists");
                std::process::exit(1);
            }
            std::fs::write(&path, Config::default_toml())?;
            println!("Created {CONFIG_FILE}");
        }
    }

    Ok(())
}
