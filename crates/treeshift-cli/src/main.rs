use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use treeshift_core::{Config, MismatchPolicy, MissingPolicy};
use treeshift_store::MemoryStore;

mod commands;
mod logging;
mod prompt;
mod server;

const DEFAULT_PORT: u16 = 3001;

fn input_arg() -> Arg {
    Arg::new("input")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Source JSON document")
}

fn sampler_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("limit")
            .long("limit")
            .value_parser(value_parser!(usize))
            .help("Keys sampled per object [default: 3]"),
    )
    .arg(
        Arg::new("max-depth")
            .long("max-depth")
            .value_parser(value_parser!(usize))
            .help("Sampling depth before the max depth marker [default: 10]"),
    )
}

fn cli() -> Command {
    Command::new("treeshift")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Discover the structure of a key-value tree and migrate it into a document store")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML file with [sampler] and [migration] settings"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(sampler_args(
            Command::new("structure")
                .about("Print the sampled structure of a JSON document")
                .arg(input_arg()),
        ))
        .subcommand(sampler_args(
            Command::new("classify")
                .about("Classify sampled paths interactively and save the decisions")
                .arg(input_arg())
                .arg(
                    Arg::new("out")
                        .long("out")
                        .default_value("decisions.json")
                        .value_parser(value_parser!(PathBuf))
                        .help("Where to write the decision map"),
                ),
        ))
        .subcommand(sampler_args(
            Command::new("migrate")
                .about("Migrate a JSON document into the target store")
                .arg(input_arg())
                .arg(
                    Arg::new("decisions")
                        .long("decisions")
                        .value_parser(value_parser!(PathBuf))
                        .help("Decision map (JSON or YAML); prompts when omitted"),
                )
                .arg(
                    Arg::new("target")
                        .long("target")
                        .default_value("store.json")
                        .value_parser(value_parser!(PathBuf))
                        .help("Target store file, created if missing"),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Print the writes instead of applying them"),
                )
                .arg(
                    Arg::new("concurrency")
                        .long("concurrency")
                        .value_parser(value_parser!(usize))
                        .help("Sibling writes in flight per level [default: 1]"),
                )
                .arg(
                    Arg::new("on-missing")
                        .long("on-missing")
                        .value_parser(["skip", "fail"])
                        .help("Paths without a classification [default: skip]"),
                )
                .arg(
                    Arg::new("on-mismatch")
                        .long("on-mismatch")
                        .value_parser(["abort", "skip"])
                        .help("Classifications that do not fit the value [default: abort]"),
                ),
        ))
        .subcommand(
            Command::new("serve")
                .about("Run the HTTP upload/migrate API")
                .arg(
                    Arg::new("port")
                        .long("port")
                        .value_parser(value_parser!(u16))
                        .help("Listen port [default: $PORT or 3001]"),
                )
                .arg(
                    Arg::new("target")
                        .long("target")
                        .value_parser(value_parser!(PathBuf))
                        .help("Persist the store to this file after each migration"),
                ),
        )
}

/// Config file plus command line overrides
fn settings(matches: &ArgMatches, args: &ArgMatches) -> Result<Config> {
    let mut config = commands::load_config(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;

    let has = |id: &str| args.try_contains_id(id).unwrap_or(false);
    if has("limit") {
        if let Some(limit) = args.get_one::<usize>("limit") {
            config.sampler = config.sampler.with_limit(*limit);
        }
    }
    if has("max-depth") {
        if let Some(depth) = args.get_one::<usize>("max-depth") {
            config.sampler = config.sampler.with_max_depth(*depth);
        }
    }
    if has("concurrency") {
        if let Some(n) = args.get_one::<usize>("concurrency") {
            config.migration = config.migration.with_concurrency(*n);
        }
    }
    if has("on-missing") {
        match args.get_one::<String>("on-missing").map(String::as_str) {
            Some("fail") => config.migration = config.migration.with_missing_policy(MissingPolicy::Fail),
            Some(_) => config.migration = config.migration.with_missing_policy(MissingPolicy::Skip),
            None => {}
        }
    }
    if has("on-mismatch") {
        match args.get_one::<String>("on-mismatch").map(String::as_str) {
            Some("skip") => config.migration = config.migration.with_mismatch_policy(MismatchPolicy::Skip),
            Some(_) => config.migration = config.migration.with_mismatch_policy(MismatchPolicy::Abort),
            None => {}
        }
    }

    config.validate().context("invalid settings")?;
    Ok(config)
}

fn path_arg<'a>(args: &'a ArgMatches, id: &str) -> Result<&'a Path> {
    args.get_one::<PathBuf>(id)
        .map(PathBuf::as_path)
        .with_context(|| format!("missing <{id}>"))
}

fn port(args: &ArgMatches) -> Result<u16> {
    if let Some(port) = args.get_one::<u16>("port") {
        return Ok(*port);
    }
    match std::env::var("PORT") {
        Ok(value) => value
            .parse()
            .with_context(|| format!("PORT is not a valid port: {value}")),
        Err(_) => Ok(DEFAULT_PORT),
    }
}

async fn dispatch(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("structure", args)) => {
            let config = settings(matches, args)?;
            commands::structure(path_arg(args, "input")?, config.sampler).await
        }
        Some(("classify", args)) => {
            let config = settings(matches, args)?;
            commands::classify(path_arg(args, "input")?, path_arg(args, "out")?, config.sampler)
                .await
        }
        Some(("migrate", args)) => {
            let config = settings(matches, args)?;
            commands::migrate(commands::MigrateArgs {
                input: path_arg(args, "input")?.to_path_buf(),
                decisions: args.get_one::<PathBuf>("decisions").cloned(),
                target: path_arg(args, "target")?.to_path_buf(),
                dry_run: args.get_flag("dry-run"),
                sampler: config.sampler,
                migration: config.migration,
            })
            .await
        }
        Some(("serve", args)) => {
            let config = settings(matches, args)?;
            let target = args.get_one::<PathBuf>("target").cloned();
            let store = match &target {
                Some(path) => MemoryStore::load_or_default(path)
                    .await
                    .with_context(|| format!("loading target {}", path.display()))?,
                None => MemoryStore::new(),
            };
            server::serve(port(args)?, server::AppState::new(store, target, config)).await
        }
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    logging::init(matches.get_flag("log-json"));

    if let Err(e) = dispatch(&matches).await {
        tracing::error!(error = %format!("{e:#}"), "command failed");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let matches = cli()
            .try_get_matches_from([
                "treeshift",
                "migrate",
                "data.json",
                "--decisions",
                "d.json",
                "--limit",
                "5",
                "--concurrency",
                "4",
                "--on-missing",
                "fail",
            ])
            .unwrap();
        let Some(("migrate", args)) = matches.subcommand() else {
            panic!("expected migrate");
        };
        let config = settings(&matches, args).unwrap();
        assert_eq!(config.sampler.limit, 5);
        assert_eq!(config.migration.concurrency, 4);
        assert_eq!(config.migration.on_missing, MissingPolicy::Fail);
        assert_eq!(config.migration.on_mismatch, MismatchPolicy::Abort);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let matches = cli()
            .try_get_matches_from(["treeshift", "structure", "data.json", "--limit", "0"])
            .unwrap();
        let Some((_, args)) = matches.subcommand() else {
            panic!("expected subcommand");
        };
        assert!(settings(&matches, args).is_err());
    }

    #[test]
    fn explicit_port_wins() {
        let matches = cli()
            .try_get_matches_from(["treeshift", "serve", "--port", "8080"])
            .unwrap();
        let Some((_, args)) = matches.subcommand() else {
            panic!("expected subcommand");
        };
        assert_eq!(port(args).unwrap(), 8080);
    }
}
