// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::Config;
use runtime::{ListArgs, Runtime};
use society_api::HttpGateway;
use std::env;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `society --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;
    init_logging(config.log_level());

    let gateway = HttpGateway::new(config.base_url(), config.timeout()?).with_context(|| {
        format!(
            "invalid [server] config in {}; fix base_url/timeout values",
            options.config_path.display()
        )
    })?;

    if options.check_only {
        gateway.ping()?;
        println!("ok: {} is reachable", gateway.base_url());
        return Ok(());
    }

    let Some(command) = options.command else {
        print_help();
        return Ok(());
    };

    let runtime = Runtime::new(&gateway, &config, config.page_size(), config.overlay_min()?);
    let output = match command {
        Command::BillingPeriod(date) => runtime.billing_period(&date),
        Command::List(args) => runtime.list(&args)?,
        Command::Show { endpoint, id } => runtime.show(&endpoint, &id)?,
        Command::Delete { endpoint, id } => runtime.delete(&endpoint, &id)?,
    };
    print!("{output}");
    Ok(())
}

/// `RUST_LOG` wins over `[log].level`.
fn init_logging(level: &str) {
    let filter = env::var("RUST_LOG")
        .ok()
        .filter(|raw| !raw.trim().is_empty())
        .unwrap_or_else(|| level.to_owned());

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    BillingPeriod(String),
    List(ListArgs),
    Show { endpoint: String, id: String },
    Delete { endpoint: String, id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
    command: Option<Command>,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        check_only: false,
        show_help: false,
        command: None,
    };

    let mut iter = args.into_iter().map(|arg| arg.as_ref().to_owned());
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value);
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            "billing-period" => {
                let date = required(&mut iter, "billing-period", "a YYYY-MM-DD date")?;
                options.command = Some(Command::BillingPeriod(date));
                reject_extra(&mut iter)?;
            }
            "list" => {
                options.command = Some(Command::List(parse_list_args(&mut iter)?));
            }
            "show" => {
                let endpoint = required(&mut iter, "show", "an endpoint")?;
                let id = required(&mut iter, "show", "an id")?;
                options.command = Some(Command::Show { endpoint, id });
                reject_extra(&mut iter)?;
            }
            "delete" => {
                let endpoint = required(&mut iter, "delete", "an endpoint")?;
                let id = required(&mut iter, "delete", "an id")?;
                options.command = Some(Command::Delete { endpoint, id });
                reject_extra(&mut iter)?;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn parse_list_args(iter: &mut impl Iterator<Item = String>) -> Result<ListArgs> {
    let mut args = ListArgs {
        endpoint: required(iter, "list", "an endpoint")?,
        ..ListArgs::default()
    };

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--page" => {
                let raw = required(iter, "--page", "a page number")?;
                args.page = Some(
                    raw.parse()
                        .with_context(|| format!("--page expects a number, got {raw:?}"))?,
                );
            }
            "--page-size" => {
                let raw = required(iter, "--page-size", "a row count")?;
                args.page_size = Some(
                    raw.parse()
                        .with_context(|| format!("--page-size expects a number, got {raw:?}"))?,
                );
            }
            "--sort" => args.sort = Some(required(iter, "--sort", "a field name")?),
            "--desc" => args.descending = true,
            "--all" => args.all = true,
            "--filter" => args.filter = Some(required(iter, "--filter", "search text")?),
            unknown => {
                return Err(anyhow!(
                    "unknown list option {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }
    Ok(args)
}

fn required(iter: &mut impl Iterator<Item = String>, flag: &str, what: &str) -> Result<String> {
    iter.next()
        .ok_or_else(|| anyhow!("{flag} requires {what}"))
}

fn reject_extra(iter: &mut impl Iterator<Item = String>) -> Result<()> {
    match iter.next() {
        Some(extra) => Err(anyhow!(
            "unexpected argument {extra:?}; run with --help to see supported options"
        )),
        None => Ok(()),
    }
}

fn print_help() {
    println!("society");
    println!("  --config <path>               Use a specific config path");
    println!("  --print-config-path           Print resolved config path");
    println!("  --print-example-config        Print a v1 config template");
    println!("  --check                       Validate config and reach the server");
    println!("  --help                        Show this help");
    println!();
    println!("commands:");
    println!("  billing-period <YYYY-MM-DD>   Billing month a reading date falls in");
    println!("  list <endpoint> [--page N] [--page-size N] [--sort FIELD] [--desc]");
    println!("                  [--all] [--filter TEXT]");
    println!("  show <endpoint> <id>          Print one entity as JSON");
    println!("  delete <endpoint> <id>        Delete one entity and reload the listing");
}
