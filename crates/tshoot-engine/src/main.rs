//! `tshoot` command line: drive a troubleshooting session stored in a JSON file

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tshoot_engine::{
    Engine, EngineConfig, HealthProbe, HttpProbe, Request, SiteManifest, StaticProbe,
};
use tshoot_store::JsonFileStore;

fn cli() -> Command {
    Command::new("tshoot")
        .version(tshoot_engine::VERSION)
        .about("Troubleshooting session engine")
        .subcommand_required(true)
        .arg(
            Arg::new("store")
                .long("store")
                .global(true)
                .default_value("tshoot-state.json")
                .value_parser(value_parser!(PathBuf))
                .help("JSON file holding persisted session state"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML engine configuration"),
        )
        .arg(
            Arg::new("site")
                .long("site")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("JSON manifest of installed extensions and themes"),
        )
        .arg(
            Arg::new("probe-url")
                .long("probe-url")
                .global(true)
                .conflicts_with_all(["assume-healthy", "assume-broken"])
                .help("Health endpoint answering {\"status\":\"good\"}"),
        )
        .arg(
            Arg::new("assume-healthy")
                .long("assume-healthy")
                .global(true)
                .action(ArgAction::SetTrue)
                .conflicts_with("assume-broken")
                .help("Treat every health check as passing (the default is failing)"),
        )
        .arg(
            Arg::new("assume-broken")
                .long("assume-broken")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Treat every health check as failing"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("begin")
                .about("Start a troubleshooting session and print the cookie secret")
                .arg(
                    Arg::new("allow")
                        .long("allow")
                        .value_delimiter(',')
                        .action(ArgAction::Append)
                        .help("Extension slugs allowed to load"),
                )
                .arg(origin_arg()),
        )
        .subcommand(Command::new("status").about("Print the persisted session state"))
        .subcommand(
            Command::new("issue")
                .about("Issue an authorization token")
                .arg(Arg::new("action").required(true).help("Action name"))
                .arg(
                    Arg::new("payload")
                        .num_args(0..)
                        .help("Payload items, in order"),
                ),
        )
        .subcommand(
            Command::new("request")
                .about("Run one request through the router and print the outcome")
                .arg(Arg::new("url").required(true).help("Absolute request URL"))
                .arg(
                    Arg::new("cookie")
                        .long("cookie")
                        .help("Session cookie value"),
                )
                .arg(origin_arg())
                .arg(
                    Arg::new("admin")
                        .long("admin")
                        .action(ArgAction::SetTrue)
                        .help("Mark as an administrative screen"),
                ),
        )
        .subcommand(Command::new("end").about("End the troubleshooting session"))
}

fn origin_arg() -> Arg {
    Arg::new("origin")
        .long("origin")
        .value_parser(value_parser!(IpAddr))
        .help("Client network address")
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_probe(matches: &ArgMatches) -> Result<Arc<dyn HealthProbe>> {
    if let Some(url) = matches.get_one::<String>("probe-url") {
        let url = url::Url::parse(url).with_context(|| format!("invalid --probe-url {url}"))?;
        return Ok(Arc::new(HttpProbe::new(url, Duration::from_secs(10))?));
    }
    if matches.get_flag("assume-healthy") {
        return Ok(Arc::new(StaticProbe(true)));
    }
    if !matches.get_flag("assume-broken") {
        tracing::warn!("no probe configured; every change will be rolled back");
    }
    Ok(Arc::new(StaticProbe(false)))
}

fn build_engine(matches: &ArgMatches) -> Result<Engine> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let site = match matches.get_one::<PathBuf>("site") {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read site manifest {}", path.display()))?;
            SiteManifest::from_json(&text)
                .with_context(|| format!("invalid site manifest {}", path.display()))?
        }
        None => SiteManifest::default(),
    };
    let site = Arc::new(site);

    let store_path = matches
        .get_one::<PathBuf>("store")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("tshoot-state.json"));
    let kv = Arc::new(JsonFileStore::open(store_path));

    Ok(Engine::new(config, kv, site.clone(), site, build_probe(matches)?)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let Some((name, args)) = matches.subcommand() else {
        bail!("no subcommand given");
    };
    let engine = build_engine(args)?;

    match name {
        "begin" => {
            let allowed: BTreeSet<String> = args
                .get_many::<String>("allow")
                .map(|values| values.filter(|v| !v.is_empty()).cloned().collect())
                .unwrap_or_default();
            let origin = args.get_one::<IpAddr>("origin").copied();
            let start = engine.lifecycle().begin_session(origin, &allowed)?;
            println!("{}", start.secret);
        }
        "status" => print_json(&engine.store().snapshot()?)?,
        "issue" => {
            let action = args
                .get_one::<String>("action")
                .context("missing action")?;
            let payload: Vec<String> = args
                .get_many::<String>("payload")
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
            println!("{}", engine.authorizer().issue(action, &payload));
        }
        "request" => {
            let url = args.get_one::<String>("url").context("missing url")?;
            let mut request = Request::new(url)?;
            if let Some(cookie) = args.get_one::<String>("cookie") {
                request = request.with_cookie(engine.config().cookie_name.clone(), cookie.clone());
            }
            if let Some(origin) = args.get_one::<IpAddr>("origin") {
                request = request.with_origin(*origin);
            }
            if args.get_flag("admin") {
                request = request.as_admin();
            }
            print_json(&engine.route(request)?)?;
        }
        "end" => {
            engine.lifecycle().end_session()?;
            println!("troubleshooting session ended");
        }
        other => bail!("unknown subcommand {other}"),
    }

    Ok(())
}
