//! greenwave command line
//!
//! Subcommands:
//! - `inject`: place inline markers in blip content read from a file or stdin
//! - `unread`: list the unread blips of a wave
//! - `counts`: unread counts of several waves
//! - `mark-read`: mark blips read
//! - `follow`: move to the next unread blip and mark it read
//! - `fold`: show or change whether a blip's replies are folded

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wave_bus::SignalBus;
use wave_markers::MarkerInjector;
use wave_model::{BlipId, ClientConfig, InlineChild, WaveId};
use wave_navigator::{
    FollowOutcome, FollowTheGreen, NextTopicSource, RenderSurface, ScrollOptions, ScrollTarget, TopicIndex,
};
use wave_prefs::{storage_from_config, CollapsePreferences};
use wave_unread::{HttpReadModel, MarkOutcome, ReadModel, UnreadStore};

fn cli() -> Command {
    Command::new("greenwave")
        .version(wave_model::VERSION)
        .about("Unread tracking and Follow-the-Green for blip trees")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .global(true)
                .help("Server origin, overrides configuration and environment"),
        )
        .arg(
            Arg::new("user")
                .long("user")
                .global(true)
                .help("Current user id"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("inject")
                .about("Inject inline thread markers into blip content")
                .arg(
                    Arg::new("input")
                        .default_value("-")
                        .value_parser(value_parser!(PathBuf))
                        .help("Content file, - for stdin"),
                )
                .arg(
                    Arg::new("child")
                        .long("child")
                        .action(ArgAction::Append)
                        .help("Inline child as ID:OFFSET, offset in UTF-16 units of visible text"),
                )
                .arg(
                    Arg::new("read")
                        .long("read")
                        .action(ArgAction::Append)
                        .help("Inline child that has been read"),
                )
                .arg(
                    Arg::new("expanded")
                        .long("expanded")
                        .action(ArgAction::Append)
                        .help("Inline child rendered in place"),
                ),
        )
        .subcommand(
            Command::new("unread")
                .about("List unread blips of a wave in reading order")
                .arg(Arg::new("wave").required(true).help("Wave id"))
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("counts")
                .about("Unread counts of several waves")
                .arg(
                    Arg::new("waves")
                        .required(true)
                        .num_args(1..)
                        .help("Wave ids, at most 200 are asked for"),
                )
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("mark-read")
                .about("Mark blips read")
                .arg(Arg::new("wave").required(true).help("Wave id"))
                .arg(Arg::new("blips").required(true).num_args(1..).help("Blip ids")),
        )
        .subcommand(
            Command::new("follow")
                .about("Go to the next unread blip and mark it read")
                .arg(Arg::new("wave").required(true).help("Wave id"))
                .arg(
                    Arg::new("topics")
                        .long("topics")
                        .value_delimiter(',')
                        .help("Topic list to pick the next topic from once the wave is read"),
                ),
        )
        .subcommand(
            Command::new("fold")
                .about("Show or change whether a blip's replies are folded")
                .arg(Arg::new("blip").required(true).help("Blip id"))
                .arg(
                    Arg::new("set")
                        .long("set")
                        .value_parser(["on", "off"])
                        .help("Fold (on) or unfold (off); prints the current state when omitted"),
                ),
        )
}

fn json_flag() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON")
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// File or default configuration, then environment, then flags
fn resolve_config(matches: &ArgMatches) -> Result<ClientConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ClientConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => ClientConfig::new().with_env_overrides(),
    };
    if let Some(url) = matches.get_one::<String>("base-url") {
        config = config.with_base_url(url);
    }
    if let Some(user) = matches.get_one::<String>("user") {
        config = config.with_user(user.as_str());
    }
    config.validate()?;
    Ok(config)
}

fn parse_child(spec: &str, read: &HashSet<&str>) -> Result<InlineChild> {
    let Some((id, offset)) = spec.rsplit_once(':') else {
        bail!("inline child {spec:?} is not ID:OFFSET");
    };
    if id.is_empty() {
        bail!("inline child {spec:?} has no id");
    }
    let offset: u32 = offset
        .parse()
        .with_context(|| format!("inline child {spec:?} has a bad offset"))?;
    Ok(InlineChild::new(id, offset, read.contains(id)))
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content).context("reading stdin")?;
        Ok(content)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }
}

fn values<'a>(matches: &'a ArgMatches, id: &str) -> impl Iterator<Item = &'a String> {
    matches.get_many::<String>(id).into_iter().flatten()
}

fn run_inject(args: &ArgMatches, config: &ClientConfig) -> Result<()> {
    let input = args
        .get_one::<PathBuf>("input")
        .context("input path missing")?;
    let content = read_input(input)?;

    let read: HashSet<&str> = values(args, "read").map(String::as_str).collect();
    let children = values(args, "child")
        .map(|spec| parse_child(spec, &read))
        .collect::<Result<Vec<_>>>()?;
    let expanded: HashSet<BlipId> = values(args, "expanded").map(|id| BlipId::from(id.as_str())).collect();

    let injector = MarkerInjector::new(config.injection_cache_capacity);
    println!("{}", injector.inject(&content, &children, &expanded));
    Ok(())
}

fn read_model(config: &ClientConfig) -> Result<Arc<dyn ReadModel>> {
    Ok(Arc::new(HttpReadModel::from_config(config)?))
}

fn open_store(wave: &str, model: Arc<dyn ReadModel>, config: &ClientConfig) -> UnreadStore {
    UnreadStore::builder(wave, model).with_config(config).build()
}

async fn run_unread(args: &ArgMatches, config: &ClientConfig) -> Result<()> {
    let wave = args.get_one::<String>("wave").context("wave missing")?;
    let response = read_model(config)?.fetch_unread(&WaveId::from(wave.as_str())).await?;
    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }
    println!("{}: {} unread, {} of {} read", wave, response.unread.len(), response.read, response.total);
    for id in &response.unread {
        println!("  {id}");
    }
    Ok(())
}

async fn run_counts(args: &ArgMatches, config: &ClientConfig) -> Result<()> {
    let waves: Vec<WaveId> = values(args, "waves").map(|id| WaveId::from(id.as_str())).collect();
    let counts = read_model(config)?.unread_counts(&waves).await?;
    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&counts)?);
        return Ok(());
    }
    for count in &counts {
        println!("{}\t{} unread\t{} total", count.wave_id, count.unread, count.total);
    }
    Ok(())
}

async fn run_mark_read(args: &ArgMatches, config: &ClientConfig) -> Result<()> {
    let wave = args.get_one::<String>("wave").context("wave missing")?;
    let blips: Vec<BlipId> = values(args, "blips").map(|id| BlipId::from(id.as_str())).collect();
    let store = open_store(wave, read_model(config)?, config);
    store.refresh().await?;

    let marked = match blips.as_slice() {
        [one] => match store.mark_blip_read(one).await? {
            MarkOutcome::Marked => 1,
            MarkOutcome::NotUnread => 0,
        },
        many => store.mark_blips_read(many).await?,
    };
    println!("{marked} marked read, {} still unread", store.unread_ids().len());
    store.shutdown();
    Ok(())
}

/// Surface for a terminal: every blip counts as shown
#[derive(Debug, Default)]
struct TerminalSurface;

#[async_trait]
impl RenderSurface for TerminalSurface {
    fn find_blip(&self, _blip_id: &BlipId) -> bool {
        true
    }

    fn find_marker(&self, _blip_id: &BlipId) -> bool {
        false
    }

    fn is_inline(&self, _blip_id: &BlipId) -> bool {
        false
    }

    fn scroll_into_view(&self, target: &ScrollTarget, _options: ScrollOptions) {
        tracing::debug!("Showing {:?}", target);
    }

    async fn next_frame(&self) {}
}

async fn run_follow(args: &ArgMatches, config: &ClientConfig) -> Result<()> {
    let wave = args.get_one::<String>("wave").context("wave missing")?;
    let model = read_model(config)?;
    let store = Arc::new(open_store(wave, Arc::clone(&model), config));
    store.refresh().await?;

    let mut navigator = FollowTheGreen::new(Arc::clone(&store), Arc::new(TerminalSurface), SignalBus::new())
        .with_config(config);
    let topics: Vec<WaveId> = values(args, "topics").map(|id| WaveId::from(id.as_str())).collect();
    if !topics.is_empty() {
        let index: Arc<dyn NextTopicSource> = Arc::new(TopicIndex::new(model, topics));
        navigator = navigator.with_topics(index);
    }

    let outcome = navigator.follow().await?;
    store.shutdown();
    match outcome {
        FollowOutcome::Navigated { blip_id, mark, .. } => {
            mark?;
            println!("{blip_id}");
        }
        FollowOutcome::NextTopic(next) => println!("no unread blips; next topic {next}"),
        FollowOutcome::Idle => println!("no unread blips"),
        FollowOutcome::Busy => bail!("navigation already running"),
        FollowOutcome::Aborted { blip_id, reason } => bail!("could not reach {blip_id}: {reason:?}"),
    }
    Ok(())
}

fn run_fold(args: &ArgMatches, config: &ClientConfig) -> Result<()> {
    let blip = BlipId::from(args.get_one::<String>("blip").context("blip missing")?.as_str());
    let prefs = CollapsePreferences::new(storage_from_config(config));
    if let Some(set) = args.get_one::<String>("set") {
        prefs.set_collapsed(blip.clone(), set == "on");
    }
    let state = if prefs.is_collapsed(&blip) { "folded" } else { "unfolded" };
    println!("{blip}: {state}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("log-json"));
    let config = resolve_config(&matches)?;

    match matches.subcommand() {
        Some(("inject", args)) => run_inject(args, &config),
        Some(("unread", args)) => run_unread(args, &config).await,
        Some(("counts", args)) => run_counts(args, &config).await,
        Some(("mark-read", args)) => run_mark_read(args, &config).await,
        Some(("follow", args)) => run_follow(args, &config).await,
        Some(("fold", args)) => run_fold(args, &config),
        _ => Ok(()),
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
    fn child_specs_parse() {
        let read: HashSet<&str> = ["c2"].into_iter().collect();
        assert_eq!(parse_child("c1:5", &read).unwrap(), InlineChild::new("c1", 5, false));
        assert_eq!(parse_child("c2:0", &read).unwrap(), InlineChild::new("c2", 0, true));
        assert!(parse_child("c1", &read).is_err());
        assert!(parse_child(":4", &read).is_err());
        assert!(parse_child("c1:-3", &read).is_err());
    }

    #[test]
    fn flags_override_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("greenwave.toml");
        std::fs::write(&path, "base_url = \"http://file.example\"\nmax_expand_frames = 12\n").unwrap();

        let matches = cli()
            .try_get_matches_from([
                "greenwave",
                "--config",
                path.to_str().unwrap(),
                "--user",
                "u7",
                "unread",
                "w1",
            ])
            .unwrap();
        let config = resolve_config(&matches).unwrap();
        assert_eq!(config.max_expand_frames, 12);
        assert_eq!(config.user_id.as_ref().map(|u| u.as_str()), Some("u7"));
    }

    #[test]
    fn fold_persists_to_the_configured_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ClientConfig::new();
        config.preferences_path = Some(dir.path().join("prefs.json"));

        let matches = cli()
            .try_get_matches_from(["greenwave", "fold", "b1", "--set", "on"])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        run_fold(args, &config).unwrap();

        let prefs = CollapsePreferences::new(storage_from_config(&config));
        assert!(prefs.is_collapsed(&"b1".into()));
        assert!(cli().try_get_matches_from(["greenwave", "fold", "b1", "--set", "maybe"]).is_err());
    }

    #[test]
    fn counts_accepts_many_waves() {
        let matches = cli()
            .try_get_matches_from(["greenwave", "counts", "w1", "w2", "--json"])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(values(args, "waves").count(), 2);
        assert!(args.get_flag("json"));
    }
}
