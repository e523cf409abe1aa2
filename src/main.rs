use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use herd_feed::alert::engine::{apply_alert_rules, evaluate_alerts};
use herd_feed::alert::sink::{dispatch_alerts, sinks_from_config};
use herd_feed::config::{Config, ConfigOverrides};
use herd_feed::feeding::history::summarize_timeline;
use herd_feed::feeding::pipeline::{plan_feeding, FeedingReport};
use herd_feed::feeding::{FeedingSubmission, ManualOverride};
use herd_feed::herd::summary::summarize_herd;
use herd_feed::herd::{
    needing_attention, new_animal_id, Animal, AnimalUpdate, Group, NewAnimal, Sex,
};
use herd_feed::output::csv::{animals_to_csv, history_to_csv, outcomes_to_csv};
use herd_feed::output::json::render_json;
use herd_feed::output::table::{
    render_animal_table, render_history_table, render_outcome_table, render_rations_table,
    render_summary_table,
};
use herd_feed::server::run_server;
use herd_feed::store::store::HerdStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "herd-feed",
    about = "Per-animal feed intake estimation for livestock groups"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    db: Option<String>,
    #[arg(long = "ok-ratio")]
    ok_ratio: Option<f64>,
    #[arg(long)]
    webhook: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Animals {
        #[command(subcommand)]
        action: AnimalCommand,
    },
    Feed {
        #[arg(long)]
        group: Group,
        #[arg(long = "total-kg")]
        total_kg: f64,
        #[arg(long = "feed-type", default_value = "standard")]
        feed_type: String,
        #[arg(long, default_value = "trough")]
        method: String,
        #[arg(long = "recorded-by", default_value = "farm-worker")]
        recorded_by: String,
        /// Observed outcome as `<animal-id>=ate|missed|partial`; repeatable.
        #[arg(long = "override", value_parser = parse_override)]
        overrides: Vec<(String, ManualOverride)>,
        #[arg(long)]
        dry_run: bool,
    },
    History {
        #[arg(long)]
        group: Option<Group>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    Alerts,
    Summary,
    Rations,
    Reset {
        #[arg(long)]
        yes: bool,
    },
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 3001)]
        port: u16,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[derive(Debug, Subcommand)]
enum AnimalCommand {
    List {
        #[arg(long)]
        group: Option<Group>,
    },
    Add {
        #[arg(long)]
        tag: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        group: Group,
        #[arg(long)]
        sex: Sex,
        #[arg(long)]
        weight: f64,
        #[arg(long)]
        breed: Option<String>,
        #[arg(long)]
        dob: Option<NaiveDate>,
        #[arg(long)]
        pregnant: bool,
    },
    Update {
        id: String,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        group: Option<Group>,
        #[arg(long)]
        sex: Option<Sex>,
        #[arg(long)]
        weight: Option<f64>,
        #[arg(long)]
        breed: Option<String>,
        #[arg(long)]
        dob: Option<NaiveDate>,
        #[arg(long)]
        pregnant: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        db_path: cli.db.clone(),
        ok_ratio: cli.ok_ratio,
        webhook_url: cli.webhook.clone(),
    });

    if matches!(cli.command, Commands::Config { .. }) {
        return handle_config_command(&cli.command, &config, &config_path);
    }
    if let Commands::Serve { host, port } = &cli.command {
        let bind = format!("{host}:{port}");
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
        return run_server(config, addr).await;
    }

    let rations = config.ration_book()?;
    let policy = config.classifier_policy()?;
    let db_path = config.resolved_db_path();
    let mut store = HerdStore::open(&db_path)?;
    if store.seed_if_empty(Utc::now())? {
        info!("seeded empty registry at {}", db_path.display());
    }

    match &cli.command {
        Commands::Animals { action } => handle_animal_command(action, &mut store, cli.output)?,
        Commands::Feed {
            group,
            total_kg,
            feed_type,
            method,
            recorded_by,
            overrides,
            dry_run,
        } => {
            let submission = FeedingSubmission {
                group: *group,
                feed_type: feed_type.clone(),
                total_kg: *total_kg,
                method: method.clone(),
                recorded_by: recorded_by.clone(),
                overrides: overrides.iter().cloned().collect(),
            };
            let herd = store.list_animals()?;
            let report = plan_feeding(&submission, &herd, &rations, &policy, Utc::now())?;
            for id in &report.ignored_overrides {
                warn!("override for {id} ignored: not in the {group} group");
            }
            if *dry_run {
                info!("dry run: feeding {} not committed", report.event.id);
            } else {
                store.commit_feeding(&report)?;
            }
            print_report(&report, &herd, cli.output)?;
            if !*dry_run {
                notify(&report, &config).await;
            }
        }
        Commands::History { group, limit } => {
            let records = store.load_events(*group, *limit)?;
            match cli.output {
                OutputFormat::Table => {
                    println!("{}", render_history_table(&records));
                    println!("{}", summarize_timeline(&records, *group));
                }
                OutputFormat::Json => println!("{}", render_json(&records)?),
                OutputFormat::Csv => println!("{}", history_to_csv(&records)?),
            }
        }
        Commands::Alerts => {
            let animals = store.list_animals()?;
            let flagged: Vec<Animal> = needing_attention(&animals).into_iter().cloned().collect();
            if flagged.is_empty() && matches!(cli.output, OutputFormat::Table) {
                println!("All animals are within their ration targets.");
            } else {
                print_animals(&flagged, cli.output)?;
            }
        }
        Commands::Summary => {
            let summary = summarize_herd(&store.list_animals()?);
            match cli.output {
                OutputFormat::Table => println!("{}", render_summary_table(&summary)),
                OutputFormat::Json => println!("{}", render_json(&summary)?),
                OutputFormat::Csv => {
                    warn!("CSV output for summary not implemented, using JSON");
                    println!("{}", render_json(&summary)?);
                }
            }
        }
        Commands::Rations => match cli.output {
            OutputFormat::Table => println!("{}", render_rations_table(&rations)),
            _ => println!(
                "{}",
                render_json(&rations.profiles().collect::<Vec<_>>())?
            ),
        },
        Commands::Reset { yes } => {
            if !*yes {
                bail!("reset deletes all feeding history and custom animals; pass --yes to confirm");
            }
            store.reset_to_seed(Utc::now())?;
            println!("Registry reset to the default herd.");
        }
        Commands::Config { .. } => {}
        Commands::Serve { .. } => unreachable!("serve command handled before dispatch"),
    }

    Ok(())
}

fn handle_config_command(command: &Commands, config: &Config, config_path: &PathBuf) -> Result<()> {
    let Commands::Config { init, show } = command else {
        return Ok(());
    };
    if *init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if *show || !*init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn handle_animal_command(
    action: &AnimalCommand,
    store: &mut HerdStore,
    format: OutputFormat,
) -> Result<()> {
    match action {
        AnimalCommand::List { group } => {
            let animals: Vec<Animal> = store
                .list_animals()?
                .into_iter()
                .filter(|a| group.map_or(true, |g| a.group == g))
                .collect();
            print_animals(&animals, format)?;
        }
        AnimalCommand::Add {
            tag,
            name,
            group,
            sex,
            weight,
            breed,
            dob,
            pregnant,
        } => {
            let now = Utc::now();
            let animal = NewAnimal {
                tag_id: tag.clone(),
                name: name.clone(),
                group: *group,
                sex: *sex,
                weight: *weight,
                breed: breed.clone(),
                dob: *dob,
                is_pregnant: *pregnant,
            }
            .into_animal(new_animal_id(now), now)?;
            store.insert_animal(&animal)?;
            info!("registered {} as {}", animal.tag_id, animal.id);
            print_animals(std::slice::from_ref(&animal), format)?;
        }
        AnimalCommand::Update {
            id,
            tag,
            name,
            group,
            sex,
            weight,
            breed,
            dob,
            pregnant,
        } => {
            let mut animal = store
                .get_animal(id)?
                .ok_or_else(|| anyhow!("animal not found: {id}"))?;
            let update = AnimalUpdate {
                tag_id: tag.clone(),
                name: name.clone(),
                group: *group,
                sex: *sex,
                breed: breed.clone(),
                dob: *dob,
                weight: *weight,
                is_pregnant: *pregnant,
            };
            animal.apply_update(&update, Utc::now())?;
            store.update_animal(&animal)?;
            print_animals(std::slice::from_ref(&animal), format)?;
        }
    }
    Ok(())
}

async fn notify(report: &FeedingReport, config: &Config) {
    let alerts = apply_alert_rules(
        evaluate_alerts(report, &config.alerts.admin_email),
        &config.alerts.rules,
    );
    if alerts.is_empty() {
        return;
    }
    let sinks = sinks_from_config(&config.alerts);
    dispatch_alerts(&sinks, &alerts).await;
}

fn parse_override(raw: &str) -> std::result::Result<(String, ManualOverride), String> {
    let (id, outcome) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <animal-id>=<ate|missed|partial>, got {raw}"))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("missing animal id in override {raw}"));
    }
    let outcome = outcome.parse::<ManualOverride>().map_err(|e| e.to_string())?;
    Ok((id.to_string(), outcome))
}

fn print_animals(animals: &[Animal], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_animal_table(animals)),
        OutputFormat::Json => println!("{}", render_json(animals)?),
        OutputFormat::Csv => println!("{}", animals_to_csv(animals)?),
    }
    Ok(())
}

fn print_report(report: &FeedingReport, herd: &[Animal], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_outcome_table(report, herd)),
        OutputFormat::Json => println!("{}", render_json(report)?),
        OutputFormat::Csv => println!("{}", outcomes_to_csv(&report.outcomes)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use herd_feed::feeding::ManualOverride;
    use herd_feed::herd::Group;

    use super::{parse_override, Cli, Commands};

    #[test]
    fn parses_override_pairs() {
        assert_eq!(
            parse_override("seed-3=missed").unwrap(),
            ("seed-3".to_string(), ManualOverride::Missed)
        );
        assert!(parse_override("seed-3").is_err());
        assert!(parse_override("=ate").is_err());
        assert!(parse_override("seed-3=nibbled").is_err());
    }

    #[test]
    fn parses_feed_command() {
        let cli = Cli::try_parse_from([
            "herd-feed",
            "feed",
            "--group",
            "grower",
            "--total-kg",
            "3.6",
            "--override",
            "seed-3=partial",
        ])
        .unwrap();
        let Commands::Feed {
            group,
            total_kg,
            overrides,
            ..
        } = cli.command
        else {
            panic!("expected feed command");
        };
        assert_eq!(group, Group::Grower);
        assert_eq!(total_kg, 3.6);
        assert_eq!(overrides.len(), 1);
    }
}
