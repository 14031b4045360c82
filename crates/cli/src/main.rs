use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use hmo_core::alerts::{evaluate_hmo_rules, AlertSummary, LabOrderRef, VitalSigns};
use hmo_core::billing::{apply_bill_coverage, Bill};
use hmo_core::bundles::BundleSession;
use hmo_core::claims::build_claim;
use hmo_core::config::{episode_duration_from_env_value, resolve_catalog_path};
use hmo_core::conflicts::{detect_prescription_conflicts, LabResult};
use hmo_core::episode::Episode;
use hmo_core::pricing::{PayerType, PriceQuery, ServiceCategory};
use hmo_core::{Catalog, CoreConfig, NonEmptyText};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hmo")]
#[command(about = "HMO coverage, pricing and clinical rules CLI")]
struct Cli {
    /// Catalog YAML file (overrides HMO_CATALOG_PATH)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
    /// Episode length in days (overrides HMO_EPISODE_DAYS)
    #[arg(long, global = true)]
    episode_days: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the price of an item for a payer
    Price {
        #[arg(long)]
        item_id: String,
        /// Display name (defaults to the item id)
        #[arg(long)]
        name: Option<String>,
        /// consultation, laboratory, pharmacy, procedure, imaging, admission, nursing, other
        #[arg(long, value_parser = parse_snake_case::<ServiceCategory>)]
        category: ServiceCategory,
        /// cash, hmo or corporate
        #[arg(long, value_parser = parse_snake_case::<PayerType>)]
        payer: PayerType,
        #[arg(long)]
        hmo: Option<String>,
    },
    /// Apply HMO coverage to every item of a bill (JSON file)
    CoverBill {
        bill: PathBuf,
        #[arg(long)]
        hmo: String,
    },
    /// Build the insurance claim for a bill (JSON file)
    Claim {
        bill: PathBuf,
        #[arg(long)]
        hmo: String,
    },
    /// Evaluate an insurer's clinical documentation rules
    Alerts {
        #[arg(long)]
        hmo: String,
        /// ICD-10 diagnosis code (repeatable)
        #[arg(long = "diagnosis")]
        diagnoses: Vec<String>,
        /// Vital sign reading as name=value (repeatable)
        #[arg(long = "vital", value_parser = parse_vital)]
        vitals: Vec<(String, f64)>,
        /// Ordered lab test code (repeatable)
        #[arg(long = "lab")]
        labs: Vec<String>,
    },
    /// Check prescribed drugs against lab results
    Conflicts {
        /// Prescribed drug name (repeatable)
        #[arg(long = "drug")]
        drugs: Vec<String>,
        /// Lab result as CODE=result, with an optional ":abnormal" suffix (repeatable)
        #[arg(long = "lab", value_parser = parse_lab_result)]
        labs: Vec<LabResult>,
    },
    /// Suggest protocol bundles for diagnoses
    Bundles {
        #[arg(long = "diagnosis")]
        diagnoses: Vec<String>,
        /// Lab test code already ordered (repeatable)
        #[arg(long = "lab")]
        labs: Vec<String>,
        /// Drug already prescribed (repeatable)
        #[arg(long = "drug")]
        drugs: Vec<String>,
        /// Bundle id dismissed in this session (repeatable)
        #[arg(long = "dismiss")]
        dismissed: Vec<String>,
    },
    /// Open a new episode
    OpenEpisode {
        id: NonEmptyText,
        patient_id: NonEmptyText,
        /// Start time (RFC 3339, defaults to now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Report the lifecycle state of an episode (JSON file)
    Episode {
        episode: PathBuf,
        /// Evaluation time (RFC 3339, defaults to now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        /// Lock the episode for audit and print it
        #[arg(long)]
        lock: bool,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EpisodeReport {
    episode: Episode,
    should_auto_complete: bool,
    remaining: hmo_core::episode::RemainingTime,
}

fn parse_snake_case<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string())).map_err(|e| e.to_string())
}

fn parse_vital(value: &str) -> Result<(String, f64), String> {
    let (name, reading) = value
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {value:?}"))?;
    let reading = reading
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid reading for {name}: {e}"))?;
    Ok((name.trim().to_string(), reading))
}

fn parse_lab_result(value: &str) -> Result<LabResult, String> {
    let (code, rest) = value
        .split_once('=')
        .ok_or_else(|| format!("expected CODE=result, got {value:?}"))?;
    let (result, is_abnormal) = match rest.strip_suffix(":abnormal") {
        Some(result) => (result, true),
        None => (rest, false),
    };
    Ok(LabResult {
        test_code: code.trim().to_string(),
        result: result.trim().to_string(),
        is_abnormal,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("hmo=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    run(Cli::parse(), Utc::now())
}

fn run(cli: Cli, now: DateTime<Utc>) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        println!("Use 'hmo --help' for commands");
        return Ok(());
    };

    let catalog_override = cli
        .catalog
        .or_else(|| std::env::var("HMO_CATALOG_PATH").ok().map(PathBuf::from));
    let episode_days = cli
        .episode_days
        .or_else(|| std::env::var("HMO_EPISODE_DAYS").ok());
    let episode_duration = episode_duration_from_env_value(episode_days)?;

    // Only catalog-backed commands need the catalog file to exist.
    let config = || -> anyhow::Result<CoreConfig> {
        let catalog_path = resolve_catalog_path(catalog_override.clone())?;
        Ok(CoreConfig::new(catalog_path, episode_duration)?)
    };
    let load_catalog = || -> anyhow::Result<Catalog> {
        let config = config()?;
        Ok(Catalog::load(config.catalog_path())?)
    };

    match command {
        Commands::Price {
            item_id,
            name,
            category,
            payer,
            hmo,
        } => {
            let query = PriceQuery {
                item_name: name.unwrap_or_else(|| item_id.clone()),
                item_id,
                category,
                payer_type: payer,
                hmo_provider_id: hmo,
            };
            print_json(&load_catalog()?.prices.resolve(&query))?;
        }
        Commands::CoverBill { bill, hmo } => {
            let bill: Bill = read_json(&bill)?;
            let catalog = load_catalog()?;
            print_json(&apply_bill_coverage(&bill.items, &hmo, &catalog.coverage))?;
        }
        Commands::Claim { bill, hmo } => {
            let bill: Bill = read_json(&bill)?;
            let claim = build_claim(&bill, &hmo, &load_catalog()?.coverage);
            if claim.is_empty() {
                tracing::warn!(bill_id = %bill.id, hmo = %hmo, "nothing claimable on bill");
            }
            print_json(&claim)?;
        }
        Commands::Alerts {
            hmo,
            diagnoses,
            vitals,
            labs,
        } => {
            let vitals = vitals
                .into_iter()
                .fold(VitalSigns::new(), |acc, (name, value)| acc.with(name, value));
            let lab_orders: Vec<LabOrderRef> = labs
                .into_iter()
                .map(|code| LabOrderRef {
                    test_code: code,
                    test_name: String::new(),
                })
                .collect();
            let catalog = load_catalog()?;
            let results = evaluate_hmo_rules(
                &catalog.hmo_rules,
                &hmo,
                &diagnoses,
                Some(&vitals),
                &lab_orders,
            );
            let summary = AlertSummary::from_results(&results);
            print_json(&serde_json::json!({ "results": results, "summary": summary }))?;
        }
        Commands::Conflicts { drugs, labs } => {
            let catalog = load_catalog()?;
            print_json(&detect_prescription_conflicts(
                drugs.as_slice(),
                &labs,
                &catalog.conflict_rules,
            ))?;
        }
        Commands::Bundles {
            diagnoses,
            labs,
            drugs,
            dismissed,
        } => {
            let catalog = load_catalog()?;
            let mut session = BundleSession::new();
            for id in dismissed {
                session.dismiss_bundle(id);
            }
            print_json(&session.suggest(&catalog.bundles, &diagnoses, &labs, &drugs))?;
        }
        Commands::OpenEpisode { id, patient_id, at } => {
            let episode = Episode::open(id, patient_id, at.unwrap_or(now), episode_duration)?;
            print_json(&episode)?;
        }
        Commands::Episode { episode, at, lock } => {
            let mut episode: Episode = read_json(&episode)?;
            let at = at.unwrap_or(now);
            if lock {
                episode.lock_for_audit(at);
            }
            print_json(&EpisodeReport {
                should_auto_complete: episode.should_auto_complete(at),
                remaining: episode.remaining_time(at),
                episode,
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vitals_and_lab_results() {
        assert_eq!(parse_vital("temperature=38.2"), Ok(("temperature".to_string(), 38.2)));
        assert!(parse_vital("temperature").is_err());
        assert!(parse_vital("pulse=fast").is_err());

        let lab = parse_lab_result("MP=Negative").expect("lab");
        assert_eq!(lab.test_code, "MP");
        assert_eq!(lab.result, "Negative");
        assert!(!lab.is_abnormal);

        let lab = parse_lab_result("URINALYSIS=Nitrites +:abnormal").expect("lab");
        assert!(lab.is_abnormal);
        assert_eq!(lab.result, "Nitrites +");
    }

    #[test]
    fn parses_snake_case_enums() {
        assert_eq!(parse_snake_case::<PayerType>("corporate"), Ok(PayerType::Corporate));
        assert_eq!(
            parse_snake_case::<ServiceCategory>("laboratory"),
            Ok(ServiceCategory::Laboratory)
        );
        assert!(parse_snake_case::<PayerType>("credit").is_err());
    }

    #[test]
    fn open_episode_does_not_need_a_catalog() {
        let missing = tempfile::tempdir().expect("temp dir").path().join("catalog.yaml");
        let cli = Cli::try_parse_from([
            "hmo",
            "--catalog",
            missing.to_str().expect("utf-8 path"),
            "--episode-days",
            "3",
            "open-episode",
            "ep-1",
            "patient-1",
        ])
        .expect("args");
        run(cli, Utc::now()).expect("open-episode without catalog");
    }

    #[test]
    fn catalog_commands_report_a_missing_catalog() {
        let missing = tempfile::tempdir().expect("temp dir").path().join("catalog.yaml");
        let cli = Cli::try_parse_from([
            "hmo",
            "--catalog",
            missing.to_str().expect("utf-8 path"),
            "bundles",
            "--diagnosis",
            "B54",
        ])
        .expect("args");
        assert!(run(cli, Utc::now()).is_err());
    }

    #[test]
    fn oversized_episode_length_is_an_error() {
        let cli = Cli::try_parse_from([
            "hmo",
            "--episode-days",
            "100000000",
            "open-episode",
            "ep-1",
            "patient-1",
        ])
        .expect("args");
        assert!(run(cli, Utc::now()).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
