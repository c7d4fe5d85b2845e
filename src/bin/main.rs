// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! CLI tool for the AppEngine API (appengine)

#[cfg(feature = "cli")]
use appenginelib::{
    AggregateValue, AppEngineError, AppEngineService, ClientConfig, DatastreamPaginator,
    DeviceDetails, HttpTransport, JsonTransport, ResultOrder, TimestampedValue,
};
#[cfg(feature = "cli")]
use chrono::{DateTime, Duration, Utc};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use colored::Colorize;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "appengine")]
#[command(about = "Query devices, interfaces and datastreams through the AppEngine API", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// AppEngine API base URL (overrides the config file)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Realm to operate on (overrides the config file)
    #[arg(short, long, global = true)]
    realm: Option<String>,

    /// Bearer token for the realm
    #[arg(long, global = true, env = "APPENGINE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Output format (json or text)
    #[arg(short, long, default_value = "text", global = true)]
    format: String,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Inspect devices registered in the realm
    Devices {
        #[command(subcommand)]
        action: DevicesSubcommand,
    },
    /// Show the current values of a properties interface
    Properties {
        /// Device ID
        device_id: String,
        /// Interface name
        interface: String,
    },
    /// Show the last sample of every path of a datastream interface
    Snapshot {
        /// Device ID
        device_id: String,
        /// Interface name
        interface: String,
    },
    /// Retrieve samples of a datastream path
    Samples {
        /// Device ID
        device_id: String,
        /// Interface name
        interface: String,
        /// Interface path, e.g. /room1/temperature
        path: String,
        /// Maximum number of samples to retrieve (all if omitted)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Window start: RFC3339 or relative (30s, 15m, 2h, 7d)
        #[arg(long)]
        since: Option<String>,
        /// Window end: RFC3339 or relative (30s, 15m, 2h, 7d)
        #[arg(long)]
        to: Option<String>,
        /// Result order (asc or desc)
        #[arg(long, default_value = "desc")]
        order: String,
    },
    /// Retrieve records of an aggregate datastream interface
    Aggregate {
        /// Device ID
        device_id: String,
        /// Interface name
        interface: String,
        /// Number of latest records to retrieve
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
        /// Window start: RFC3339 or relative (30s, 15m, 2h, 7d)
        #[arg(long)]
        since: Option<String>,
        /// Window end: RFC3339 or relative (30s, 15m, 2h, 7d)
        #[arg(long)]
        to: Option<String>,
    },
    /// Client configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigSubcommand,
    },
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum DevicesSubcommand {
    /// List all devices in the realm
    List,
    /// Show the status of a device
    Show {
        /// Device ID
        device_id: String,
    },
    /// List the interfaces exposed by a device
    Interfaces {
        /// Device ID
        device_id: String,
    },
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Print a sample configuration file
    Sample,
    /// Print the effective configuration (token redacted)
    Show,
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();

    env_logger::init();

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;
    let json = cli.format == "json";

    if let Commands::Config { action } = &cli.command {
        match action {
            ConfigSubcommand::Sample => print!("{}", ClientConfig::sample_toml()),
            ConfigSubcommand::Show => {
                let mut shown = config.clone();
                if shown.token.is_some() {
                    shown.token = Some("<redacted>".to_string());
                }
                print!("{}", toml::to_string_pretty(&shown)?);
            }
        }
        return Ok(());
    }

    let realm = config.require_realm()?;
    let token = config.require_token()?;
    let service = AppEngineService::from_config(HttpTransport::new(config.timeout())?, &config)?;
    log::debug!("using {} (realm {})", service.base_url(), realm);

    match &cli.command {
        Commands::Devices { action } => match action {
            DevicesSubcommand::List => {
                let devices = service.list_devices(realm, token)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&devices)?);
                } else {
                    println!("{}", "═══ Devices ═══".cyan().bold());
                    for device in &devices {
                        println!("  {}", device.yellow());
                    }
                    println!("  {} {}", "Total:".white().bold(), devices.len().to_string().green());
                }
            }
            DevicesSubcommand::Show { device_id } => {
                let details = service.get_device(realm, device_id, token)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&details)?);
                } else {
                    print_device_details(&details);
                }
            }
            DevicesSubcommand::Interfaces { device_id } => {
                let interfaces = service.list_device_interfaces(realm, device_id, token)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&interfaces)?);
                } else {
                    println!("{}", "═══ Interfaces ═══".cyan().bold());
                    for interface in &interfaces {
                        println!("  {}", interface.yellow());
                    }
                }
            }
        },

        Commands::Properties {
            device_id,
            interface,
        } => {
            let properties = service.get_properties(realm, device_id, interface, token)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&properties)?);
            } else {
                println!("{}", format!("═══ {} ═══", interface).cyan().bold());
                if properties.is_empty() {
                    println!("  {}", "No properties set".yellow());
                }
                for (path, value) in &properties {
                    println!("  {} {}", format!("{}:", path).white().bold(), value.to_string().green());
                }
            }
        }

        Commands::Snapshot {
            device_id,
            interface,
        } => {
            let snapshot = service.get_datastream_snapshot(realm, device_id, interface, token)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!("{}", format!("═══ {} ═══", interface).cyan().bold());
                if snapshot.is_empty() {
                    println!("  {}", "No data".yellow());
                }
                for (path, sample) in &snapshot {
                    println!(
                        "  {} {} {}",
                        format!("{}:", path).white().bold(),
                        sample.value.to_string().green(),
                        format!("@ {}", format_timestamp(&sample.timestamp)).cyan()
                    );
                }
            }
        }

        Commands::Samples {
            device_id,
            interface,
            path,
            limit,
            since,
            to,
            order,
        } => {
            let order: ResultOrder = order.parse()?;
            let now = Utc::now();
            let since = since.as_deref().map(|s| parse_time_spec(s, now)).transpose()?;
            let to = to.as_deref().map(|s| parse_time_spec(s, now)).transpose()?;

            if since.is_none() && to.is_none() && limit.is_some() && order == ResultOrder::Descending {
                let samples =
                    service.get_last_datastreams(realm, device_id, interface, path, *limit, token)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&samples)?);
                } else {
                    print_samples_header(path);
                    print_samples(&samples);
                }
            } else {
                let mut paginator = if since.is_none() && to.is_none() {
                    service.get_datastreams_paginator(realm, device_id, interface, path, order, token)
                } else {
                    service.get_datastreams_time_window_paginator(
                        realm, device_id, interface, path, since, to, order, token,
                    )
                };

                if json {
                    let samples = appenginelib::collect_limited(&mut paginator, *limit)?;
                    println!("{}", serde_json::to_string_pretty(&samples)?);
                } else {
                    print_samples_header(path);
                    let printed = stream_pages(&mut paginator, *limit, print_samples)?;
                    println!("  {} {}", "Total:".white().bold(), printed.to_string().green());
                }
            }
        }

        Commands::Aggregate {
            device_id,
            interface,
            count,
            since,
            to,
        } => {
            let now = Utc::now();
            let since = since.as_deref().map(|s| parse_time_spec(s, now)).transpose()?;
            let to = to.as_deref().map(|s| parse_time_spec(s, now)).transpose()?;

            let records = fetch_aggregates(
                &service,
                realm,
                device_id,
                interface,
                AggregateQuery {
                    count: *count,
                    since,
                    to,
                },
                token,
            )?;

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                println!("{}", format!("═══ {} ═══", interface).cyan().bold());
                for record in records.iter().filter(|r| !r.is_empty()) {
                    println!("  {}", serde_json::to_string(record.as_map())?.green());
                }
            }
        }

        Commands::Config { .. } => unreachable!("handled above"),
    }

    Ok(())
}

/// Merge the config file (if any) with command-line overrides
#[cfg(feature = "cli")]
fn load_config(cli: &Cli) -> appenginelib::Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_toml_file(path)?,
        None => ClientConfig::default(),
    };

    if let Some(url) = &cli.url {
        config.appengine_url = url.clone();
    }
    if let Some(realm) = &cli.realm {
        config.realm = Some(realm.clone());
    }
    if let Some(token) = &cli.token {
        config.token = Some(token.clone());
    }

    config.validate()?;
    Ok(config)
}

#[cfg(feature = "cli")]
struct AggregateQuery {
    count: usize,
    since: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

/// Aggregate records for the `aggregate` command. An interface without data gives no records.
#[cfg(feature = "cli")]
fn fetch_aggregates<T: JsonTransport>(
    service: &AppEngineService<T>,
    realm: &str,
    device_id: &str,
    interface: &str,
    query: AggregateQuery,
    token: &str,
) -> appenginelib::Result<Vec<AggregateValue>> {
    if query.since.is_some() || query.to.is_some() {
        service.get_aggregate_datastreams_time_window(realm, device_id, interface, query.since, query.to, token)
    } else if query.count == 1 {
        let record = service.get_aggregate_datastream_snapshot(realm, device_id, interface, token)?;
        Ok(Some(record).filter(|r| !r.is_empty()).into_iter().collect())
    } else {
        service.get_last_aggregate_datastreams(realm, device_id, interface, query.count, token)
    }
}

/// Print pages as they arrive, stopping once `limit` samples are shown
#[cfg(feature = "cli")]
fn stream_pages<T: JsonTransport + ?Sized>(
    paginator: &mut DatastreamPaginator<'_, T>,
    limit: Option<usize>,
    mut print: impl FnMut(&[TimestampedValue]),
) -> appenginelib::Result<usize> {
    let limit = limit.filter(|l| *l > 0);
    let mut printed = 0;

    while paginator.has_next_page() {
        let mut page = paginator.get_next_page()?;
        log::debug!("fetched page of {} samples", page.len());

        if let Some(limit) = limit {
            page.truncate(limit - printed);
        }
        print(&page);
        printed += page.len();

        if limit.is_some_and(|limit| printed >= limit) {
            break;
        }
    }

    Ok(printed)
}

/// Parse an RFC3339 instant or a relative time spec (e.g. "30m", "2h", "1d")
#[cfg(feature = "cli")]
fn parse_time_spec(spec: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, AppEngineError> {
    let spec = spec.trim();
    let invalid = || AppEngineError::InvalidInput(format!("Invalid time spec: {}", spec));

    if let Ok(instant) = appenginelib::tree::parse_instant(spec) {
        return Ok(instant);
    }

    let unit_start = spec.char_indices().last().map(|(i, _)| i).unwrap_or(0);
    let (amount, unit) = spec.split_at(unit_start);
    let amount: i64 = amount.parse().map_err(|_| invalid())?;
    let offset = match unit {
        "s" | "S" => Duration::try_seconds(amount),
        "m" | "M" => Duration::try_minutes(amount),
        "h" | "H" => Duration::try_hours(amount),
        "d" | "D" => Duration::try_days(amount),
        _ => None,
    }
    .ok_or_else(invalid)?;

    now.checked_sub_signed(offset).ok_or_else(invalid)
}

#[cfg(feature = "cli")]
fn format_timestamp(instant: &DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

#[cfg(feature = "cli")]
fn print_samples_header(path: &str) {
    println!("{}", format!("═══ {} ═══", path).cyan().bold());
}

#[cfg(feature = "cli")]
fn print_samples(samples: &[TimestampedValue]) {
    for sample in samples {
        println!(
            "  {} {}",
            format_timestamp(&sample.timestamp).cyan(),
            sample.value.to_string().green()
        );
    }
}

#[cfg(feature = "cli")]
fn print_device_details(details: &DeviceDetails) {
    println!("{}", "═══ Device ═══".cyan().bold());
    println!("  {} {}", "ID:".white().bold(), details.id.yellow());
    for (key, alias) in &details.aliases {
        println!("  {} {} = {}", "Alias:".white().bold(), key, alias.yellow());
    }
    let status = if details.connected {
        "connected".green()
    } else {
        "disconnected".red()
    };
    println!("  {} {}", "Status:".white().bold(), status);
    if let Some(last) = &details.last_connection {
        println!("  {} {}", "Last Connection:".white().bold(), format_timestamp(last).cyan());
    }
    if let Some(last) = &details.last_disconnection {
        println!("  {} {}", "Last Disconnection:".white().bold(), format_timestamp(last).cyan());
    }
    if let Some(ip) = &details.last_seen_ip {
        println!("  {} {}", "Last Seen IP:".white().bold(), ip.magenta());
    }
    println!(
        "  {} {} messages, {} bytes",
        "Received:".white().bold(),
        details.total_received_msgs.to_string().green(),
        details.total_received_bytes.to_string().green()
    );
    if !details.introspection.is_empty() {
        println!("  {}", "Introspection:".white().bold());
        for (name, version) in &details.introspection {
            println!("    {} {} v{}.{}", "▶".green(), name, version.major, version.minor);
        }
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI features not enabled. Please compile with --features cli");
    std::process::exit(1);
}
