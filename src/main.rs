//! CLI interface for airfare-client

use airfare_client::logging::{init_file_logging, init_stderr_logging};
use airfare_client::{
    get_price_forecast, Action, ActionToken, BannerLevel, City, ClientConfig, DateRange, FareClient, Forecast,
    ForecastChart, Notice, Outcome, ResultView, Route, Session, CURRENCY, DEFAULT_BASE_URL,
};
use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "airfare")]
#[command(about = "Search airfares and plot route price forecasts")]
#[command(version)]
pub struct Cli {
    /// Base URL of the fare service
    #[arg(long, env = "AIRFARE_API_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub base_url: String,
    /// Timeout for each remote call, in seconds
    #[arg(long, default_value = "10", global = true)]
    pub timeout_secs: u64,
    /// Directory forecast charts are written to
    #[arg(long, default_value = "charts", global = true)]
    pub chart_dir: PathBuf,
    /// Directory for interactive session log files
    #[arg(long, default_value = "logs", global = true)]
    pub log_dir: PathBuf,
    /// Log to stderr at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search for flights
    Search {
        /// Departure city
        #[arg(short, long)]
        from: City,
        /// Destination city
        #[arg(short, long)]
        to: City,
        /// Departure date (YYYY-MM-DD)
        #[arg(short, long)]
        depart: NaiveDate,
        /// Return date (YYYY-MM-DD)
        #[arg(short, long)]
        return_date: NaiveDate,
        /// Output file for JSON results
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fetch the price forecast for a route and chart it
    Forecast {
        /// Departure city
        #[arg(short, long)]
        from: City,
        /// Destination city
        #[arg(short, long)]
        to: City,
        /// Chart file (defaults to a file under --chart-dir)
        #[arg(short, long)]
        chart: Option<PathBuf>,
    },
    /// List supported cities
    Cities,
    /// Run an interactive search session
    Interactive,
}

/// One line typed in the interactive session
#[derive(Debug, PartialEq)]
enum Command {
    Search { route: Route, dates: DateRange },
    Forecast(ActionToken),
    Show,
    Dismiss,
    Cities,
    Help,
    Quit,
}

const HELP: &str = "\
Commands:
  search <from> <to> <YYYY-MM-DD> <YYYY-MM-DD>   search flights (cities as slugs, e.g. hong-kong)
  forecast <token> | <token>                     plot the price forecast for a listed flight (e.g. fc-12, fc2-12)
  show                                           show the current results again
  dismiss                                        dismiss the current notice
  cities                                         list supported cities
  help                                           show this help
  quit                                           leave the session";

fn parse_command(line: &str) -> Result<Command, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["search", from, to, depart, ret] => {
            let city = |s: &str| s.parse::<City>().map_err(|e| e.to_string());
            let date = |s: &str| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("invalid date {:?}: {}", s, e))
            };
            Ok(Command::Search {
                route: Route::new(city(*from)?, city(*to)?),
                dates: DateRange::new(date(*depart)?, date(*ret)?),
            })
        }
        ["search", ..] => Err("usage: search <from> <to> <depart> <return>".to_string()),
        ["forecast", token] | [token] if token.starts_with("fc") => {
            ActionToken::parse(token).map(Command::Forecast).ok_or_else(|| format!("invalid token {:?}", token))
        }
        ["show"] => Ok(Command::Show),
        ["dismiss"] => Ok(Command::Dismiss),
        ["cities"] => Ok(Command::Cities),
        ["help"] | ["?"] => Ok(Command::Help),
        ["quit"] | ["exit"] => Ok(Command::Quit),
        _ => Err(format!("unrecognised command {:?}, type `help`", line.trim())),
    }
}

fn print_view(view: &ResultView<'_>) {
    let banner = view.banner();
    let marker = match banner.level {
        BannerLevel::Success => "[ok]",
        BannerLevel::Info => "[info]",
        BannerLevel::Warning => "[warn]",
    };
    println!("{} {}", marker, banner.message);
    for row in view {
        println!("  [{}] {}", row.token, row.text);
    }
}

fn print_notice(notice: &Notice) {
    eprintln!("[error] {} (type `dismiss` to clear)", notice.message);
}

fn chart_path(chart_dir: &Path, route: &Route) -> PathBuf {
    chart_dir.join(format!(
        "forecast-{}-{}.svg",
        route.departure().slug(),
        route.destination().slug()
    ))
}

fn show_forecast(route: &Route, forecast: &Forecast, path: &Path) -> Result<()> {
    let chart = ForecastChart::new(route);
    println!("{}:", chart.title());
    for point in forecast.series.points() {
        println!("  {}  {} {}", point.date.format("%d.%m.%Y"), point.price, CURRENCY);
    }
    if !forecast.rejected.is_empty() {
        println!("  ({} entries with malformed dates skipped)", forecast.rejected.len());
    }

    chart.write_svg(&forecast.series, path)?;
    println!("Chart saved to {}", path.display());
    Ok(())
}

async fn run_interactive(client: FareClient, chart_dir: &Path) -> Result<()> {
    let mut session = Session::new(client);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", HELP);
    loop {
        print!("> ");
        std::io::Write::flush(&mut std::io::stdout())?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                eprintln!("{}", message);
                continue;
            }
        };

        let action = match command {
            Command::Search { route, dates } => Action::Submit { route, dates },
            Command::Forecast(token) => Action::DrillDown(token),
            Command::Dismiss => Action::Dismiss,
            Command::Show => {
                match session.current_view() {
                    Some(view) => print_view(&view),
                    None => println!("No results yet"),
                }
                if let Some(notice) = session.notice() {
                    print_notice(notice);
                }
                continue;
            }
            Command::Cities => {
                for city in City::all() {
                    println!("  {:<12} {}", city.slug(), city);
                }
                continue;
            }
            Command::Help => {
                println!("{}", HELP);
                continue;
            }
            Command::Quit => break,
        };

        match session.dispatch(action).await {
            Outcome::Results { .. } => {
                if let Some(view) = session.current_view() {
                    print_view(&view);
                }
            }
            Outcome::Forecast { route, forecast } => {
                if let Err(e) = show_forecast(&route, &forecast, &chart_path(chart_dir, &route)) {
                    eprintln!("[error] {}", e);
                }
            }
            Outcome::Notice(notice) => {
                // Whatever was listed before is still valid
                if let Some(view) = session.current_view() {
                    print_view(&view);
                }
                print_notice(&notice);
            }
            Outcome::Dismissed => println!("Notice dismissed"),
        }
    }

    Ok(())
}

/// Only the interactive session owns the terminal long enough to need a log file
fn logs_to_file(command: &Commands) -> bool {
    matches!(command, Commands::Interactive)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if logs_to_file(&cli.command) {
        init_file_logging(&cli.log_dir)?;
    } else {
        init_stderr_logging(cli.verbose)?;
    }

    let config = ClientConfig {
        base_url: cli.base_url.clone(),
        timeout: Duration::from_secs(cli.timeout_secs),
    };
    let client = FareClient::with_config(config.clone())?;

    match cli.command {
        Commands::Search {
            from,
            to,
            depart,
            return_date,
            output,
        } => {
            let mut session = Session::new(client);
            let action = Action::Submit {
                route: Route::new(from, to),
                dates: DateRange::new(depart, return_date),
            };

            println!("Searching for flights...");
            match session.dispatch(action).await {
                Outcome::Notice(notice) => {
                    eprintln!("Error searching for flights: {}", notice.message);
                    std::process::exit(1);
                }
                _ => {
                    if let (Some(view), Some(result)) = (session.current_view(), session.store().get()) {
                        print_view(&view);
                        if let Some(output_file) = output {
                            std::fs::write(&output_file, serde_json::to_string_pretty(result)?)?;
                            println!("Results saved to {}", output_file.display());
                        }
                    }
                }
            }
        }
        Commands::Forecast { from, to, chart } => {
            let route = Route::new(from, to);
            let forecast = get_price_forecast(config, route).await?;
            let path = chart.unwrap_or_else(|| chart_path(&cli.chart_dir, &route));
            show_forecast(&route, &forecast, &path)?;
        }
        Commands::Cities => {
            for city in City::all() {
                println!("{:<12} {}", city.slug(), city);
            }
        }
        Commands::Interactive => run_interactive(client, &cli.chart_dir).await?,
    }

    Ok(())
}
