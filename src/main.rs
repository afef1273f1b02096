// flight-ticker: search several flight providers at once and print the
// best offers. Provider credentials come from the environment.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{ArgGroup, Parser};
use flight_ticker::{
    build_providers, AirportGroups, CabinClass, DateSpec, EngineConfig, Passengers,
    ProviderSettings, RankedResult, RankingMode, SearchEngine, SearchError, SearchRequest,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "flight-ticker", version, about = "Multi-provider flight search")]
#[command(group(ArgGroup::new("departure").required(true).args(["depart", "month", "range", "around"])))]
#[command(group(ArgGroup::new("inbound").args(["return_date", "return_month", "return_range", "return_around"])))]
struct Args {
    /// Origin airport or metro group (GRU, SAO, ...)
    #[arg(long)]
    from: String,

    /// Destination airport or metro group
    #[arg(long)]
    to: String,

    /// Fixed departure date (YYYY-MM-DD)
    #[arg(long)]
    depart: Option<String>,

    /// Every day of a month (YYYY-MM)
    #[arg(long)]
    month: Option<String>,

    /// Inclusive date range (YYYY-MM-DD..YYYY-MM-DD)
    #[arg(long)]
    range: Option<String>,

    /// A date plus --flex-days on either side
    #[arg(long)]
    around: Option<String>,

    #[arg(long = "return")]
    return_date: Option<String>,

    #[arg(long)]
    return_month: Option<String>,

    #[arg(long)]
    return_range: Option<String>,

    #[arg(long)]
    return_around: Option<String>,

    #[arg(long, default_value_t = 3)]
    flex_days: u32,

    #[arg(long, default_value_t = 1)]
    adults: u32,

    #[arg(long, default_value_t = 0)]
    children: u32,

    #[arg(long, default_value_t = 0)]
    infants: u32,

    #[arg(long, default_value_t = 2)]
    max_stops: u32,

    /// economy, premium-economy, business or first
    #[arg(long)]
    cabin: Option<String>,

    #[arg(long)]
    max_price: Option<f64>,

    /// Only offers known to include a checked bag
    #[arg(long)]
    checked_bag: bool,

    #[arg(long)]
    currency: Option<String>,

    #[arg(long)]
    locale: Option<String>,

    /// Skip split-ticket composition
    #[arg(long)]
    no_split: bool,

    /// Rank by price only instead of the weighted score
    #[arg(long)]
    price_only: bool,

    #[arg(long, default_value_t = 10)]
    limit: usize,

    /// Engine configuration as JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the ranked result as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn departure(&self) -> Result<DateSpec> {
        date_spec(
            self.depart.as_deref(),
            self.month.as_deref(),
            self.range.as_deref(),
            self.around.as_deref(),
            self.flex_days,
        )?
        .context("a departure date is required")
    }

    fn inbound(&self) -> Result<Option<DateSpec>> {
        date_spec(
            self.return_date.as_deref(),
            self.return_month.as_deref(),
            self.return_range.as_deref(),
            self.return_around.as_deref(),
            self.flex_days,
        )
    }

    fn request(&self) -> Result<SearchRequest> {
        let mut request = SearchRequest::new(&self.from, &self.to, self.departure()?);
        request.return_date = self.inbound()?;
        request.passengers = Passengers {
            adults: self.adults,
            children: self.children,
            infants: self.infants,
        };
        request.max_stops = self.max_stops;
        request.cabin = self
            .cabin
            .as_deref()
            .map(str::parse::<CabinClass>)
            .transpose()?;
        request.currency = self.currency.clone();
        request.locale = self.locale.clone();
        request.max_price = self.max_price;
        request.checked_bag = self.checked_bag;
        request.split_tickets = !self.no_split;
        request.limit = self.limit;
        request.ranking = if self.price_only {
            RankingMode::PriceOnly
        } else {
            RankingMode::Weighted
        };
        Ok(request)
    }

    fn engine_config(&self) -> Result<EngineConfig> {
        match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                Ok(EngineConfig::from_json(&json)?)
            }
            None => Ok(EngineConfig::default()),
        }
    }
}

fn date_spec(
    fixed: Option<&str>,
    month: Option<&str>,
    range: Option<&str>,
    around: Option<&str>,
    flex_days: u32,
) -> Result<Option<DateSpec>> {
    if let Some(date) = fixed {
        return Ok(Some(DateSpec::Fixed(DateSpec::parse_date(date)?)));
    }
    if let Some(month) = month {
        return Ok(Some(DateSpec::parse_month(month)?));
    }
    if let Some(range) = range {
        let Some((start, end)) = range.split_once("..") else {
            bail!("range must look like 2025-06-01..2025-06-10, got {}", range);
        };
        return Ok(Some(DateSpec::Range {
            start: DateSpec::parse_date(start)?,
            end: DateSpec::parse_date(end)?,
        }));
    }
    if let Some(date) = around {
        return Ok(Some(DateSpec::Around {
            date: DateSpec::parse_date(date)?,
            days: flex_days,
        }));
    }
    Ok(None)
}

fn print_table(result: &RankedResult) {
    println!(
        "{:>3}  {:>10}  {:<12}  {:<22}  {:<22}  {:>5}  {:>7}  {:>3}  {}",
        "#", "price", "provider", "outbound", "inbound", "stops", "hours", "bag", "link"
    );
    for (i, ranked) in result.offers.iter().enumerate() {
        let offer = &ranked.offer;
        let leg_label = |date: NaiveDate, flights: &[String]| format!("{} {}", date, flights.join("/"));
        println!(
            "{:>3}  {:>10}  {:<12}  {:<22}  {:<22}  {:>5}  {:>7.1}  {:>3}  {}",
            i + 1,
            format!("{:.2} {}", offer.price, offer.currency),
            offer.attribution.to_string(),
            leg_label(offer.outbound.departure_date(), &offer.outbound.flight_numbers),
            offer
                .inbound
                .as_ref()
                .map(|l| leg_label(l.departure_date(), &l.flight_numbers))
                .unwrap_or_else(|| "-".to_string()),
            offer.total_stops(),
            offer.total_duration_minutes() as f64 / 60.0,
            match offer.baggage_included {
                Some(true) => "yes",
                Some(false) => "no",
                None => "?",
            },
            offer.checkout_link()
        );
    }

    if let Some(cheapest) = result.cheapest() {
        println!("\ncheapest: {:.2} {} via {}", cheapest.price, cheapest.currency, cheapest.attribution);
    }

    let stats = &result.stats;
    println!(
        "{} queries ({} failed, {} timed out), {} offers, {} split, {} duplicates, {} ms",
        stats.queries_issued,
        stats.queries_failed,
        stats.queries_timed_out,
        stats.offers_collected,
        stats.split_offers_composed,
        stats.duplicates_removed,
        stats.elapsed_ms
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flight_ticker=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let request = args.request()?;
    let config = args.engine_config()?;

    let providers = build_providers(&ProviderSettings::from_env())?;
    if providers.is_empty() {
        bail!("no provider credentials found; set TEQUILA_API_KEY or AMADEUS_CLIENT_ID/AMADEUS_CLIENT_SECRET");
    }

    let engine = SearchEngine::new(config, providers, AirportGroups::builtin())?;
    let result = match engine.run_search(request).await {
        Ok(result) => result,
        Err(e @ SearchError::NoOffersFound { .. }) if e.is_total_provider_failure() => {
            bail!("all providers failed: {}", e);
        }
        Err(e @ SearchError::NoOffersFound { .. }) => {
            // Providers answered; nothing matched
            println!("no offers found: {}", e);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_table(&result);
    }
    Ok(())
}
