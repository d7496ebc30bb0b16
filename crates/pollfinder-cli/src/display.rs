//! Human-readable cards for lookup results.
//!
//! Every subcommand prints either a JSON document (`--json`) or a card made
//! of titled sections with aligned `label value` rows.

use pollfinder_core::{DirectionsResult, ElectionsSummary, GeocodeResult, ResidentialAddress};
use pollfinder_routing::RoutingOutcome;
use serde::Serialize;

use crate::LookupReport;

const MAX_ROUTE_POINTS: usize = 10;

// ── Public API ──

/// Print `value` as pretty JSON or through the `card` renderer.
pub fn print_output<T: Serialize + ?Sized>(
    json: bool,
    value: &T,
    card: impl FnOnce(&T),
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        card(value);
    }
    Ok(())
}

pub fn print_lookup(report: &LookupReport) {
    println!("=== {} ===", report.postcode);
    println!();

    println!("Routing");
    row("territory", report.territory);
    row("route type", report.outcome.route_type());
    row("endpoint", &report.endpoint);
    if !report.addresses.is_empty() {
        println!("  addresses");
        for address in &report.addresses {
            println!("    - {address}");
        }
    }
    println!();

    match (&report.geocode, &report.geocode_error) {
        (Some(result), _) => geocode_section(result),
        (None, Some(error)) => {
            println!("Location");
            row("error", error);
            println!();
        }
        (None, None) => {}
    }

    elections_section(&report.elections);
}

pub fn print_geocode(result: &GeocodeResult) {
    geocode_section(result);
}

pub fn print_route(outcome: &RoutingOutcome, addresses: &[&ResidentialAddress]) {
    println!("Routing");
    row("route type", outcome.route_type());
    row("endpoint", outcome.endpoint());
    println!();

    if matches!(outcome, RoutingOutcome::MultipleAddresses { .. }) {
        println!("Addresses");
        for address in addresses {
            println!("  {:<26} {}", address.polling_station_id, address.address);
        }
        println!();
    }
}

pub fn print_addresses(addresses: &[String]) {
    for address in addresses {
        println!("{address}");
    }
}

pub fn print_elections(summary: &ElectionsSummary) {
    elections_section(summary);
}

pub fn print_directions(directions: &DirectionsResult) {
    println!("Directions");
    row("source", directions.source);
    if let Some(time) = &directions.walk_time {
        row("walk time", time);
    }
    row("walk distance", &directions.walk_dist);
    row("route points", directions.route.len());
    for point in directions.route.iter().take(MAX_ROUTE_POINTS) {
        println!("    {:.6}, {:.6}", point.lat, point.lon);
    }
    if directions.route.len() > MAX_ROUTE_POINTS {
        println!("    ... and {} more", directions.route.len() - MAX_ROUTE_POINTS);
    }
    println!();
}

// ── Section rendering ──

fn row(label: &str, value: impl std::fmt::Display) {
    println!("  {label:<26} {value}");
}

fn geocode_section(result: &GeocodeResult) {
    println!("Location");
    row("source", result.source);
    row("point", format!("{:.6}, {:.6}", result.point.lat, result.point.lon));
    if let Some(council) = &result.council_gss {
        row("council", council);
    }
    if !result.gss_codes.is_empty() {
        let codes: Vec<&str> = result.gss_codes.iter().map(String::as_str).collect();
        row("codes", codes.join(", "));
    }
    println!();
}

fn elections_section(summary: &ElectionsSummary) {
    println!("Elections");
    row(
        "upcoming election",
        if summary.has_election { "yes" } else { "no" },
    );
    for explanation in &summary.explanations {
        println!("  {}", explanation.title);
        println!("    {}", explanation.explanation);
    }
    println!();
}
