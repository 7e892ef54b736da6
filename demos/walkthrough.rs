//! Walk through issuing, displaying, validating and settling capture lines.
//!
//! Run with `RUST_LOG=debug cargo run --example walkthrough` to see the
//! codec and service logs.
use capture_line::{
    CaptureConfig, Codec, LineRequest,
    line::{breakdown, decode, format_display},
    service::LineService,
    store::SledStore,
};
use chrono::Utc;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = CaptureConfig::from_env()?;
    let codec = Codec::new(config.clone());
    let mut rng = rand::thread_rng();

    // traffic fine against a licence plate
    let request = LineRequest::new()
        .set_entity("09")
        .set_concept("01")
        .set_reference("12345678")
        .set_amount(1500.00)
        .set_validity_days(15);
    let line = codec.encode(&request, Utc::now(), &mut rng)?;

    println!("raw:       {line}");
    println!("formatted: {}", line.formatted());
    if let Some(parts) = breakdown(line.as_str()) {
        println!("entity:    {} ({})", parts.entity, config.entity_name(&parts.entity).unwrap_or("?"));
        println!("concept:   {} ({})", parts.concept, config.concept_name(&parts.concept).unwrap_or("?"));
        println!("reference: {}", parts.reference);
        println!("amount:    ${:.2} ({} cents)", parts.amount, parts.amount_cents);
        match parts.validity_date {
            Some(date) => println!("validity:  {} ({date})", parts.validity),
            None => println!("validity:  {}", parts.validity),
        }
        println!("check:     {}", parts.check_digit);
    }

    let tampered = format!("{}{}", line.base(), (line.check_digit() + 1) % 10);
    match decode(&tampered) {
        Ok(_) => println!("{} unexpectedly valid", format_display(&tampered)),
        Err(err) => println!("{} rejected: {err}", format_display(&tampered)),
    }

    // the same flow against a throwaway ledger
    let temp_dir = tempfile::tempdir()?;
    let db = Arc::new(sled::open(temp_dir.path().join("walkthrough.db"))?);
    let service = LineService::new(SledStore::new(db)?, config);

    let issued = service.issue(LineRequest::new().set_reference("ABC-123").set_amount(2500.50), None)?;
    println!("issued {} expiring {}", format_display(&issued.code), issued.expires_on());

    service.validate_for_payment(&issued.code)?;
    let used = service.mark_used(&issued.code, Some("SPEI-000123".into()), Some("BBVA".into()))?;
    println!("{} is now {}", used.code, used.state);

    if let Err(err) = service.mark_used(&issued.code, None, None) {
        println!("second payment refused: {err}");
    }

    let batch = service.issue_batch(Some(5), 0.0)?;
    println!("pre-generated {} lines, {} available", batch.len(), service.list_available(None)?.len());

    Ok(())
}
