//! Offline VNPay signing and verification using the loaded configuration.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;

use flower_shop_api::{
    config,
    gateway::{ParameterSet, PaymentRequest, VnPayGateway, SECURE_HASH},
};

#[derive(Parser)]
#[command(
    name = "vnpay-tool",
    about = "Sign VNPay payment URLs and verify callback queries",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a signed payment URL
    Sign(SignArgs),
    /// Check the signature of a callback query string
    Verify(VerifyArgs),
}

#[derive(Args)]
struct SignArgs {
    #[arg(long)]
    order_id: i32,
    /// Amount in major currency units
    #[arg(long)]
    amount: Decimal,
    #[arg(long)]
    info: String,
    /// Client IP; the configured default is used when omitted
    #[arg(long)]
    ip: Option<String>,
}

#[derive(Args)]
struct VerifyArgs {
    /// Raw query string, with or without the leading `?` or URL prefix
    #[arg(long)]
    query: String,
}

#[derive(Serialize)]
struct VerifyOutput {
    valid: bool,
    response_code: Option<String>,
    txn_ref: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config().context("failed to load configuration")?;
    let gateway = VnPayGateway::new(cfg.vnpay);

    match cli.command {
        Commands::Sign(args) => {
            let request = PaymentRequest {
                order_id: args.order_id,
                amount: args.amount,
                order_info: args.info,
                client_ip: args.ip,
            };
            let url = gateway
                .build_payment_url(&request)
                .context("failed to build payment url")?;
            if cli.json {
                print_json(&serde_json::json!({ "payment_url": url }))?;
            } else {
                println!("{}", url);
            }
        }
        Commands::Verify(args) => {
            let params = signed_query(&args.query)?;
            let output = VerifyOutput {
                valid: gateway.verify_callback(&params),
                response_code: params
                    .get(flower_shop_api::gateway::vnpay::fields::RESPONSE_CODE)
                    .map(str::to_string),
                txn_ref: params
                    .get(flower_shop_api::gateway::vnpay::fields::TXN_REF)
                    .map(str::to_string),
            };
            if cli.json {
                print_json(&output)?;
            } else if output.valid {
                println!("signature valid");
            } else {
                println!("signature INVALID");
            }
            if !output.valid {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Decodes the gateway fields of a query string. Shop parameters such as
/// `orderId` are dropped because the gateway does not sign them.
fn parse_query(raw: &str) -> ParameterSet {
    let query = raw.split_once('?').map_or(raw, |(_, q)| q);
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect::<ParameterSet>()
        .with_prefix(flower_shop_api::gateway::vnpay::FIELD_PREFIX)
}

/// Parses a callback query that must carry a signature.
fn signed_query(raw: &str) -> Result<ParameterSet> {
    let params = parse_query(raw);
    if params.is_empty() {
        bail!("query carries no vnp_ fields");
    }
    if !params.contains(SECURE_HASH) {
        bail!("query is not signed: {} is missing", SECURE_HASH);
    }
    Ok(params)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
