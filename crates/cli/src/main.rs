//! Elecommerce CLI - Migrations and checkout testing tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! elec-cli migrate
//!
//! # Submit shipping for a cart as a guest
//! elec-cli checkout submit --cart-id 12 --first-name Ada --last-name Lovelace \
//!     --line1 "1 Main St" --city Springfield --state IL --postal-code 62701
//!
//! # Sign a webhook payload (and optionally deliver it)
//! elec-cli webhook sign --payload-file event.json --deliver http://127.0.0.1:3000/webhooks/stripe
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `checkout submit` - Send the shipping step of a checkout
//! - `webhook sign` - Produce a signed Stripe webhook delivery

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use elecommerce_checkout::ShippingForm;
use elecommerce_core::{AddressId, CartId};

mod commands;

use commands::checkout::Submitter;

#[derive(Parser)]
#[command(name = "elec-cli")]
#[command(author, version, about = "Elecommerce CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Checkout client actions
    Checkout {
        #[command(subcommand)]
        action: CheckoutAction,
    },
    /// Stripe webhook helpers
    Webhook {
        #[command(subcommand)]
        action: WebhookAction,
    },
}

#[derive(Subcommand)]
enum CheckoutAction {
    /// Submit shipping details for a cart
    Submit(SubmitArgs),
}

#[derive(Args)]
struct SubmitArgs {
    /// Storefront base URL
    #[arg(long)]
    url: Option<String>,

    /// Cart ID, sent as the idempotency key
    #[arg(long)]
    cart_id: CartId,

    /// Session token of a logged-in buyer
    #[arg(long, conflicts_with = "expired")]
    token: Option<String>,

    /// Act as a buyer whose session expired mid-checkout
    #[arg(long)]
    expired: bool,

    #[arg(long)]
    first_name: String,

    #[arg(long)]
    last_name: String,

    #[arg(long)]
    line1: String,

    #[arg(long, default_value = "")]
    line2: String,

    #[arg(long)]
    city: String,

    #[arg(long)]
    state: String,

    #[arg(long)]
    postal_code: String,

    #[arg(long, default_value = "")]
    phone: String,

    /// Save this address to the buyer's account
    #[arg(long)]
    save: bool,

    /// Saved address picked from the address book
    #[arg(long)]
    address_id: Option<AddressId>,
}

#[derive(Subcommand)]
enum WebhookAction {
    /// Sign a payload with the endpoint secret
    Sign {
        /// Endpoint secret (defaults to `STRIPE_WEBHOOK_SECRET`)
        #[arg(long)]
        secret: Option<String>,

        /// File holding the raw event JSON
        #[arg(long)]
        payload_file: PathBuf,

        /// Unix timestamp to sign with (defaults to now)
        #[arg(long)]
        timestamp: Option<i64>,

        /// POST the signed payload to this URL instead of printing the header
        #[arg(long)]
        deliver: Option<String>,
    },
}

impl SubmitArgs {
    fn submitter(&self) -> Submitter {
        match (&self.token, self.expired) {
            (_, true) => Submitter::Expired,
            (Some(token), false) => Submitter::Buyer(token.clone()),
            (None, false) => Submitter::Guest,
        }
    }

    fn form(&self) -> ShippingForm {
        ShippingForm {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            line1: self.line1.clone(),
            line2: self.line2.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            postal_code: self.postal_code.clone(),
            phone: self.phone.clone(),
            save_shipping: self.save,
            selected_address: self.address_id,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Checkout {
            action: CheckoutAction::Submit(args),
        } => {
            let form = args.form();
            commands::checkout::submit(args.url.clone(), args.cart_id, args.submitter(), &form)
                .await?;
        }
        Commands::Webhook {
            action:
                WebhookAction::Sign {
                    secret,
                    payload_file,
                    timestamp,
                    deliver,
                },
        } => {
            commands::webhook::sign(secret, &payload_file, timestamp, deliver.as_deref()).await?;
        }
    }
    Ok(())
}
