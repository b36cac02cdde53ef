use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use futures::{stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use sb_dispatch::{
    address_point::RedbStore, constants::DEFAULT_ADDRESS_DB_PATH, default_http_client,
    distance::distance_km, order::OrderId, restaurant::RestaurantId, AddressPointCache, ApiKey,
    AvailabilityResolver, Snapshot, YandexGeocoder,
};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct CliArgs {
    #[command(subcommand)]
    pub subcommand: Command,

    #[command(flatten)]
    pub global_opts: GlobalOpts,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    #[arg(
        short = 'k',
        long,
        env = "YANDEX_API_KEY",
        hide_env_values = true,
        global = true,
        help = "Yandex geocoder API key"
    )]
    pub api_key: Option<String>,

    #[arg(
        short = 'g',
        long,
        global = true,
        help = "Geocoder endpoint. Defaults to the public Yandex API."
    )]
    pub geocoder_endpoint: Option<String>,

    #[arg(
        short = 'd',
        long,
        env = "STARBURGER_DB",
        default_value = DEFAULT_ADDRESS_DB_PATH,
        global = true,
        help = "Address point database"
    )]
    pub db: PathBuf,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    #[clap(
        name = "geocode",
        about = "Print the coordinates of an address, geocoding it on first use"
    )]
    Geocode { address: String },

    #[clap(name = "distance", about = "Distance between two addresses in km")]
    Distance { from: String, to: String },

    #[clap(
        name = "resolve",
        about = "List the restaurants able to cook each order, nearest first"
    )]
    Resolve {
        #[command(flatten)]
        snapshot_opts: SnapshotOpts,

        #[arg(short = 'o', long, help = "Only resolve this order")]
        order: Option<OrderId>,

        #[arg(long, help = "Print JSON instead of a summary line per order")]
        json: bool,

        #[arg(
            short = 'c',
            long,
            default_value_t = 1,
            help = "Orders resolved at the same time"
        )]
        concurrency: usize,
    },

    #[clap(
        name = "assign",
        about = "Hand an order to one of its candidate restaurants and save the snapshot"
    )]
    Assign {
        #[command(flatten)]
        snapshot_opts: SnapshotOpts,

        #[arg(short = 'o', long)]
        order: OrderId,

        #[arg(short = 'r', long)]
        restaurant: RestaurantId,
    },
}

#[derive(Args, Debug, PartialEq)]
struct SnapshotOpts {
    #[arg(
        short = 's',
        long,
        help = "JSON file with restaurants, menu entries and orders"
    )]
    pub snapshot: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let cache = address_point_cache(&args.global_opts)?;

    match args.subcommand {
        Command::Geocode { address } => {
            let geocode = cache.coordinates(&address).await;
            println!("{}", json!({ "address": address, "geocode": geocode }));
        }
        Command::Distance { from, to } => {
            let from = cache.coordinates(&from).await;
            let to = cache.coordinates(&to).await;
            match distance_km(&from, &to) {
                Some(km) => println!("{:.3} km", km),
                None => println!("distance pending"),
            }
        }
        Command::Resolve {
            snapshot_opts,
            order,
            json,
            concurrency,
        } => {
            let snapshot = load_snapshot(&snapshot_opts).await?;
            let index = snapshot.menu_index();
            let orders = match order {
                Some(id) => vec![snapshot
                    .order(id)
                    .with_context(|| format!("order {id} is not in the snapshot"))?],
                None => snapshot.orders.iter().collect(),
            };
            let resolver = AvailabilityResolver::new(cache);

            let progress = ProgressBar::new(orders.len() as u64);
            progress.set_style(ProgressStyle::with_template(
                "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?);
            // `buffered` keeps the input order.
            let resolved = stream::iter(orders)
                .map(|order| resolver.resolve_order(order, &index))
                .buffered(concurrency.max(1))
                .inspect(|_| progress.inc(1))
                .collect::<Vec<_>>()
                .await;
            progress.finish_and_clear();

            if json {
                println!("{}", serde_json::to_string_pretty(&resolved)?);
            } else {
                for order in &resolved {
                    println!("#{}: {}", order.order.id, order.summary());
                }
            }
        }
        Command::Assign {
            snapshot_opts,
            order,
            restaurant,
        } => {
            let mut snapshot = load_snapshot(&snapshot_opts).await?;
            let index = snapshot.menu_index();
            let current = snapshot
                .order(order)
                .with_context(|| format!("order {order} is not in the snapshot"))?
                .clone();
            let resolved = AvailabilityResolver::new(cache)
                .resolve_order(&current, &index)
                .await;

            let target = snapshot
                .orders
                .iter_mut()
                .find(|o| o.id == order)
                .with_context(|| format!("order {order} is not in the snapshot"))?;
            target.assign_restaurant(&resolved.candidates, restaurant, Utc::now())?;
            info!(order, restaurant, status = ?target.status, "restaurant assigned");

            snapshot
                .save(&snapshot_opts.snapshot)
                .await
                .with_context(|| format!("unable to save {}", snapshot_opts.snapshot.display()))?;
        }
    }

    Ok(())
}

fn address_point_cache(opts: &GlobalOpts) -> Result<AddressPointCache> {
    let api_key = ApiKey::from_raw(opts.api_key.as_deref().unwrap_or_default())
        .context("an API key is required: pass --api-key or set YANDEX_API_KEY")?;
    let geocoder = YandexGeocoder::new(
        default_http_client()?,
        opts.geocoder_endpoint.clone(),
        api_key,
    );
    let store = RedbStore::open(&opts.db)
        .with_context(|| format!("unable to open {}", opts.db.display()))?;
    Ok(AddressPointCache::new(Arc::new(store), Arc::new(geocoder)))
}

async fn load_snapshot(opts: &SnapshotOpts) -> Result<Snapshot> {
    Snapshot::load(&opts.snapshot)
        .await
        .with_context(|| format!("unable to load {}", opts.snapshot.display()))
}
