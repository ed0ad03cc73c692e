//! One-shot maintenance commands run against the configured database.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use crate::access::Permission;
use crate::core::{blog, orders, products, users};
use crate::csv_exchange::{self, OrderRow, ProductRow};
use crate::error::AppError;
use crate::AppState;

const DEMO_ADDRESS: &str = "ul Gogolya,d 12";
const DEMO_PROMOCODE: &str = "promo10";
const DEMO_ARTICLE: &str = "about_animals";
const DEMO_ARTICLE_CONTENT: &str = "animals";

fn demo_article_pub_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 10, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

fn parse_permission(codename: &str) -> Result<Permission, String> {
    Permission::from_codename(codename).ok_or_else(|| {
        let known: Vec<&str> = Permission::ALL.iter().map(|perm| perm.codename()).collect();
        format!("unknown permission; expected one of {}", known.join(", "))
    })
}

#[derive(Parser)]
#[command(name = "shopsite", about = "Shop and blog web service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Entity {
    Products,
    Orders,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP service.
    Serve,
    /// Get or create the demo order for a user and put every product in it.
    CreateOrder {
        #[arg(long, default_value = "admin")]
        username: String,
    },
    /// Put every product into the first order.
    UpdateOrder,
    /// Product count and summed price per order.
    Agg,
    /// Get or create the demo article and tag it with every tag.
    CreateArticles {
        #[arg(long)]
        author_id: i32,
        #[arg(long)]
        category_id: i32,
    },
    /// Publish every article whose title mentions animals.
    UpdateArticles {
        #[arg(long, default_value = "2023-06-01")]
        pub_date: NaiveDate,
    },
    /// Grant a named permission to a user.
    Grant {
        #[arg(long)]
        username: String,
        #[arg(long, value_parser = parse_permission)]
        perm: Permission,
    },
    /// Bulk import a CSV file; all rows or none.
    ImportCsv {
        #[arg(long, value_enum)]
        entity: Entity,
        #[arg(long)]
        file: PathBuf,
        /// Owner of imported products.
        #[arg(long)]
        username: Option<String>,
    },
}

async fn user_by_name(state: &AppState, username: &str) -> Result<i32, AppError> {
    users::find_by_username(state.db.as_ref(), username)
        .await?
        .map(|found| found.id)
        .ok_or_else(|| AppError::NotFound(format!("No user named {username}.")))
}

/// Runs any command but `serve`.
pub async fn run(state: &AppState, command: Command) -> Result<(), AppError> {
    let db = state.db.as_ref();
    match command {
        Command::Serve => Ok(()),
        Command::CreateOrder { username } => {
            println!("Create order with products");
            let user_id = user_by_name(state, &username).await?;
            let ((order, linked), created) =
                orders::ensure_order_with_all_products(db, user_id, DEMO_ADDRESS, DEMO_PROMOCODE)
                    .await?;
            info!(order_id = order.id, created, products = linked.len(), "Demo order ready");
            println!("Order created");
            Ok(())
        }
        Command::UpdateOrder => {
            println!("Update order");
            match orders::attach_all_to_first(db).await? {
                Some((order, linked)) => {
                    let ids: Vec<String> = linked.iter().map(|p| p.id.to_string()).collect();
                    println!("added products [{}] to order #{}", ids.join(", "), order.id);
                }
                None => println!("no order found"),
            }
            Ok(())
        }
        Command::Agg => {
            println!("Start demo aggregate");
            for totals in orders::totals(db).await? {
                println!(
                    "Order #{} with #{} products worth #{}",
                    totals.order_id, totals.products_count, totals.total
                );
            }
            println!("Done");
            Ok(())
        }
        Command::CreateArticles {
            author_id,
            category_id,
        } => {
            println!("Create articles with tags");
            let (article, created) = blog::ensure_article_with_all_tags(
                db,
                DEMO_ARTICLE,
                DEMO_ARTICLE_CONTENT,
                demo_article_pub_date(),
                author_id,
                category_id,
            )
            .await?;
            info!(article_id = article.id, created, "Demo article ready");
            println!("Done");
            Ok(())
        }
        Command::UpdateArticles { pub_date } => {
            println!("Bulk update articles");
            let at = Utc.from_utc_datetime(&pub_date.and_time(chrono::NaiveTime::MIN));
            let updated = blog::publish_matching(db, "animals", at).await?;
            println!("{updated}");
            println!("Done");
            Ok(())
        }
        Command::Grant { username, perm } => {
            let user_id = user_by_name(state, &username).await?;
            users::grant(db, user_id, perm).await?;
            info!(user_id, codename = perm.codename(), "Permission granted");
            println!("Granted {} to {username}", perm.codename());
            Ok(())
        }
        Command::ImportCsv {
            entity,
            file,
            username,
        } => {
            let bytes = tokio::fs::read(&file).await?;
            let text = csv_exchange::decode(&bytes, None)?;
            match entity {
                Entity::Products => {
                    let username = username.ok_or_else(|| {
                        AppError::BadRequest("--username is required for products".to_owned())
                    })?;
                    let owner = user_by_name(state, &username).await?;
                    let rows: Vec<ProductRow> = csv_exchange::read_records(&text)?;
                    let created = products::import_rows(db, owner, rows).await?;
                    println!("Imported {} product(s)", created.len());
                }
                Entity::Orders => {
                    let rows: Vec<OrderRow> = csv_exchange::read_records(&text)?;
                    let created = orders::import_rows(db, rows).await?;
                    println!("Imported {} order(s)", created.len());
                }
            }
            Ok(())
        }
    }
}
