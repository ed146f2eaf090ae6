use std::{io::Write as _, sync::Arc, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::{
    build_http_client, load_settings, CatalogEngine, ChatEvent, ChatSession, HttpCatalogGateway,
    HttpChatGateway, HttpClient, NotificationSink, Overlay, ProductDraft,
};
use shared::domain::{ChatRole, NotificationKind, Product};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "catalog", about = "Product catalog admin client")]
struct Args {
    /// Overrides the configured API base url.
    #[arg(long)]
    api_base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and print the product table, optionally filtered.
    List {
        #[arg(long, default_value = "")]
        filter: String,
    },
    /// Create a product.
    Add {
        id: String,
        desc: String,
        price: f64,
        brand: String,
        stock: i64,
    },
    /// Replace an existing product by id.
    Update {
        id: String,
        desc: String,
        price: f64,
        brand: String,
        stock: i64,
    },
    /// Delete a product (asks for confirmation unless --yes).
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
    /// Open an interactive chat about one product.
    Chat { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(base_url) = args.api_base_url {
        settings.api_base_url = base_url;
    }

    let http = build_http_client(&settings)?;
    let notifications = Arc::new(NotificationSink::new(Duration::from_millis(
        settings.notification_ttl_ms,
    )));
    let catalog_gateway = Arc::new(HttpCatalogGateway::new(
        http.clone(),
        settings.api_base_url.clone(),
    ));
    let engine = CatalogEngine::new(catalog_gateway, notifications.clone());

    match args.command {
        Command::List { filter } => {
            engine.load().await;
            engine.set_filter(&filter).await;
            print_products(&engine.filtered_view().await);
        }
        Command::Add {
            id,
            desc,
            price,
            brand,
            stock,
        } => {
            engine.load().await;
            engine.open_add().await;
            let draft = ProductDraft {
                id,
                desc,
                price,
                brand,
                stock,
            };
            if let Err(errors) = engine.submit_add(&draft).await {
                for (field, message) in errors.iter() {
                    eprintln!("{field:?}: {message}");
                }
            }
        }
        Command::Update {
            id,
            desc,
            price,
            brand,
            stock,
        } => {
            engine.load().await;
            engine.open_edit(&id).await;
            if engine.overlay().await == Overlay::None {
                eprintln!("no product with id {id}");
                return Ok(());
            }
            let draft = ProductDraft {
                id,
                desc,
                price,
                brand,
                stock,
            };
            if let Err(errors) = engine.submit_edit(&draft).await {
                for (field, message) in errors.iter() {
                    eprintln!("{field:?}: {message}");
                }
            }
        }
        Command::Delete { id, yes } => {
            engine.load().await;
            engine.request_delete(&id).await;
            if !yes && !confirm(&format!("Permanently delete product {id}?")).await? {
                engine.close_overlay().await;
                println!("cancelled");
                return Ok(());
            }
            engine.confirm_delete().await;
        }
        Command::Chat { id } => {
            engine.load().await;
            let Some(product) = engine.snapshot().await.into_iter().find(|p| p.id == id) else {
                eprintln!("no product with id {id}");
                return Ok(());
            };
            run_chat(&http, &settings.api_base_url, notifications.clone(), product).await?;
        }
    }

    if let Some(notification) = notifications.current().await {
        match notification.kind {
            NotificationKind::Success => println!("{}", notification.message),
            NotificationKind::Error => eprintln!("error: {}", notification.message),
        }
    }

    Ok(())
}

fn print_products(products: &[Product]) {
    if products.is_empty() {
        println!("No results.");
        return;
    }
    println!("{:<8} {:<28} {:>10} {:<14} {:>6}", "ID", "Description", "Price", "Brand", "Stock");
    for product in products {
        println!(
            "{:<8} {:<28} {:>10.2} {:<14} {:>6}",
            product.id, product.desc, product.price, product.brand, product.stock
        );
    }
}

async fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

async fn run_chat(
    http: &HttpClient,
    base_url: &str,
    notifications: Arc<NotificationSink>,
    product: Product,
) -> Result<()> {
    let gateway = Arc::new(HttpChatGateway::new(http.clone(), base_url));
    let session = ChatSession::new(
        gateway,
        notifications,
        product.id.clone(),
        product.desc.clone(),
        product.brand.clone(),
    );

    // Paint fragments as they arrive; committed turns close the line.
    let mut events = session.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ChatEvent::UserTurn(_) => {}
                ChatEvent::Fragment(fragment) => {
                    print!("{fragment}");
                    let _ = std::io::stdout().flush();
                }
                ChatEvent::TurnCommitted(turn) => {
                    if turn.role == ChatRole::Assistant {
                        println!();
                    }
                }
                ChatEvent::Cleared => println!("(history cleared)"),
            }
        }
    });

    println!("Chatting about {} by {} (/clear, /quit)", product.desc, product.brand);
    session.initialize().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "/quit" => break,
            "/clear" => {
                print!("Clear the chat history? [y/N] ");
                std::io::stdout().flush()?;
                if let Some(answer) = lines.next_line().await? {
                    if matches!(answer.trim(), "y" | "Y" | "yes") {
                        session.clear_history().await;
                    }
                }
            }
            text => session.send(text).await,
        }
    }

    session.abandon().await;
    printer.abort();
    Ok(())
}
