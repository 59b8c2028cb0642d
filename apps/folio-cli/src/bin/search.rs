use std::env;

use folio_cli::{init_tracing, load_config, App};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = load_config()?;
    let args: Vec<String> = env::args().skip(1).collect();
    let mut query = None;
    let mut top_k = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-k" | "--top-k" => {
                let Some(k) = args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) else {
                    eprintln!("Error: -k requires a number");
                    std::process::exit(1);
                };
                top_k = Some(k);
                i += 1;
            }
            a if !a.starts_with('-') => query = Some(a.to_string()),
            other => {
                eprintln!("Unknown option: {other}");
                std::process::exit(1);
            }
        }
        i += 1;
    }
    let Some(query) = query else {
        eprintln!("Usage: folio-search \"<query>\" [-k N]");
        std::process::exit(1);
    };

    let app = App::open(&config).await?;
    let top_k = top_k.unwrap_or(app.settings.index.top_k);
    if app.index.is_empty().await? {
        println!("Index is empty. Run folio-indexer first.");
        return Ok(());
    }

    println!("🔍 {query}\n");
    let results = app.index.query(&query, top_k).await;
    if results.is_empty() {
        println!("No results.");
    }
    for (rank, r) in results.iter().enumerate() {
        println!("{}. [{:.3}] {}", rank + 1, r.relevance_score, r.source);
        println!("   {}\n", r.content.chars().take(200).collect::<String>().replace('\n', " "));
    }
    Ok(())
}
