use std::{env, path::PathBuf};

use folio_cli::{init_tracing, load_config, App};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = load_config()?;
    let args: Vec<String> = env::args().skip(1).collect();
    let mut data_dir = None;
    for arg in &args {
        match arg.as_str() {
            "--help" | "-h" => {
                println!("Usage: folio-indexer [DIR]");
                return Ok(());
            }
            a if !a.starts_with('-') => data_dir = Some(PathBuf::from(a)),
            other => {
                eprintln!("Unknown option: {other}");
                std::process::exit(1);
            }
        }
    }

    let app = App::open(&config).await?;
    let data_dir = data_dir.unwrap_or_else(|| app.documents_dir.clone());
    println!("Folio Indexer\n=============");
    println!("Documents: {}", data_dir.display());
    println!("Index:     {}", app.index_path.display());
    println!("Embedder:  {}", app.index.embedder_id());

    let report = app.index.refresh(&data_dir).await?;
    println!("\n✅ Indexing completed successfully!");
    println!("📊 {} documents, {} chunks ({} skipped) into {}", report.documents, report.chunks, report.skipped, report.collection);
    println!("\n💡 To search, use: cargo run --bin folio-search '<query>'");
    Ok(())
}
