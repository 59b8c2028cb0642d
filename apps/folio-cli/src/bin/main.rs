use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use folio_chat::session::SessionStore;
use folio_cli::{init_tracing, load_config, App};

const HELP: &str = "Commands: reset | refresh | history | help | quit";

fn prompt() -> std::io::Result<()> {
    print!("\nYou: ");
    std::io::stdout().flush()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = load_config()?;
    let app = App::open(&config).await?;

    if !app.documents_dir.exists() {
        std::fs::create_dir_all(&app.documents_dir)?;
        println!("📁 Created {} - add .txt, .md, .pdf or .docx files about yourself there.", app.documents_dir.display());
    }
    match app.index.load_or_build(&app.documents_dir).await? {
        Some(report) => println!("📚 Indexed {} chunks from {} documents", report.chunks, report.documents),
        None => println!("📚 Using existing index ({} chunks)", app.index.len().await?),
    }

    let sessions = SessionStore::from_settings(app.engine_factory()?, &app.settings.sessions);
    let (mut session_id, mut session) = sessions.create();

    println!("\n💬 Chat with {}'s portfolio assistant", app.settings.chat.subject);
    println!("{HELP}");
    prompt()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => {}
            "quit" | "exit" | "bye" => break,
            "help" => println!("{HELP}"),
            "reset" => {
                sessions.remove(&session_id);
                (session_id, session) = sessions.create();
                println!("🔄 Started a new conversation");
            }
            "refresh" => match app.index.refresh(&app.documents_dir).await {
                Ok(report) => println!("✅ Rebuilt index: {} chunks from {} documents ({} skipped)", report.chunks, report.documents, report.skipped),
                Err(e) => eprintln!("❌ Refresh failed, keeping the previous index: {e}"),
            },
            "history" => {
                let engine = session.lock().await;
                println!("{}", serde_json::to_string_pretty(engine.history())?);
            }
            message => {
                // Idle sessions expire; pick up a fresh one transparently.
                (session_id, session) = sessions.get_or_create(Some(session_id));
                let result = session.lock().await.chat(message).await;
                match result {
                    Ok(answer) => println!("\nAssistant: {answer}"),
                    Err(e) => eprintln!("❌ {e}"),
                }
            }
        }
        prompt()?;
    }
    println!("\n👋 Goodbye!");
    Ok(())
}
