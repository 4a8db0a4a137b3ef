//! End-to-end demo: analyze a short novel excerpt, then query the store.
//!
//! Requires GEMINI_API_KEY. Run with:
//! `cargo run -p novel-core --example analyze_novel`

use novel_core::{CharacterStore, Pipeline, QueryAgent};
use std::sync::Arc;

const NOVEL: &str = "대장장이 김지후는 바닷가 마을에서 홀로 대장간을 지켰다. \
    그는 말수가 적었지만 손끝이 야물었다. \
    어느 봄날, 동생 김윤아가 찾아와 도시로 함께 떠나자고 졸랐다. \
    윤아는 읍내 약방에서 일하는 쾌활한 처녀였다. \
    지후는 한참을 망설이다가 화덕의 불을 껐다.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "novel_core=info".into()),
        )
        .init();

    println!("=== Novel Character Analysis ===\n");

    let model = Arc::new(gemini::Gemini::from_env()?);
    let store = Arc::new(CharacterStore::open("characters.db")?);

    // 1. Run the pipeline over the excerpt
    println!("1. Analyzing excerpt ({} chars)...", NOVEL.chars().count());
    let pipeline = Pipeline::new(model.clone(), store.clone());
    let summary = pipeline.analyze(NOVEL, Some("봄의 대장간")).await?;
    println!("   {summary}\n");

    // 2. Show what was persisted
    println!("2. Persisted characters:");
    for character in store.list()? {
        println!(
            "   {} ({})",
            character.full_name,
            character.occupation.as_deref().unwrap_or("직업 미상")
        );
    }

    // 3. Ask the query agent about one of them
    println!("\n3. Asking the query agent...");
    let agent = QueryAgent::new(model, store);
    let answer = agent.ask("저장된 인물을 모두 알려주고, 김지후에 대해 자세히 설명해줘").await?;
    println!("   ---");
    for line in answer.lines() {
        println!("   {line}");
    }
    println!("   ---");

    Ok(())
}
