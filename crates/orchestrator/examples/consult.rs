//! Childcare consultation example.
//!
//! Routes a few sample questions through the orchestrator using mock
//! specialists and prints the answer, follow-ups and diagnostics.
//!
//! Run with: cargo run -p orchestrator --example consult -- "夜泣きがひどいです"
//!
//! Configuration via .env file or environment variables:
//!   ORCHESTRATOR_STRATEGY       - keyword (default) or hybrid
//!   ORCHESTRATOR_CATALOG_FILE   - JSON responder catalog (default: built-in)
//!   ORCHESTRATOR_MAX_RETRIES    - Retries per responder (default: 2)
//!   RUST_LOG                    - Log filter (default: orchestrator=debug)

use std::env;
use std::sync::Arc;

use mock_responder::{
    DelayedResponder, EchoResponder, FailingResponder, FixedClassifier, ScriptedResponder,
    StaticResponder,
};
use orchestrator::{
    ConversationTurn, FamilyProfile, IntentClassifier, Orchestrator, Request, RequestMode,
    ResponderSet,
};
use tracing::info;

fn specialists() -> ResponderSet {
    let mut responders = ResponderSet::new();

    responders.register(
        "sleep",
        StaticResponder::new(
            "sleep-specialist",
            "夜泣きは生後3ヶ月ごろからよく見られ、成長の一過程です。\
             寝る前のルーティン(お風呂、授乳、暗い部屋)を毎日同じ順番で続けてみましょう。\n\n\
             【フォローアップ質問】\n\
             💭 寝かしつけは何時ごろにしていますか\n\
             💭 夜中に何回くらい起きますか",
        ),
    );
    responders.register(
        "nutrition",
        DelayedResponder::with_millis(
            StaticResponder::new(
                "nutrition-specialist",
                "離乳食は生後5〜6ヶ月ごろ、10倍がゆをひとさじから始めましょう。\
                 夜泣きや夜の寝つきが気になる場合は睡眠の専門家にも相談してみてください。",
            ),
            300,
        ),
    );
    responders.register(
        "health",
        ScriptedResponder::failing_first(
            "health-specialist",
            1,
            "夜泣きに発熱や咳が重なるときは水分をこまめにとらせ、ぐったりしている場合は小児科を受診してください。",
        ),
    );
    responders.register(
        "emergency_triage",
        StaticResponder::new(
            "triage",
            "けいれんや呼吸の異常があるときは、ためらわず119番に電話してください。",
        ),
    );
    responders.register("behavior", FailingResponder::new("behavior-specialist"));
    responders.register(
        "generalist",
        EchoResponder::with_prefix("子育て相談窓口です。ご相談内容を確認しました:\n"),
    );

    responders
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("orchestrator=debug")),
        )
        .init();

    let classifier: Arc<dyn IntentClassifier> =
        Arc::new(FixedClassifier::suggesting(["sleep"], 0.8, 2));
    let orchestrator = Orchestrator::from_env(specialists(), Some(classifier))?;

    let profile = FamilyProfile::new()
        .with("child_name", "はな")
        .with("child_birth_date", "2026-07-01");
    let history = vec![ConversationTurn::user(
        "最近夜によく起きます",
        chrono::Utc::now() - chrono::Duration::hours(20),
    )];

    let mut requests: Vec<Request> = env::args()
        .skip(1)
        .map(|message| Request::new(message, "demo-user", "demo-session"))
        .collect();
    if requests.is_empty() {
        requests = vec![
            Request::new("3ヶ月の子の夜泣きがひどいです", "demo-user", "demo-session")
                .with_history(history)
                .with_profile(profile),
            Request::new("離乳食はいつから始めればいいですか", "demo-user", "demo-session"),
            Request::new("子どもがけいれんしています", "demo-user", "demo-session"),
            Request::new("イヤイヤ期の対応に困っています", "demo-user", "demo-session"),
            Request::new("夜泣きについて多角的に意見がほしい", "demo-user", "demo-session")
                .with_mode(RequestMode::Parallel),
        ];
    }

    for request in requests {
        info!("Sending: {}", request.message);
        let result = orchestrator.handle(request).await;

        println!("==> {}", result.routing_path.join(" -> "));
        println!("{}", result.final_text);
        for question in &result.follow_up_questions {
            println!("  💭 {}", question);
        }
        println!("{}\n", serde_json::to_string_pretty(&result.diagnostics)?);
    }

    Ok(())
}
