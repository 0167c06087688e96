use dotenv::dotenv;
use std::error::Error;
use std::sync::Arc;
use testcase_ledger::llm::prompts::{feedback_prompt, SYSTEM_PROMPT_PLANNER};
use testcase_ledger::*;

// Stand-in for the crawler's site insights.
const SITE_INSIGHTS: &str = r#"
Target: https://demo.example.com/login
Page title: Sign in
Inputs: email (type=email, required), password (type=password, required, minlength=8)
Buttons: "Sign in", "Forgot password?"
After a successful login the user lands on /dashboard.
Three failed attempts lock the account for 15 minutes.
"#;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn Error>> {
    dotenv().ok();
    println!("🚀 Starting test case ledger session...");

    let config = LedgerConfig::from_env()?;
    let client = GroqClient::from_config(&config)?;
    println!("🤖 Using model {}", client.model());
    let service: Arc<dyn GenerationService> = Arc::new(client);

    let (tx, mut rx) = tokio::sync::mpsc::channel(32);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            println!("   … {:?}", event);
        }
    });

    let ledger = Ledger::from_config(&config).with_progress(tx);

    // 1. First generation round
    let instruction = format!(
        "Instruction: Test the login page.\n\nSite insights:\n{}",
        SITE_INSIGHTS
    );
    let generated = service.generate(SYSTEM_PROMPT_PLANNER, &instruction).await?;
    let report = ledger.seed(&clean_response(&generated)).await?;
    println!("✅ Generated {} test cases.", report.records);
    for warning in &report.warnings {
        println!("⚠️  {}", warning);
    }

    // 2. Feedback round: add cases after the last ID
    let last_id = ledger
        .records()
        .await
        .last()
        .map(|record| record.id().to_string());
    let feedback = feedback_prompt(
        "Add cases for the account lockout after three failed attempts",
        last_id.as_deref(),
    );
    let more = service.generate(SYSTEM_PROMPT_PLANNER, &feedback).await?;
    let report = ledger.append(&clean_response(&more)).await?;
    println!("✅ Ledger now holds {} test cases.", report.records);

    // 3. Edit one field of the first record
    let first_id = ledger
        .records()
        .await
        .first()
        .map(|record| record.id().to_string())
        .ok_or("no test cases were generated")?;
    let editor = FieldEditor::from_config(service.clone(), &config);

    match ledger
        .edit(&editor, &first_id, "Raise the priority to High")
        .await
    {
        Ok(outcome) => {
            println!(
                "✏️  {} '{}': '{}' -> '{}'",
                outcome.record_id, outcome.field, outcome.previous_value, outcome.new_value
            );
            println!("--- before ---\n{}", outcome.original_block);
            println!("--- after ---\n{}", outcome.updated_block);
        }
        Err(e) => println!("❌ Edit failed: {}", e),
    }

    // 4. Final export
    for path in ledger.export().await? {
        println!("💾 Exported to {}", path.display());
    }

    Ok(())
}
