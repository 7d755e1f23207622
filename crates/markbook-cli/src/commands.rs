use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;

use markbook_core::Markbook;
use markbook_core::models::{Assignment, Question};

use crate::cli::Commands;

pub(crate) fn run_from_root(root: &Path, command: Commands) -> Result<()> {
    if let Commands::Web(args) = &command {
        let app = Markbook::new(root).context("failed to create app")?;
        return markbook_web::serve_web(app, &args.host, args.port);
    }

    let app = Markbook::new(root).context("failed to create app")?;
    match command {
        Commands::Init => {
            let seeded = seed_sample_assignment(&app)?;
            let index = app.rebuild_index(true)?;
            print_json(&serde_json::json!({
                "status": "ok",
                "root": root.display().to_string(),
                "seeded_sample": seeded,
                "assignments": index.assignments.len(),
                "subjects": index.subjects.len(),
            }))?;
        }
        Commands::Rebuild => {
            let index = app.rebuild_index(true)?;
            print_json(&index.stats())?;
        }
        Commands::List => {
            let assignments = app.list_assignments()?;
            print_json(&assignments)?;
        }
        Commands::Lookup(args) => match app.find_assignment(&args.subject, &args.name)? {
            Some(entry) => print_json(&entry)?,
            None => {
                print_json(&serde_json::json!({
                    "status": "not_found",
                    "subject": args.subject,
                    "name": args.name,
                }))?;
            }
        },
        Commands::Logs(args) => {
            let entries = app.list_request_logs(args.limit)?;
            print_json(&entries)?;
        }
        Commands::Web(_) => unreachable!("handled above"),
    }
    Ok(())
}

/// First-run convenience: a worked example the operator dashboard can show
/// immediately. Nothing is overwritten on a tree that already has it.
fn seed_sample_assignment(app: &Markbook) -> Result<bool> {
    if app
        .store
        .read_document("Mathematics", "Basic Math Test.json")
        .is_ok()
    {
        return Ok(false);
    }

    let now = Utc::now().to_rfc3339();
    let sample = Assignment {
        id: "1".to_string(),
        name: "Basic Math Test".to_string(),
        subject: "Mathematics".to_string(),
        questions: vec![
            Question {
                id: "1".to_string(),
                text: "What is 2 + 2? Explain your answer.".to_string(),
                answer: "4. The sum of 2 and 2 is 4 because combining two groups of two \
                         items gives four items in total."
                    .to_string(),
                marks: 5,
            },
            Question {
                id: "2".to_string(),
                text: "Solve for x: 2x + 3 = 7. Show your working.".to_string(),
                answer: "x = 2. Subtract 3 from both sides: 2x = 4, then divide both \
                         sides by 2: x = 2."
                    .to_string(),
                marks: 10,
            },
            Question {
                id: "3".to_string(),
                text: "What is the area of a rectangle with length 6 units and width 4 \
                       units? Explain the formula you used."
                    .to_string(),
                answer: "The area is 24 square units. Using Area = length x width, \
                         6 times 4 gives 24 square units."
                    .to_string(),
                marks: 8,
            },
        ],
        created_at: Some(now.clone()),
        updated_at: Some(now),
    };
    let serialized = serde_json::to_string_pretty(&sample)?;
    app.store
        .write_document("Mathematics", "Basic Math Test.json", &serialized)?;
    Ok(true)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
