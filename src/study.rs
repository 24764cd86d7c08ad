//! Interactive study loop
//!
//! Cards are answered with y (knew it), n (missed it) or s (skip); choice
//! rounds with the number of the chosen option. End of input leaves the
//! session unfinished.

use anyhow::Result;
use std::io::{BufRead, Write};

use crate::commands::open_engine;
use crate::session::{Session, SessionItem, SessionKind, SessionStart, SessionSummary};
use crate::storage::Outcome;

enum Reply {
    Outcome(Outcome),
    Choice(usize),
    Invalid,
}

fn parse_reply(line: &str, item: &SessionItem) -> Reply {
    let line = line.trim().to_lowercase();
    match item {
        SessionItem::Card(_) => match line.as_str() {
            "y" | "yes" => Reply::Outcome(Outcome::Correct),
            "n" | "no" => Reply::Outcome(Outcome::Incorrect),
            "s" | "skip" => Reply::Outcome(Outcome::Skip),
            _ => Reply::Invalid,
        },
        _ => match line.parse::<usize>() {
            Ok(n) if n >= 1 && n <= item.choice_count() => Reply::Choice(n - 1),
            _ => Reply::Invalid,
        },
    }
}

fn print_item(session: &Session, item: &SessionItem) {
    let tracker = session.tracker();
    println!();
    println!(
        "[{}/{}] mastered {}/{}",
        tracker.processed() + 1,
        tracker.planned(),
        tracker.mastered_count(),
        tracker.unique_total()
    );

    match item {
        SessionItem::Card(card) => {
            println!("  {}", card.word.lemma);
            if let Some(pos) = &card.word.pos {
                println!("  ({})", pos);
            }
            if let Some(sentence) = card.front_sentence() {
                println!("  \"{}\"", sentence);
            }
            print!("Do you know it? [y/n/s] ");
        }
        SessionItem::Cloze(round) => {
            println!("  {}", round.prompt());
            for (i, choice) in round.choices.iter().enumerate() {
                println!("   {}. {}", i + 1, choice.lemma);
            }
            print!("Choice: ");
        }
        SessionItem::Mcq(round) => {
            if let Some(passage) = &round.question.passage {
                println!("  {}", passage);
            }
            if let Some(question) = &round.question.question {
                println!("  {}", question);
            }
            for (i, option) in round.question.options.iter().enumerate() {
                println!("   {}. {}", i + 1, option);
            }
            print!("Choice: ");
        }
    }
    let _ = std::io::stdout().flush();
}

fn print_feedback(item: &SessionItem, outcome: Outcome) {
    let word = item.word();
    match outcome {
        Outcome::Correct => println!("✅ Correct"),
        Outcome::Skip => println!("⏭  Skipped {}", word.lemma),
        Outcome::Incorrect => {
            println!("❌ The word was: {}", word.lemma);
        }
    }
    if let Some(definition) = &word.definition {
        println!("   {}", definition);
    }
    if let SessionItem::Card(card) = item {
        if !card.collocations.is_empty() {
            println!("   Collocations: {}", card.collocations.join(", "));
        }
    }
}

fn print_summary(summary: &SessionSummary) {
    println!();
    println!("Session complete ({})", summary.kind);
    println!("   Answered: {}", summary.items_total);
    println!("   Correct: {}", summary.items_correct);
    println!("   Mastered: {}/{}", summary.mastered, summary.unique_total);
    println!("   Streak: {} days", summary.snapshot.streak_days);
    println!("   XP: {}", summary.xp);
    if let Some(task) = summary.task_completed {
        println!("   Day task {} complete", task);
    }
    if let Some(zone) = summary.unlocked_zone {
        println!("   🔓 Zone {} unlocked", zone + 1);
    }
}

pub async fn run(kind: SessionKind) -> Result<()> {
    let engine = open_engine()?;

    let mut session = match engine.start_session(kind)? {
        SessionStart::Started(session) => session,
        SessionStart::NothingToDo(message) => {
            println!("{}", message);
            engine.close().await;
            return Ok(());
        }
    };
    println!("📚 {} session: {} items", kind.name(), session.items_total());

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    while let Some(item) = session.current().cloned() {
        print_item(&session, &item);

        let Some(line) = lines.next() else {
            println!();
            println!("Session left unfinished");
            engine.close().await;
            return Ok(());
        };

        let outcome = match parse_reply(&line?, &item) {
            Reply::Outcome(outcome) => {
                session.answer(outcome)?;
                outcome
            }
            Reply::Choice(choice) => session.choose(choice)?,
            Reply::Invalid => {
                println!("Please answer with y, n, s or an option number");
                continue;
            }
        };
        print_feedback(&item, outcome);
    }

    let summary = engine.finish_session(session)?;
    print_summary(&summary);

    engine.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Card;
    use crate::storage::Word;

    fn card() -> SessionItem {
        SessionItem::Card(Card {
            word: Word {
                id: 1,
                lemma: "candid".to_string(),
                pos: None,
                definition: None,
                example: None,
                image_filename: None,
            },
            sat_context: Some("Her ______ blank reply surprised the panel.".to_string()),
            collocations: vec!["candid camera".to_string()],
        })
    }

    #[test]
    fn test_card_replies() {
        assert!(matches!(parse_reply(" Y ", &card()), Reply::Outcome(Outcome::Correct)));
        assert!(matches!(parse_reply("n", &card()), Reply::Outcome(Outcome::Incorrect)));
        assert!(matches!(parse_reply("skip", &card()), Reply::Outcome(Outcome::Skip)));
        assert!(matches!(parse_reply("2", &card()), Reply::Invalid));
    }

    #[test]
    fn test_card_front_uses_filled_context_without_example() {
        let SessionItem::Card(card) = card() else {
            unreachable!()
        };
        assert_eq!(
            card.front_sentence().as_deref(),
            Some("Her candid reply surprised the panel.")
        );

        let with_example = Card {
            word: Word {
                example: Some("A candid answer.".to_string()),
                ..card.word.clone()
            },
            ..card
        };
        assert_eq!(with_example.front_sentence().as_deref(), Some("A candid answer."));
    }
}
