use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use coursedrill_core::{AppConfig, CartCourse, OffsetOption, PracticeApi, SimError};
use coursedrill_registration::{
    AttemptOutcome, AttemptReport, EndReason, PracticeSession, RunSummary,
};

use super::render_challenge;
use crate::terminal::TerminalLauncher;

const HELP: &str = "\
Commands:
  start [60|30|15]     begin a run that many seconds before opening
  stop                 end the run
  cart                 list the courses in your cart
  captcha              show the verification code
  refresh              draw a new verification code
  submit <n> <code>    register for cart entry n
  ack                  dismiss the current warning
  summary              totals for this run
  quit";

pub async fn run(api: Arc<dyn PracticeApi>, config: &AppConfig, offset: Option<u32>) -> Result<()> {
    let session = Arc::new(PracticeSession::new(
        api,
        Arc::new(TerminalLauncher),
        &config.practice,
    ));
    let default_offset = offset.unwrap_or(config.practice.default_offset_seconds);

    session
        .on_practice_end(Arc::new(|reason: EndReason| match reason {
            EndReason::Cutoff => println!("⏰ Registration window closed. The practice run has ended."),
            EndReason::Forced => println!("⏹ The practice run was ended."),
        }))
        .await;

    println!("Practice backend: {}", session.backend_name());
    match session.load_cart().await {
        Ok(cart) => print_cart(&cart),
        Err(e) => {
            warn!(error = %e, "could not load cart");
            println!("⚠ {}", e.user_message());
        }
    }
    println!("{}", HELP);

    let mut waiting = session.subscribe_waiting();
    let queue_view = tokio::spawn(async move {
        while waiting.changed().await.is_ok() {
            if let Some(state) = *waiting.borrow_and_update() {
                println!("  ⏳ {} ahead of you, about {}s", state.queue_count, state.wait_seconds);
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("start") => {
                let seconds = parts
                    .next()
                    .and_then(|v| v.trim_end_matches('s').parse().ok())
                    .unwrap_or(default_offset);
                match session.start(seconds).await {
                    Ok(_) => {
                        let option = OffsetOption::resolve(seconds);
                        println!("▶ Practice started {} before opening.", option);
                        println!("  Code: {}", render_challenge(&session.captcha_challenge().await));
                    }
                    Err(e) => println!("⚠ {}", e.user_message()),
                }
            }
            Some("stop") => match session.stop().await {
                Ok(Some(ended)) => match ended.total_attempts {
                    Some(n) => println!("⏹ Stopped. The server counted {} attempts.", n),
                    None => println!("⏹ Stopped."),
                },
                Ok(None) => println!("No practice run is active."),
                Err(e) => println!("⏹ Stopped, but the server did not confirm: {}", e.user_message()),
            },
            Some("cart") => print_cart(&session.cart().await),
            Some("captcha") => {
                println!("  Code: {}", render_challenge(&session.captcha_challenge().await));
            }
            Some("refresh") => {
                println!("  Code: {}", render_challenge(&session.refresh_captcha().await));
            }
            Some("submit") => {
                // 1-based like the printed cart; anything else is "nothing selected"
                let index = parts
                    .next()
                    .and_then(|v| v.parse::<usize>().ok())
                    .and_then(|n| n.checked_sub(1));
                let code = parts.next().unwrap_or_default().to_string();
                let session = session.clone();
                tokio::spawn(async move {
                    let result = session.submit(index, &code).await;
                    report(&session, result).await;
                });
            }
            Some("ack") => session.acknowledge_warning(),
            Some("summary") => print_summary(&session.summary().await),
            Some("help") => println!("{}", HELP),
            Some("quit") | Some("exit") => break,
            Some(other) => println!("Unknown command '{}'. Type help.", other),
            None => {}
        }
    }

    if let Err(e) = session.stop().await {
        warn!(error = %e, "failed to end practice session on exit");
    }
    queue_view.abort();
    print_summary(&session.summary().await);

    Ok(())
}

async fn report(session: &PracticeSession, result: Result<AttemptReport, SimError>) {
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            println!("⚠ {}", e.user_message());
            return;
        }
    };

    match report.outcome {
        AttemptOutcome::Succeeded { course_id } => {
            let cart = session.cart().await;
            let name = cart
                .iter()
                .find(|c| c.course_id == course_id)
                .map(|c| c.course.title.clone())
                .unwrap_or_else(|| course_id.to_string());
            match report.context.diff_ms {
                Some(ms) => println!("✓ Registered for {} ({} ms after opening).", name, ms),
                None => println!("✓ Registered for {}.", name),
            }
        }
        AttemptOutcome::Warning(warning) => {
            let cart = session.cart().await;
            let course = report
                .context
                .course_id
                .and_then(|id| cart.iter().find(|c| c.course_id == id))
                .map(|c| &c.course);
            println!("⚠ {}", warning.message(course));
        }
        AttemptOutcome::Cancelled => println!("The run ended while you were in the queue."),
    }
    println!("  Code: {}", render_challenge(&session.captcha_challenge().await));
}

fn print_cart(cart: &[CartCourse]) {
    if cart.is_empty() {
        println!("Your cart is empty.");
        return;
    }
    println!("  #  Course                          Number     Seats  In carts");
    for (i, entry) in cart.iter().enumerate() {
        println!(
            "{:>3}  {:<30}  {:<9}  {:>5}  {:>8}",
            i + 1,
            entry.course.title,
            format!("{}-{}", entry.course.number, entry.course.lecture),
            entry.course.capacity,
            entry.cart_count
        );
    }
}

fn print_summary(summary: &RunSummary) {
    println!("\n╔══════════════════════════════════════╗");
    println!("║           Practice summary           ║");
    println!("╠══════════════════════════════════════╣");
    println!("║ Attempts:           {:>12}     ║", summary.total_attempts);
    println!("║ Registered:         {:>12}     ║", summary.successful);
    println!("║ Course full:        {:>12}     ║", summary.quota_over);
    println!("║ Rejected locally:   {:>12}     ║", summary.rejected_locally);
    println!("║ Server errors:      {:>12}     ║", summary.remote_errors);
    match summary.fastest_diff_ms {
        Some(ms) => println!("║ Fastest success:    {:>9} ms     ║", ms),
        None => println!("║ Fastest success:    {:>12}     ║", "-"),
    }
    println!("║ Success rate:       {:>11.1}%     ║", summary.success_rate());
    println!("╚══════════════════════════════════════╝\n");
}
