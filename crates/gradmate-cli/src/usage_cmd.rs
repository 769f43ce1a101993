//! `gradmate usage` command: show recent AI usage for a user.

use anyhow::Result;
use sqlx::PgPool;

use gradmate_db::queries::usage_logs;

pub async fn run_usage(pool: &PgPool, user: &str, limit: i64) -> Result<()> {
    let records = usage_logs::list_usage_for_owner(pool, user, limit).await?;
    if records.is_empty() {
        println!("No AI usage recorded for {user}.");
        return Ok(());
    }

    println!("AI usage for {user} ({} most recent):", records.len());
    for record in &records {
        println!(
            "  [{}] {}: {}",
            record.created_on.format("%Y-%m-%d %H:%M:%S"),
            record.feature,
            one_line(&record.request, 70),
        );
    }
    Ok(())
}

/// First line of `text`, cut to `max` chars with an ellipsis.
fn one_line(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > max {
        let cut: String = line.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_line_truncates_and_drops_later_lines() {
        assert_eq!(one_line("short\nsecond", 70), "short");
        assert_eq!(one_line("abcdefghij", 8), "abcde...");
        assert_eq!(one_line("", 8), "");
    }
}
