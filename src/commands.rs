use crate::caching::models::{CachingResult, RunStatus};
use crate::caching::orchestrator::Orchestrator;
use crate::cli::Args;
use crate::config::Config;
use crate::data_fetcher::models::{Game, Table};
use crate::error::AppError;
use crate::jobs::models::Job;
use crate::jobs::registry::JobRegistry;
use crate::read_api::LeagueReader;
use std::path::Path;

const RULE: &str = "────────────────────────────────────";

/// Validates command line argument combinations.
///
/// Returns an error if incompatible arguments are used together.
pub fn validate_args(args: &Args) -> Result<(), AppError> {
    if args.new_log_file_path.is_some() && args.clear_log_file_path {
        return Err(AppError::config_error(
            "Cannot use both --set-log-file and --clear-log-file",
        ));
    }
    if let (Some(enable), Some(disable)) = (&args.enable, &args.disable)
        && enable == disable
    {
        return Err(AppError::config_error(format!(
            "Cannot enable and disable job '{enable}' at the same time"
        )));
    }
    if args.limit == 0 {
        return Err(AppError::config_error("--limit must be at least 1"));
    }
    Ok(())
}

/// Handles configuration update commands (--config-domain, --set-log-file, --clear-log-file).
///
/// Starts from the stored config file, or defaults when there is none, so
/// that environment overrides never leak into the saved file.
pub async fn handle_config_update_command(args: &Args) -> Result<(), AppError> {
    let config_path = Config::get_config_path();
    let mut config = if Path::new(&config_path).exists() {
        Config::load_from_path(&config_path).await?
    } else {
        Config::default()
    };

    if let Some(new_domain) = &args.new_api_domain {
        config.api_domain = new_domain.clone();
    }

    if let Some(new_log_path) = &args.new_log_file_path {
        config.log_file_path = Some(new_log_path.clone());
    } else if args.clear_log_file_path {
        config.log_file_path = None;
        println!("Custom log file path cleared. Using default location.");
    }

    config.validate()?;
    config.save().await?;
    println!("Config updated successfully!");

    Ok(())
}

/// Handles the --list-config command.
pub fn handle_list_config_command(config: &Config) {
    config.display();
}

/// Handles the --list-jobs command.
pub async fn handle_list_jobs_command(registry: &dyn JobRegistry) -> Result<(), AppError> {
    let jobs = registry.list().await?;
    if jobs.is_empty() {
        println!("No jobs configured.");
        return Ok(());
    }
    println!("{}", format_jobs(&jobs));
    Ok(())
}

/// Handles --enable and --disable.
pub async fn handle_toggle_job_command(
    registry: &dyn JobRegistry,
    job_id: &str,
    disabled: bool,
) -> Result<(), AppError> {
    let job = registry.set_disabled(job_id, disabled).await?;
    let state = if job.disabled { "disabled" } else { "enabled" };
    println!("Job '{}' {state}.", job.id);
    Ok(())
}

/// Handles the --list-results command.
pub async fn handle_list_results_command(
    reader: &LeagueReader,
    job_id: &str,
    limit: usize,
) -> Result<(), AppError> {
    let results = reader.list_recent_results(job_id, limit).await?;
    if results.is_empty() {
        println!("No caching results recorded for job '{job_id}'.");
        return Ok(());
    }
    for result in &results {
        println!("{}", format_result(result));
    }
    Ok(())
}

/// Handles the --show-table command.
pub async fn handle_show_table_command(
    reader: &LeagueReader,
    class_id: &str,
) -> Result<(), AppError> {
    match reader.get_table(class_id).await? {
        Some(table) => println!("{}", format_table(&table)),
        None => println!("No standings cached for class '{class_id}'."),
    }
    Ok(())
}

/// Handles the --show-games command for the current week.
pub async fn handle_show_games_command(
    reader: &LeagueReader,
    class_id: &str,
) -> Result<(), AppError> {
    let Some(week) = reader.get_current_week().await? else {
        println!("No current week cached yet.");
        return Ok(());
    };
    let games = reader.get_games_for_week(class_id, week.id()).await?;
    if games.is_empty() {
        println!("No games cached for class '{class_id}' in week {}.", week.id());
        return Ok(());
    }
    println!("Week {}", week.id());
    println!("{RULE}");
    println!("{}", format_games(&games));
    Ok(())
}

/// Handles the --once command.
///
/// Runs the job through the orchestrator exactly like a scheduled trigger,
/// prints the recorded result and returns its status for the exit code.
pub async fn handle_once_command(
    orchestrator: &Orchestrator,
    registry: &dyn JobRegistry,
    job_id: &str,
) -> Result<RunStatus, AppError> {
    let result = orchestrator.run_by_id(registry, job_id).await;
    println!("{}", format_result(&result));
    for summary in &result.error_summaries {
        println!("  {summary}");
    }
    Ok(result.status)
}

pub fn format_jobs(jobs: &[Job]) -> String {
    jobs.iter()
        .map(|job| {
            format!(
                "{:<16} {:<6} {:<16} {}{}",
                job.id,
                job.caching_type,
                job.cron_expression,
                job.name,
                if job.disabled { " (disabled)" } else { "" }
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line per result: start time, status, failed/attempted units, duration.
pub fn format_result(result: &CachingResult) -> String {
    format!(
        "{} {:<7} {}/{} units failed, {} ms",
        result.started_at.format("%Y-%m-%d %H:%M:%S"),
        result.status,
        result.units_failed,
        result.units_attempted,
        result.duration_ms()
    )
}

pub fn format_table(table: &Table) -> String {
    let mut lines = vec![
        format!(
            "{:>3} {:<28} {:>3} {:>3} {:>3} {:>3} {:>9} {:>5}",
            "#", "Team", "P", "W", "D", "L", "Goals", "Pts"
        ),
        RULE.to_string(),
    ];
    for score in &table.scores {
        lines.push(format!(
            "{:>3} {:<28} {:>3} {:>3} {:>3} {:>3} {:>9} {:>2}:{:<2}",
            score.rank,
            score.team,
            score.played,
            score.won,
            score.drawn,
            score.lost,
            format!("{}:{}", score.goals_for, score.goals_against),
            score.points,
            score.points_against
        ));
    }
    lines.push(format!(
        "Updated {}",
        table.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    lines.join("\n")
}

pub fn format_games(games: &[Game]) -> String {
    games
        .iter()
        .map(|game| {
            let score = game
                .score
                .as_ref()
                .map_or_else(|| "-:-".to_string(), |s| format!("{}:{}", s.home, s.away));
            format!(
                "{} {:<24} - {:<24} {score}",
                game.scheduled_at.format("%a %d.%m. %H:%M"),
                game.home_team,
                game.away_team
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_fetcher::models::GameScore;
    use crate::jobs::models::CachingType;
    use crate::testing_utils::TestDataBuilder;
    use chrono::{TimeZone, Utc};
    use clap::Parser;

    #[test]
    fn test_validate_args_rejects_conflicting_log_flags() {
        let args = Args::parse_from(["hvw_cache", "--set-log-file", "a.log", "--clear-log-file"]);
        assert!(validate_args(&args).is_err());

        let args = Args::parse_from(["hvw_cache", "--set-log-file", "a.log"]);
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_validate_args_rejects_enable_and_disable_of_same_job() {
        let args = Args::parse_from(["hvw_cache", "--enable", "tables", "--disable", "tables"]);
        assert!(validate_args(&args).is_err());

        let args = Args::parse_from(["hvw_cache", "--enable", "tables", "--disable", "games"]);
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_validate_args_rejects_zero_limit() {
        let args = Args::parse_from(["hvw_cache", "--list-results", "tables", "--limit", "0"]);
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_format_result() {
        let started = Utc.with_ymd_and_hms(2024, 9, 20, 10, 0, 0).unwrap();
        let mut result = TestDataBuilder::caching_result("tables", started, RunStatus::Partial);
        result.units_attempted = 5;
        result.units_failed = 3;
        assert_eq!(
            format_result(&result),
            "2024-09-20 10:00:00 PARTIAL 3/5 units failed, 1000 ms"
        );
    }

    #[test]
    fn test_format_jobs_marks_disabled() {
        let mut job = Job::new("games", "Games", CachingType::Games, "*/15 * * * *");
        job.disabled = true;
        let output = format_jobs(&[job]);
        assert!(output.starts_with("games"));
        assert!(output.contains("GAMES"));
        assert!(output.ends_with("Games (disabled)"));
    }

    #[test]
    fn test_format_games_shows_pending_and_final_scores() {
        let week = TestDataBuilder::week_date();
        let games = vec![
            TestDataBuilder::game(
                "c1",
                week,
                "TV Alpha",
                "SG Beta",
                Some(GameScore { home: 28, away: 25 }),
            ),
            TestDataBuilder::game("c1", week, "HC Gamma", "TSV Delta", None),
        ];
        let output = format_games(&games);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("28:25"));
        assert!(lines[1].ends_with("-:-"));
    }

    #[test]
    fn test_format_table_lists_rows_in_order() {
        let table = Table {
            class_id: "c1".to_string(),
            scores: vec![
                TestDataBuilder::table_score(1, "TV Alpha", 12),
                TestDataBuilder::table_score(2, "SG Beta", 10),
            ],
            updated_at: Utc.with_ymd_and_hms(2024, 9, 20, 10, 0, 0).unwrap(),
        };
        let output = format_table(&table);
        let alpha = output.find("TV Alpha").unwrap();
        let beta = output.find("SG Beta").unwrap();
        assert!(alpha < beta);
        assert!(output.ends_with("Updated 2024-09-20 10:00:00 UTC"));
    }
}
