//! `gradmate tasks` commands: operator access to a user's study plan.

use anyhow::Result;

use gradmate_core::plan::{StudyPlanTaskManager, TaskPatch, TaskView};

use crate::TaskCommands;

/// Run a tasks subcommand against `manager`.
pub async fn run_task_command(command: TaskCommands, manager: &StudyPlanTaskManager) -> Result<()> {
    match command {
        TaskCommands::List { user } => {
            let tasks = manager.list_tasks(&user).await?;
            print_tasks(&user, &tasks);
        }
        TaskCommands::Add {
            user,
            title,
            due,
            plan_title,
        } => {
            let task = manager
                .create_task(&user, plan_title.as_deref(), &title, due.as_deref())
                .await?;
            println!("Task added: {}", task.id);
        }
        TaskCommands::Done { user, id } => {
            let patch = TaskPatch {
                completed: Some(true),
                ..TaskPatch::default()
            };
            manager.update_task(&user, &id, &patch).await?;
            println!("Task {id} marked done.");
        }
        TaskCommands::Remove { user, id } => {
            manager.delete_task(&user, &id).await?;
            println!("Task {id} removed.");
        }
        TaskCommands::Generate {
            user,
            request,
            count,
            title,
        } => {
            let outcome = manager
                .generate_tasks_from_request(&user, &request, count, title.as_deref())
                .await?;
            println!(
                "Added {} task(s) to plan {}.",
                outcome.tasks_added, outcome.plan_id
            );
        }
        TaskCommands::Plans { user } => {
            let plans = manager.list_plans(&user).await?;
            if plans.is_empty() {
                println!("No study plans for {user}.");
            }
            for plan in &plans {
                println!(
                    "{}  {}  ({}/{} done, created {})",
                    plan.id,
                    plan.title,
                    plan.completed_count,
                    plan.task_count,
                    plan.created_on.format("%Y-%m-%d"),
                );
            }
        }
    }
    Ok(())
}

fn print_tasks(user: &str, tasks: &[TaskView]) {
    if tasks.is_empty() {
        println!("No tasks for {user}.");
        return;
    }
    println!("Tasks for {user} ({}):", tasks.len());
    for task in tasks {
        let mark = if task.completed { "x" } else { " " };
        let due = task.due_date.as_deref().unwrap_or("-");
        println!("  [{mark}] {:<12} {}  ({})", due, task.task, task.status);
        println!("        id: {}", task.id);
    }
}
