use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use desk_core::{
    config::load_settings,
    context::{resolve_named, ContextSources},
    Dispatch, SessionController,
};
use shared::domain::{TicketId, ToolKind, WorkspaceMode};
use support_backend::{BackendSettings, CannedBackend};
use tracing::info;

#[derive(Parser, Debug)]
struct Cli {
    /// Skip the simulated backend latency.
    #[arg(long)]
    instant: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Queue triage, a ticket reply, and an escalation, end to end.
    Walkthrough,
    /// Print the side-panel payload for a mode name.
    Context { mode: String },
    /// Run auto-assign batches against the seeded queue.
    Assign {
        #[arg(long, default_value_t = 1)]
        rounds: usize,
    },
    /// Open a ticket, optionally consult the knowledge base, and send a reply.
    Reply {
        ticket_id: String,
        text: String,
        #[arg(long)]
        kb_query: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();

    let backend_settings = if cli.instant {
        BackendSettings::instant()
    } else {
        BackendSettings::from_env()
    };
    let backend = CannedBackend::new(backend_settings);
    let session = SessionController::start(backend.collaborators(), load_settings())
        .await
        .context("failed to start support desk session")?;
    let printer = spawn_event_printer(&session);

    match cli.command.unwrap_or(Command::Walkthrough) {
        Command::Walkthrough => walkthrough(&session).await?,
        Command::Context { mode } => {
            let queue = session.queue().tickets().await;
            let payload = resolve_named(
                &mode,
                &ContextSources {
                    queue: &queue,
                    focused: None,
                    panels: &session.settings().panels,
                },
            );
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        Command::Assign { rounds } => {
            for round in 1..=rounds {
                if let Dispatch::Completed(outcome) = session.auto_assign().await? {
                    println!(
                        "round {round}: assigned {} ({} remaining)",
                        outcome.assigned_delta, outcome.tickets_remaining
                    );
                }
            }
        }
        Command::Reply {
            ticket_id,
            text,
            kb_query,
        } => {
            let conversation = session.open_ticket(&TicketId::new(ticket_id)).await?;
            if let Some(query) = kb_query {
                if let Dispatch::Completed(answer) = session.submit_kb_query(&query).await? {
                    println!("kb: {answer}");
                }
            }
            conversation.edit_draft(text).await;
            session.approve_and_send().await?;
            println!("phase: {:?}", conversation.phase().await);
        }
    }

    drop(session);
    let _ = printer.await;
    Ok(())
}

async fn walkthrough(session: &Arc<SessionController>) -> Result<()> {
    print_context(session).await?;

    session.auto_assign().await?;
    print_context(session).await?;

    let ticket_id = TicketId::new("4492");
    let conversation = session.open_ticket(&ticket_id).await?;
    print_context(session).await?;

    session.select_tool(Some(ToolKind::Crm)).await?;
    println!("crm:\n{}", conversation.snapshot().await.tool_content);
    session.select_tool(Some(ToolKind::Logs)).await?;
    println!("logs:\n{}", conversation.snapshot().await.tool_content);
    session.select_tool(Some(ToolKind::Kb)).await?;
    session.submit_kb_query("refund after downtime").await?;
    println!("kb:\n{}", conversation.snapshot().await.tool_content);

    conversation
        .edit_draft(
            "Hi John, we have applied a 20% credit to your account for this month \
             and escalated the outages to engineering.",
        )
        .await;
    session.approve_and_send().await?;
    let phase = conversation.phase().await;
    info!(ticket_id = %ticket_id, phase = ?phase, "cli: reply finished");

    session.navigate(WorkspaceMode::Escalation).await;
    print_context(session).await?;
    session.navigate(WorkspaceMode::Analytics).await;
    print_context(session).await?;
    Ok(())
}

async fn print_context(session: &SessionController) -> Result<()> {
    let mode = session.active_mode().await;
    let payload = session.active_context().await;
    println!("[{mode}] {}", serde_json::to_string(&payload)?);
    Ok(())
}

/// Prints toast-worthy events until the session is dropped.
fn spawn_event_printer(session: &Arc<SessionController>) -> tokio::task::JoinHandle<()> {
    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let Some(toast) = event.toast_text() {
                println!("toast: {toast}");
            }
        }
    })
}
