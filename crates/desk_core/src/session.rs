use std::{collections::HashMap, sync::Arc};

use shared::{
    domain::{SessionId, Ticket, TicketId, ToolKind, WorkspaceMode},
    protocol::{ContextPayload, Operation, SessionEvent},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use crate::{
    call_collaborator,
    config::Settings,
    context::{self, ContextSources},
    AssignOutcome, Collaborators, DeskError, Dispatch, TicketLifecycle, TicketQueue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RailSide {
    Left,
    Right,
}

/// Shell-level view state. The left rail is the mobile navigation drawer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellState {
    pub overlay_open: bool,
    pub active_mode: WorkspaceMode,
    pub left_rail_open: bool,
    pub right_rail_open: bool,
    pub focused_ticket: Option<TicketId>,
}

pub struct SessionController {
    session_id: SessionId,
    settings: Settings,
    collaborators: Collaborators,
    queue: Arc<TicketQueue>,
    conversations: Mutex<HashMap<TicketId, Arc<TicketLifecycle>>>,
    shell: Mutex<ShellState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub async fn start(
        collaborators: Collaborators,
        settings: Settings,
    ) -> Result<Arc<Self>, DeskError> {
        let tickets = call_collaborator(
            Operation::LoadTickets,
            settings.collaborator_timeout,
            collaborators.tickets.load_tickets(),
        )
        .await?;
        Ok(Self::with_tickets(tickets, collaborators, settings))
    }

    pub fn with_tickets(
        tickets: Vec<Ticket>,
        collaborators: Collaborators,
        settings: Settings,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        let session_id = SessionId::generate();
        info!(
            session_id = %session_id,
            tickets = tickets.len(),
            mode = %settings.initial_mode,
            "session: started"
        );
        let queue = TicketQueue::new(
            tickets,
            Arc::clone(&collaborators.assignment),
            settings.collaborator_timeout,
            events.clone(),
        );
        Arc::new(Self {
            session_id,
            shell: Mutex::new(ShellState {
                overlay_open: true,
                active_mode: settings.initial_mode,
                left_rail_open: false,
                right_rail_open: settings.right_rail_open,
                focused_ticket: None,
            }),
            settings,
            collaborators,
            queue,
            conversations: Mutex::new(HashMap::new()),
            events,
        })
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn queue(&self) -> &Arc<TicketQueue> {
        &self.queue
    }

    pub async fn shell(&self) -> ShellState {
        self.shell.lock().await.clone()
    }

    pub async fn active_mode(&self) -> WorkspaceMode {
        self.shell.lock().await.active_mode
    }

    pub async fn open(&self) {
        let mode = self.settings.initial_mode;
        {
            let mut shell = self.shell.lock().await;
            shell.overlay_open = true;
            shell.active_mode = mode;
            shell.left_rail_open = false;
        }
        let _ = self.events.send(SessionEvent::ModeChanged { mode });
    }

    pub async fn close(&self) {
        self.shell.lock().await.overlay_open = false;
        debug!(session_id = %self.session_id, "session: overlay closed");
    }

    pub async fn is_open(&self) -> bool {
        self.shell.lock().await.overlay_open
    }

    /// Also closes the mobile navigation drawer.
    pub async fn navigate(&self, mode: WorkspaceMode) {
        {
            let mut shell = self.shell.lock().await;
            shell.active_mode = mode;
            shell.left_rail_open = false;
        }
        debug!(session_id = %self.session_id, mode = %mode, "session: navigated");
        let _ = self.events.send(SessionEvent::ModeChanged { mode });
    }

    pub async fn toggle_rail(&self, side: RailSide) -> bool {
        let mut shell = self.shell.lock().await;
        let rail = match side {
            RailSide::Left => &mut shell.left_rail_open,
            RailSide::Right => &mut shell.right_rail_open,
        };
        *rail = !*rail;
        *rail
    }

    pub async fn active_context(&self) -> ContextPayload {
        let (mode, focused_id) = {
            let shell = self.shell.lock().await;
            (shell.active_mode, shell.focused_ticket.clone())
        };
        let queue = self.queue.tickets().await;
        let focused = match focused_id {
            Some(id) => self
                .conversations
                .lock()
                .await
                .get(&id)
                .map(|conversation| conversation.ticket().clone()),
            None => None,
        };
        context::resolve(
            mode,
            &ContextSources {
                queue: &queue,
                focused: focused.as_ref(),
                panels: &self.settings.panels,
            },
        )
    }

    /// The conversation machine is created on first open and reused afterwards.
    pub async fn open_ticket(&self, ticket_id: &TicketId) -> Result<Arc<TicketLifecycle>, DeskError> {
        let conversation = {
            let mut conversations = self.conversations.lock().await;
            match conversations.get(ticket_id) {
                Some(existing) => Arc::clone(existing),
                None => {
                    let ticket = self
                        .queue
                        .find(ticket_id)
                        .await
                        .ok_or_else(|| DeskError::UnknownTicket(ticket_id.clone()))?;
                    let created = TicketLifecycle::new(
                        ticket,
                        &self.collaborators,
                        self.settings.collaborator_timeout,
                        self.events.clone(),
                    );
                    conversations.insert(ticket_id.clone(), Arc::clone(&created));
                    created
                }
            }
        };

        self.shell.lock().await.focused_ticket = Some(ticket_id.clone());
        info!(session_id = %self.session_id, ticket_id = %ticket_id, "session: ticket opened");
        self.navigate(WorkspaceMode::Ticket).await;
        Ok(conversation)
    }

    pub async fn conversation(&self, ticket_id: &TicketId) -> Option<Arc<TicketLifecycle>> {
        self.conversations.lock().await.get(ticket_id).cloned()
    }

    pub async fn focused_conversation(&self) -> Result<Arc<TicketLifecycle>, DeskError> {
        let focused = self.shell.lock().await.focused_ticket.clone();
        let Some(ticket_id) = focused else {
            return Err(DeskError::NoFocusedTicket);
        };
        self.conversation(&ticket_id)
            .await
            .ok_or(DeskError::UnknownTicket(ticket_id))
    }

    pub async fn approve_and_send(&self) -> Result<Dispatch<()>, DeskError> {
        self.focused_conversation().await?.approve_and_send().await
    }

    pub async fn select_tool(&self, tool: Option<ToolKind>) -> Result<Option<ToolKind>, DeskError> {
        self.focused_conversation().await?.select_tool(tool).await
    }

    pub async fn submit_kb_query(&self, text: &str) -> Result<Dispatch<String>, DeskError> {
        self.focused_conversation()
            .await?
            .submit_kb_query(text)
            .await
    }

    pub async fn auto_assign(&self) -> Result<Dispatch<AssignOutcome>, DeskError> {
        self.queue.auto_assign().await
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
