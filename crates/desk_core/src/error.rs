use std::time::Duration;

use shared::{
    domain::TicketId,
    error::{ErrorCode, ErrorReport},
    protocol::Operation,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("{operation} failed: {source}")]
    Collaborator {
        operation: Operation,
        source: anyhow::Error,
    },
    #[error("{operation} timed out after {}ms", .after.as_millis())]
    TimedOut {
        operation: Operation,
        after: Duration,
    },
    #[error("{operation} collaborator panicked")]
    CollaboratorPanicked { operation: Operation },
    #[error("completion task for {operation} was aborted")]
    TaskAborted { operation: Operation },
    #[error("ticket {0} is not part of this session")]
    UnknownTicket(TicketId),
    #[error("no ticket is open in the ticket workspace")]
    NoFocusedTicket,
}

impl DeskError {
    pub fn operation(&self) -> Option<Operation> {
        match self {
            DeskError::Collaborator { operation, .. }
            | DeskError::TimedOut { operation, .. }
            | DeskError::CollaboratorPanicked { operation }
            | DeskError::TaskAborted { operation } => Some(*operation),
            DeskError::UnknownTicket(_) | DeskError::NoFocusedTicket => None,
        }
    }

    pub fn report(&self) -> ErrorReport {
        let code = match self {
            DeskError::Collaborator { .. } => ErrorCode::CollaboratorFailure,
            DeskError::TimedOut { .. } => ErrorCode::Timeout,
            DeskError::UnknownTicket(_) | DeskError::NoFocusedTicket => ErrorCode::NotFound,
            DeskError::CollaboratorPanicked { .. } | DeskError::TaskAborted { .. } => {
                ErrorCode::Internal
            }
        };
        ErrorReport::new(code, self.to_string())
    }
}
