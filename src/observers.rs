use tracing::{info, warn};

use crate::events::CirculationEvent;

/// Trait for circulation event observation
pub trait CirculationObserver {
    /// Called after a change has been applied and persisted
    fn on_event(&self, event: &CirculationEvent);
}

/// Logs all circulation events through `tracing`
#[derive(Debug)]
pub struct EventLogger;

impl CirculationObserver for EventLogger {
    fn on_event(&self, event: &CirculationEvent) {
        match event {
            CirculationEvent::UserRegistered { user_id, role } => {
                info!(user_id, %role, "user registered");
            }
            CirculationEvent::BookCatalogued { isbn, copies } => {
                info!(%isbn, copies, "book catalogued");
            }
            CirculationEvent::BookRestocked { isbn, copies, total } => {
                info!(%isbn, copies, total, "book restocked");
            }
            CirculationEvent::Issued { user_id, isbn, on } => {
                info!(user_id, %isbn, %on, "book issued");
            }
            CirculationEvent::Returned { user_id, isbn, on, days_held, days_overdue } => {
                if *days_overdue > 0 {
                    warn!(user_id, %isbn, %on, days_held, days_overdue, "book returned late");
                } else {
                    info!(user_id, %isbn, %on, days_held, "book returned");
                }
            }
        }
    }
}
