//! PurgeExpiredIntentsHandler - Removes saga intents past their deadline.

use std::sync::Arc;

use crate::domain::foundation::DomainError;
use crate::ports::{Clock, SagaIntentRepository};

pub struct PurgeExpiredIntentsHandler {
    intents: Arc<dyn SagaIntentRepository>,
    clock: Arc<dyn Clock>,
}

impl PurgeExpiredIntentsHandler {
    pub fn new(intents: Arc<dyn SagaIntentRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { intents, clock }
    }

    /// Returns the number of intents deleted.
    pub async fn handle(&self) -> Result<u64, DomainError> {
        let purged = self.intents.delete_expired_intents(self.clock.now()).await?;
        if purged > 0 {
            tracing::info!(purged, "Expired saga intents purged");
        }
        Ok(purged)
    }
}
