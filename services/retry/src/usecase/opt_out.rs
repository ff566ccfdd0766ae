use uuid::Uuid;

use crate::domain::reminder::ReminderChannel;
use crate::domain::repository::OptOutRepository;
use crate::error::RetryServiceError;

// ── OptOut ───────────────────────────────────────────────────────────────────

pub struct OptOutUseCase<O: OptOutRepository> {
    pub repo: O,
}

impl<O: OptOutRepository> OptOutUseCase<O> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        client_id: Uuid,
        channel: ReminderChannel,
    ) -> Result<(), RetryServiceError> {
        self.repo.opt_out(organisation_id, client_id, channel).await?;
        tracing::info!(%organisation_id, %client_id, %channel, "client opted out");
        Ok(())
    }
}

// ── OptIn ────────────────────────────────────────────────────────────────────

pub struct OptInUseCase<O: OptOutRepository> {
    pub repo: O,
}

impl<O: OptOutRepository> OptInUseCase<O> {
    /// Returns `false` when the client was not opted out.
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        client_id: Uuid,
        channel: ReminderChannel,
    ) -> Result<bool, RetryServiceError> {
        let removed = self.repo.opt_in(organisation_id, client_id, channel).await?;
        if removed {
            tracing::info!(%organisation_id, %client_id, %channel, "client opted back in");
        }
        Ok(removed)
    }
}
