use uuid::Uuid;

use dunning_domain::pagination::PageRequest;

use crate::domain::job::RetryJob;
use crate::domain::repository::RetryJobRepository;
use crate::error::RetryServiceError;

// ── GetJob ───────────────────────────────────────────────────────────────────

pub struct GetJobUseCase<J: RetryJobRepository> {
    pub repo: J,
}

impl<J: RetryJobRepository> GetJobUseCase<J> {
    pub async fn execute(&self, organisation_id: Uuid, id: Uuid) -> Result<RetryJob, RetryServiceError> {
        self.repo
            .find_by_id(organisation_id, id)
            .await?
            .ok_or(RetryServiceError::JobNotFound)
    }
}

// ── ListJobs ─────────────────────────────────────────────────────────────────

pub struct ListJobsUseCase<J: RetryJobRepository> {
    pub repo: J,
}

impl<J: RetryJobRepository> ListJobsUseCase<J> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<RetryJob>, RetryServiceError> {
        self.repo.list(organisation_id, page).await
    }
}
