use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;

use crate::domain::calendar::RunWindow;
use crate::domain::port::NotifierRegistry;
use crate::infra::calendar::HolidayCalendar;
use crate::infra::db::{
    DbAuditLogRepository, DbOptOutRepository, DbReminderPolicyRepository, DbReminderRepository,
    DbRetryAttemptRepository, DbRetryJobRepository, DbRetryPolicyRepository,
    DbRetryScheduleRepository,
};
use crate::infra::payment::HttpPaymentGateway;
use crate::usecase::attempt::ExecuteRetryAttemptUseCase;
use crate::usecase::audit::AuditTrail;
use crate::usecase::orchestrator::{
    CancelRetryScheduleUseCase, HandlePaymentRejectedUseCase, ProcessDueRetriesUseCase,
    StopScheduleUseCase,
};
use crate::usecase::reminder::{
    CancelRemindersForScheduleUseCase, ProcessPendingRemindersUseCase, ReminderEngine,
    ScheduleRemindersUseCase, SendReminderUseCase,
};
use crate::usecase::reminder_policy::ResolveReminderPolicyUseCase;
use crate::usecase::retry_policy::ResolveRetryPolicyUseCase;
use crate::usecase::schedule::{
    ApplyStopConditionUseCase, CancelScheduleUseCase, CheckEligibilityUseCase,
    FindDueForRetryUseCase, HandleRejectionUseCase,
};

pub type Calendar = Arc<HolidayCalendar>;

pub type Reminders = ReminderEngine<
    DbReminderPolicyRepository,
    DbReminderRepository,
    DbOptOutRepository,
    DbAuditLogRepository,
>;

pub type ScheduleReminders = ScheduleRemindersUseCase<
    DbReminderPolicyRepository,
    DbReminderRepository,
    DbOptOutRepository,
    DbAuditLogRepository,
>;

pub type Executor = ExecuteRetryAttemptUseCase<
    DbRetryScheduleRepository,
    DbRetryAttemptRepository,
    HttpPaymentGateway,
    Calendar,
    DbAuditLogRepository,
>;

pub type ProcessDueRetries = ProcessDueRetriesUseCase<
    DbRetryScheduleRepository,
    DbRetryAttemptRepository,
    HttpPaymentGateway,
    Calendar,
    DbAuditLogRepository,
    DbRetryJobRepository,
    DbReminderPolicyRepository,
    DbReminderRepository,
    DbOptOutRepository,
>;

pub type HandlePaymentRejected = HandlePaymentRejectedUseCase<
    DbRetryPolicyRepository,
    DbRetryScheduleRepository,
    Calendar,
    DbAuditLogRepository,
    DbReminderPolicyRepository,
    DbReminderRepository,
    DbOptOutRepository,
>;

pub type CancelRetrySchedule = CancelRetryScheduleUseCase<
    DbRetryScheduleRepository,
    DbAuditLogRepository,
    DbReminderPolicyRepository,
    DbReminderRepository,
    DbOptOutRepository,
>;

pub type StopSchedule = StopScheduleUseCase<
    DbRetryScheduleRepository,
    DbAuditLogRepository,
    DbReminderPolicyRepository,
    DbReminderRepository,
    DbOptOutRepository,
>;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub gateway: HttpPaymentGateway,
    pub notifiers: NotifierRegistry,
    pub calendar: Calendar,
    pub window: RunWindow,
    pub payment_timeout: Duration,
    pub notifier_timeout: Duration,
    pub reminder_batch_size: u64,
}

impl AppState {
    pub fn retry_policy_repo(&self) -> DbRetryPolicyRepository {
        DbRetryPolicyRepository {
            db: self.db.clone(),
        }
    }

    pub fn reminder_policy_repo(&self) -> DbReminderPolicyRepository {
        DbReminderPolicyRepository {
            db: self.db.clone(),
        }
    }

    pub fn schedule_repo(&self) -> DbRetryScheduleRepository {
        DbRetryScheduleRepository {
            db: self.db.clone(),
        }
    }

    pub fn attempt_repo(&self) -> DbRetryAttemptRepository {
        DbRetryAttemptRepository {
            db: self.db.clone(),
        }
    }

    pub fn job_repo(&self) -> DbRetryJobRepository {
        DbRetryJobRepository {
            db: self.db.clone(),
        }
    }

    pub fn reminder_repo(&self) -> DbReminderRepository {
        DbReminderRepository {
            db: self.db.clone(),
        }
    }

    pub fn opt_out_repo(&self) -> DbOptOutRepository {
        DbOptOutRepository {
            db: self.db.clone(),
        }
    }

    pub fn audit_repo(&self) -> DbAuditLogRepository {
        DbAuditLogRepository {
            db: self.db.clone(),
        }
    }

    pub fn audit_trail(&self) -> AuditTrail<DbAuditLogRepository> {
        AuditTrail {
            repo: self.audit_repo(),
        }
    }

    // ── Composite use cases ──────────────────────────────────────────────────

    pub fn schedule_reminders(&self) -> ScheduleReminders {
        ScheduleRemindersUseCase {
            policies: ResolveReminderPolicyUseCase {
                repo: self.reminder_policy_repo(),
            },
            reminders: self.reminder_repo(),
            opt_outs: self.opt_out_repo(),
            zone: self.window.zone,
            audit: self.audit_trail(),
        }
    }

    pub fn reminder_engine(&self) -> Reminders {
        ReminderEngine {
            schedule: self.schedule_reminders(),
            cancel: CancelRemindersForScheduleUseCase {
                reminders: self.reminder_repo(),
                audit: self.audit_trail(),
            },
        }
    }

    pub fn send_reminder(&self) -> SendReminderUseCase<DbReminderRepository, DbAuditLogRepository> {
        SendReminderUseCase {
            reminders: self.reminder_repo(),
            notifiers: self.notifiers.clone(),
            timeout: self.notifier_timeout,
            audit: self.audit_trail(),
        }
    }

    pub fn process_pending_reminders(
        &self,
    ) -> ProcessPendingRemindersUseCase<DbReminderRepository, DbAuditLogRepository> {
        ProcessPendingRemindersUseCase {
            send: self.send_reminder(),
            batch_size: self.reminder_batch_size,
        }
    }

    pub fn check_eligibility(&self) -> CheckEligibilityUseCase<DbRetryPolicyRepository, Calendar> {
        CheckEligibilityUseCase {
            policies: ResolveRetryPolicyUseCase {
                repo: self.retry_policy_repo(),
            },
            calendar: self.calendar.clone(),
            window: self.window,
        }
    }

    pub fn handle_payment_rejected(&self) -> HandlePaymentRejected {
        HandlePaymentRejectedUseCase {
            rejection: HandleRejectionUseCase {
                policies: ResolveRetryPolicyUseCase {
                    repo: self.retry_policy_repo(),
                },
                schedules: self.schedule_repo(),
                calendar: self.calendar.clone(),
                window: self.window,
                audit: self.audit_trail(),
            },
            reminders: self.reminder_engine(),
        }
    }

    pub fn cancel_retry_schedule(&self) -> CancelRetrySchedule {
        CancelRetryScheduleUseCase {
            cancel: CancelScheduleUseCase {
                schedules: self.schedule_repo(),
                audit: self.audit_trail(),
            },
            reminders: self.reminder_engine(),
        }
    }

    pub fn stop_schedule(&self) -> StopSchedule {
        StopScheduleUseCase {
            stop: ApplyStopConditionUseCase {
                schedules: self.schedule_repo(),
                audit: self.audit_trail(),
            },
            reminders: self.reminder_engine(),
        }
    }

    pub fn executor(&self) -> Executor {
        ExecuteRetryAttemptUseCase {
            schedules: self.schedule_repo(),
            attempts: self.attempt_repo(),
            gateway: self.gateway.clone(),
            calendar: self.calendar.clone(),
            window: self.window,
            payment_timeout: self.payment_timeout,
            audit: self.audit_trail(),
        }
    }

    pub fn process_due_retries(&self) -> ProcessDueRetries {
        ProcessDueRetriesUseCase {
            due: FindDueForRetryUseCase {
                schedules: self.schedule_repo(),
            },
            executor: self.executor(),
            reminders: self.reminder_engine(),
            jobs: self.job_repo(),
            window: self.window,
            audit: self.audit_trail(),
        }
    }
}
