//! sea-orm entities of the retry service.

pub mod reminder_opt_outs;
pub mod reminder_policies;
pub mod reminders;
pub mod retry_attempts;
pub mod retry_audit_logs;
pub mod retry_jobs;
pub mod retry_policies;
pub mod retry_schedules;
