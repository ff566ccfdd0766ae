pub mod attempt;
pub mod audit;
pub mod job;
pub mod opt_out;
pub mod orchestrator;
pub mod reminder;
pub mod reminder_policy;
pub mod retry_policy;
pub mod schedule;
