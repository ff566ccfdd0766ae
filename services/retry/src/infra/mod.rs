pub mod calendar;
pub mod db;
pub mod notifier;
pub mod payment;
