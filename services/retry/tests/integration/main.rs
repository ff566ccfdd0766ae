mod attempt_test;
mod helpers;
mod rejection_test;
mod reminder_test;
mod router_test;
