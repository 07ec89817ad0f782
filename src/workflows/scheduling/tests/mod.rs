mod common;

mod reconciliation;
mod switching;
