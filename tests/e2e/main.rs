//! End-to-end scenarios for the journal store and session.

mod scenarios;
