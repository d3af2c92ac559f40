//! Behavioural scenarios for the rewrite engine, run as one test binary.

mod properties;
mod scenarios;
