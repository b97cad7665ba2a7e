//! Command-line front end for folio: sign in, inspect the session, and
//! issue authenticated API calls.

pub mod cli;
