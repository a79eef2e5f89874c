//! Row-level queries. Every function takes the caller's connection so a service can run
//! several of them inside one transaction.
pub(crate) mod appeals;
pub(crate) mod content;
pub(crate) mod flags;
pub(crate) mod penalties;
pub(crate) mod users;
pub(crate) mod watchlist;
