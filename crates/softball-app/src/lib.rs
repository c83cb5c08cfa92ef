// Library root for the softball stats service: wire protocol, request
// errors, dispatch, and demo seeding. The `softball` binary wires these up.

pub mod error;
pub mod protocol;
pub mod seed;
pub mod service;
