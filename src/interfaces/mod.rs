//! Adapter layer: CSV command scripts in, CSV account snapshots out, and the
//! mapping of wallet errors to caller-facing categories.

pub mod csv;
pub mod response;
pub mod script;
