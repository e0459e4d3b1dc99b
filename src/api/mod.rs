//
// Do not put code in `mod.rs`, but put in e.g. `core.rs`.
//

pub mod core;
pub mod logs;
