pub mod advance_stays;
pub mod sweep_expired_holds;
