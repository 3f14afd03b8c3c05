pub mod reachability;
pub mod udp;

pub use reachability::{probe_once, run_prober, PingCheck, ReachabilityCheck};
pub use udp::{Ack, ViscaChannel};
