// Domain layer: core models and the remote port. No I/O here.

pub mod model;
pub mod ports;
