// Domain layer: typed records, output tables and the ports the pipeline is built on.

pub mod model;
pub mod ports;
