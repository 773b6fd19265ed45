// Domain layer: core models, the feature schema and ports (interfaces).

pub mod model;
pub mod ports;
pub mod schema;
