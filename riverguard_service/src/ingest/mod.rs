//! Clients for the external HTTP collaborators: the sensor sheet endpoint
//! and the public weather forecast.

pub mod sensor;
pub mod weather;
