//! # Integration Scenarios

#[cfg(test)]
pub mod fixtures;

#[cfg(test)]
mod channel_setup;
#[cfg(test)]
mod relay_flows;
