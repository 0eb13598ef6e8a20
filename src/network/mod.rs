//! Network subsystem.
//!
//! - cidr.rs: address block parsing shared with the firewall rules
//! - security_group.rs: VPC security group construct

pub mod cidr;
pub mod security_group;

pub use cidr::Cidr;
pub use security_group::{SecurityGroupConstruct, SecurityGroupProps};
