//! Hosted zone reference.

use serde::{Deserialize, Serialize};

use crate::dns::record_name::{
    is_within_zone, normalize_domain, qualified_record_name, to_route53_record_name,
};
use crate::synth::{ConstructError, ConstructResult};

/// An existing hosted zone records are written into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostedZone {
    pub hosted_zone_id: String,
    pub zone_name: String,
}

impl HostedZone {
    pub fn new(hosted_zone_id: impl Into<String>, zone_name: impl Into<String>) -> Self {
        Self {
            hosted_zone_id: hosted_zone_id.into(),
            zone_name: zone_name.into(),
        }
    }

    pub fn validate(&self, construct: &str) -> ConstructResult<()> {
        if self.hosted_zone_id.trim().is_empty() {
            return Err(ConstructError::missing(construct, "hosted_zone.hosted_zone_id"));
        }
        if normalize_domain(&self.zone_name).is_empty() {
            return Err(ConstructError::missing(construct, "hosted_zone.zone_name"));
        }
        Ok(())
    }

    /// Record name of `fqdn` relative to this zone.
    ///
    /// A name outside the zone is a configuration error here, not a pass-through.
    pub fn relative_name(&self, construct: &str, fqdn: &str) -> ConstructResult<String> {
        if !is_within_zone(fqdn, &self.zone_name) {
            return Err(ConstructError::invalid(
                construct,
                "domain_name",
                format!(
                    "`{}` is not within hosted zone `{}`",
                    normalize_domain(fqdn),
                    normalize_domain(&self.zone_name)
                ),
            ));
        }
        Ok(to_route53_record_name(fqdn, &self.zone_name))
    }

    /// Dot-terminated record set name for `fqdn`.
    pub fn record_set_name(&self, construct: &str, fqdn: &str) -> ConstructResult<String> {
        let relative = self.relative_name(construct, fqdn)?;
        Ok(qualified_record_name(&relative, &self.zone_name))
    }
}
